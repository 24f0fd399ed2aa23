use kongsync_core::{PageToken, RemoteRoute};
use kongsync_errors::AdminError;
use std::collections::HashSet;
use tracing::debug;

use crate::AdminApi;

/// Every route currently attached to `service`, read page by page.
///
/// Pages are requested strictly one after another, each with the cursor of the page
/// before it. A `null` cursor ends the listing. An empty cursor, or one that was already
/// followed, is a pagination error. Any failed page fails the whole read.
pub async fn list_all<A>(api: &A, service: &str) -> Result<Vec<RemoteRoute>, AdminError>
where
    A: AdminApi + ?Sized,
{
    let mut routes = Vec::new();
    let mut ids = HashSet::new();
    let mut followed = HashSet::new();
    let mut token: Option<PageToken> = None;
    let mut pages = 0usize;

    loop {
        let page = api.list_routes(service, token.as_ref()).await?;
        pages += 1;

        for route in page.data {
            // a route can slide across a page boundary between two requests
            if ids.insert(route.id.clone()) {
                routes.push(route);
            }
        }

        match page.next {
            None => break,
            Some(next) if next.is_empty() => {
                return Err(AdminError::Pagination(format!(
                    "empty cursor after page {pages} of service `{service}`"
                )));
            }
            Some(next) => {
                if !followed.insert(next.clone()) {
                    return Err(AdminError::Pagination(format!(
                        "cursor `{next}` repeated after page {pages} of service `{service}`"
                    )));
                }
                token = Some(PageToken(next));
            }
        }
    }

    debug!(service, pages, routes = routes.len(), "listed existing routes");
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AdminCall, InMemoryAdmin};
    use async_trait::async_trait;
    use kongsync_core::{
        NewRoute, Page, PluginRecord, PluginSpec, RouteAttributes, ServiceSpec, VirtualService,
    };
    use parking_lot::Mutex;

    /// Replays a fixed list of pages, one per call.
    struct Scripted {
        pages: Mutex<Vec<Result<Page<RemoteRoute>, AdminError>>>,
        tokens: Mutex<Vec<Option<String>>>,
    }

    impl Scripted {
        fn new(mut pages: Vec<Result<Page<RemoteRoute>, AdminError>>) -> Self {
            pages.reverse();
            Self { pages: Mutex::new(pages), tokens: Mutex::new(vec![]) }
        }
    }

    fn route(id: &str) -> RemoteRoute {
        RemoteRoute { id: id.into(), ..Default::default() }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Result<Page<RemoteRoute>, AdminError> {
        Ok(Page {
            data: ids.iter().map(|id| route(id)).collect(),
            next: next.map(str::to_string),
            offset: None,
        })
    }

    #[async_trait]
    impl AdminApi for Scripted {
        async fn upsert_service(&self, _: &str, _: &ServiceSpec) -> Result<VirtualService, AdminError> {
            unreachable!()
        }
        async fn get_service(&self, _: &str) -> Result<Option<VirtualService>, AdminError> {
            unreachable!()
        }
        async fn list_routes(
            &self,
            _: &str,
            page: Option<&PageToken>,
        ) -> Result<Page<RemoteRoute>, AdminError> {
            self.tokens.lock().push(page.map(|t| t.0.clone()));
            self.pages.lock().pop().expect("no more scripted pages")
        }
        async fn create_route(&self, _: &NewRoute) -> Result<RemoteRoute, AdminError> {
            unreachable!()
        }
        async fn update_route(&self, _: &str, _: &str) -> Result<RemoteRoute, AdminError> {
            unreachable!()
        }
        async fn delete_route(&self, _: &str) -> Result<(), AdminError> {
            unreachable!()
        }
        async fn add_plugin(&self, _: &str, _: &PluginSpec) -> Result<PluginRecord, AdminError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn follows_cursors_until_null() {
        let api = Scripted::new(vec![
            page(&["r1"], Some("A")),
            page(&["r2"], Some("B")),
            page(&["r3"], Some("C")),
            page(&["r4"], None),
        ]);
        let routes = list_all(&api, "svc").await.unwrap();
        let ids: Vec<_> = routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["r1", "r2", "r3", "r4"]);
        assert_eq!(
            *api.tokens.lock(),
            vec![None, Some("A".to_string()), Some("B".to_string()), Some("C".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_cursor_is_an_error() {
        let api = Scripted::new(vec![page(&["r1"], Some(""))]);
        let err = list_all(&api, "svc").await.unwrap_err();
        assert!(matches!(err, AdminError::Pagination(_)));
    }

    #[tokio::test]
    async fn repeated_cursor_is_an_error() {
        let api = Scripted::new(vec![page(&["r1"], Some("A")), page(&["r2"], Some("A"))]);
        let err = list_all(&api, "svc").await.unwrap_err();
        assert!(matches!(err, AdminError::Pagination(_)));
    }

    #[tokio::test]
    async fn failed_page_returns_no_partial_result() {
        let api = Scripted::new(vec![
            page(&["r1"], Some("A")),
            Err(AdminError::status("GET", "/services/svc/routes", 502, "bad gateway")),
        ]);
        let err = list_all(&api, "svc").await.unwrap_err();
        assert!(matches!(err, AdminError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn duplicate_ids_across_pages_are_collapsed() {
        let api = Scripted::new(vec![page(&["r1", "r2"], Some("A")), page(&["r2", "r3"], None)]);
        let routes = list_all(&api, "svc").await.unwrap();
        assert_eq!(routes.len(), 3);
    }

    #[tokio::test]
    async fn reads_every_page_of_the_memory_backend() {
        let admin = InMemoryAdmin::new().with_page_size(2);
        let svc = admin
            .upsert_service("svc", &ServiceSpec { url: "http://x".into(), tags: vec![] })
            .await
            .unwrap();
        for i in 0..5 {
            admin
                .create_route(&NewRoute::new(&svc.id, RouteAttributes::with_paths([format!("/r{i}")])))
                .await
                .unwrap();
        }

        let routes = list_all(&admin, "svc").await.unwrap();
        assert_eq!(routes.len(), 5);
        let listings = admin
            .calls()
            .iter()
            .filter(|c| matches!(c, AdminCall::ListRoutes { .. }))
            .count();
        assert_eq!(listings, 3);
    }
}
