use async_trait::async_trait;
use kongsync_core::{
    EntityRef, NewRoute, Page, PageToken, PluginRecord, PluginSpec, RemoteRoute, ServiceSpec, VirtualService,
};
use kongsync_errors::AdminError;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::AdminApi;

/// Every call the in-memory backend has seen, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCall {
    UpsertService { name: String },
    GetService { name: String },
    ListRoutes { service: String, token: Option<String> },
    CreateRoute { paths: Vec<String> },
    UpdateRoute { id: String, name: String },
    DeleteRoute { id: String },
    AddPlugin { route_id: String, plugin: String, function_name: Option<String> },
}

type FaultFn = Arc<dyn Fn(&AdminCall) -> bool + Send + Sync>;

#[derive(Default)]
struct MemState {
    services: Vec<VirtualService>,
    routes: Vec<RemoteRoute>,
    plugins: Vec<PluginRecord>,
    calls: Vec<AdminCall>,
    next_id: u64,
}

impl MemState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Admin api kept in process memory, with Kong's uniqueness and not-found rules.
pub struct InMemoryAdmin {
    state: Mutex<MemState>,
    page_size: usize,
    fault: RwLock<Option<FaultFn>>,
}

impl Default for InMemoryAdmin {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(method: &str, path: String) -> AdminError {
    AdminError::status(method, &path, 404, "Not found")
}

impl InMemoryAdmin {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemState::default()),
            page_size: 100,
            fault: RwLock::new(None),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Calls matching `f` fail with a 500 after being recorded.
    pub fn fail_when<F>(&self, f: F)
    where
        F: Fn(&AdminCall) -> bool + Send + Sync + 'static,
    {
        *self.fault.write() = Some(Arc::new(f));
    }

    pub fn heal(&self) {
        *self.fault.write() = None;
    }

    pub fn calls(&self) -> Vec<AdminCall> {
        self.state.lock().calls.clone()
    }

    /// Routes of the service called `service`, in creation order.
    pub fn routes(&self, service: &str) -> Vec<RemoteRoute> {
        let state = self.state.lock();
        let Some(svc) = state.services.iter().find(|s| s.name == service) else {
            return vec![];
        };
        state
            .routes
            .iter()
            .filter(|r| r.service_id() == Some(svc.id.as_str()))
            .cloned()
            .collect()
    }

    pub fn plugins_of(&self, route_id: &str) -> Vec<PluginRecord> {
        self.state
            .lock()
            .plugins
            .iter()
            .filter(|p| p.route.as_ref().map(|r| r.id.as_str()) == Some(route_id))
            .cloned()
            .collect()
    }

    /// Inserts a route directly, bypassing the call log.
    pub fn seed_route(&self, service: &str, paths: &[&str], name: Option<&str>) -> RemoteRoute {
        let mut state = self.state.lock();
        let svc_id = match state.services.iter().find(|s| s.name == service) {
            Some(svc) => svc.id.clone(),
            None => {
                let id = state.id("service");
                state.services.push(VirtualService {
                    id: id.clone(),
                    name: service.to_string(),
                    ..Default::default()
                });
                id
            }
        };
        let route = RemoteRoute {
            id: state.id("route"),
            name: name.map(str::to_string),
            paths: paths.iter().map(|p| p.to_string()).collect(),
            service: Some(EntityRef::new(svc_id)),
            ..Default::default()
        };
        state.routes.push(route.clone());
        route
    }

    /// Records `call`, then reports whether an injected fault claims it.
    fn record(&self, call: AdminCall) -> Result<(), AdminError> {
        let faulty = self.fault.read().as_ref().map(|f| f(&call)).unwrap_or(false);
        self.state.lock().calls.push(call);
        if faulty {
            return Err(AdminError::status("ANY", "/", 500, "injected fault"));
        }
        Ok(())
    }
}

#[async_trait]
impl AdminApi for InMemoryAdmin {
    async fn upsert_service(&self, name: &str, spec: &ServiceSpec) -> Result<VirtualService, AdminError> {
        self.record(AdminCall::UpsertService { name: name.to_string() })?;
        let mut state = self.state.lock();
        if let Some(svc) = state.services.iter_mut().find(|s| s.name == name) {
            svc.url = Some(spec.url.clone());
            svc.tags = spec.tags.clone();
            return Ok(svc.clone());
        }
        let svc = VirtualService {
            id: state.id("service"),
            name: name.to_string(),
            url: Some(spec.url.clone()),
            tags: spec.tags.clone(),
            ..Default::default()
        };
        state.services.push(svc.clone());
        Ok(svc)
    }

    async fn get_service(&self, name: &str) -> Result<Option<VirtualService>, AdminError> {
        self.record(AdminCall::GetService { name: name.to_string() })?;
        Ok(self.state.lock().services.iter().find(|s| s.name == name).cloned())
    }

    async fn list_routes(
        &self,
        service: &str,
        page: Option<&PageToken>,
    ) -> Result<Page<RemoteRoute>, AdminError> {
        self.record(AdminCall::ListRoutes {
            service: service.to_string(),
            token: page.map(|t| t.0.clone()),
        })?;
        let path = format!("/services/{service}/routes");
        let state = self.state.lock();
        let svc = state
            .services
            .iter()
            .find(|s| s.name == service || s.id == service)
            .ok_or_else(|| not_found("GET", path.clone()))?;

        let start = match page {
            Some(token) => token
                .as_str()
                .parse::<usize>()
                .map_err(|_| AdminError::status("GET", &path, 400, "invalid offset"))?,
            None => 0,
        };
        let all: Vec<_> = state
            .routes
            .iter()
            .filter(|r| r.service_id() == Some(svc.id.as_str()))
            .collect();
        let end = (start + self.page_size).min(all.len());
        let data = all
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|r| (*r).clone())
            .collect();
        let next = (end < all.len()).then(|| end.to_string());
        Ok(Page { data, next, offset: None })
    }

    async fn create_route(&self, route: &NewRoute) -> Result<RemoteRoute, AdminError> {
        self.record(AdminCall::CreateRoute { paths: route.attributes.paths.clone() })?;
        let mut state = self.state.lock();
        if !state.services.iter().any(|s| s.id == route.service.id) {
            return Err(AdminError::status("POST", "/routes", 400, "service does not exist"));
        }
        let attrs = &route.attributes;
        let created = RemoteRoute {
            id: state.id("route"),
            name: None,
            paths: attrs.paths.clone(),
            methods: attrs.methods.clone(),
            hosts: attrs.hosts.clone(),
            protocols: attrs.protocols.clone(),
            tags: attrs.tags.clone(),
            service: Some(route.service.clone()),
            extra: attrs.extra.clone(),
        };
        state.routes.push(created.clone());
        Ok(created)
    }

    async fn update_route(&self, id: &str, name: &str) -> Result<RemoteRoute, AdminError> {
        self.record(AdminCall::UpdateRoute { id: id.to_string(), name: name.to_string() })?;
        let path = format!("/routes/{id}");
        let mut state = self.state.lock();
        if state
            .routes
            .iter()
            .any(|r| r.id != id && r.name.as_deref() == Some(name))
        {
            return Err(AdminError::status(
                "PATCH",
                &path,
                409,
                format!("UNIQUE violation detected on '{{name=\"{name}\"}}'"),
            ));
        }
        let route = state
            .routes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("PATCH", path.clone()))?;
        route.name = Some(name.to_string());
        Ok(route.clone())
    }

    async fn delete_route(&self, id: &str) -> Result<(), AdminError> {
        self.record(AdminCall::DeleteRoute { id: id.to_string() })?;
        let mut state = self.state.lock();
        let before = state.routes.len();
        state.routes.retain(|r| r.id != id);
        if state.routes.len() == before {
            return Err(not_found("DELETE", format!("/routes/{id}")));
        }
        state
            .plugins
            .retain(|p| p.route.as_ref().map(|r| r.id.as_str()) != Some(id));
        Ok(())
    }

    async fn add_plugin(&self, route_id: &str, plugin: &PluginSpec) -> Result<PluginRecord, AdminError> {
        self.record(AdminCall::AddPlugin {
            route_id: route_id.to_string(),
            plugin: plugin.name.clone(),
            function_name: plugin
                .config
                .get("function_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })?;
        let mut state = self.state.lock();
        if !state.routes.iter().any(|r| r.id == route_id) {
            return Err(not_found("POST", format!("/routes/{route_id}/plugins")));
        }
        let record = PluginRecord::attached(state.id("plugin"), route_id, plugin);
        state.plugins.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kongsync_core::RouteAttributes;

    #[tokio::test]
    async fn names_are_unique() {
        let admin = InMemoryAdmin::new();
        let old = admin.seed_route("svc", &["/a"], Some("f"));
        let svc_id = old.service_id().unwrap().to_string();
        let fresh = admin
            .create_route(&NewRoute::new(svc_id, RouteAttributes::with_paths(["/a"])))
            .await
            .unwrap();

        let err = admin.update_route(&fresh.id, "f").await.unwrap_err();
        assert!(err.is_conflict());

        admin.delete_route(&old.id).await.unwrap();
        admin.update_route(&fresh.id, "f").await.unwrap();
        assert_eq!(admin.routes("svc")[0].name.as_deref(), Some("f"));
    }

    #[tokio::test]
    async fn deleting_unknown_route_is_not_found() {
        let admin = InMemoryAdmin::new();
        assert!(admin.delete_route("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn injected_faults_are_recorded() {
        let admin = InMemoryAdmin::new();
        admin.fail_when(|c| matches!(c, AdminCall::GetService { .. }));
        assert!(admin.get_service("svc").await.is_err());
        assert_eq!(admin.calls(), vec![AdminCall::GetService { name: "svc".into() }]);
        admin.heal();
        assert_eq!(admin.get_service("svc").await.unwrap(), None);
    }
}
