use async_trait::async_trait;
use kongsync_core::{NewRoute, Page, PageToken, PluginRecord, PluginSpec, RemoteRoute, ServiceSpec, VirtualService};
use kongsync_errors::AdminError;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::AdminApi;

/// RBAC token header understood by Kong's admin api.
pub const ADMIN_TOKEN_HEADER: &str = "kong-admin-token";

/// Admin api over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct KongAdminClient {
    base: Url,
    client: Client,
}

fn transport(e: reqwest::Error) -> AdminError {
    AdminError::Transport(e.to_string())
}

/// Kong wraps errors as `{"message": ...}`; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl KongAdminClient {
    pub fn new(base_url: &str, admin_token: Option<&str>, timeout: Duration) -> Result<Self, AdminError> {
        let base = Url::parse(base_url)
            .map_err(|e| AdminError::Transport(format!("invalid admin url `{base_url}`: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(AdminError::Transport(format!("invalid admin url `{base_url}`")));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = admin_token {
            let value = HeaderValue::from_str(token)
                .map_err(|_| AdminError::Transport("admin token is not a valid header value".into()))?;
            headers.insert(ADMIN_TOKEN_HEADER, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(transport)?;

        Ok(Self { base, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Kong hands back `next` as a path relative to the admin root; absolute urls and bare
    /// offsets are accepted too.
    fn cursor_url(&self, service: &str, token: &PageToken) -> Result<Url, AdminError> {
        let raw = token.as_str();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Url::parse(raw).map_err(|e| AdminError::Pagination(format!("bad cursor `{raw}`: {e}")))
        } else if raw.starts_with('/') {
            let joined = format!("{}{}", self.base.as_str().trim_end_matches('/'), raw);
            Url::parse(&joined).map_err(|e| AdminError::Pagination(format!("bad cursor `{raw}`: {e}")))
        } else {
            let mut url = self.endpoint(&["services", service, "routes"]);
            url.query_pairs_mut().append_pair("offset", raw);
            Ok(url)
        }
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response, AdminError> {
        let path = url.path().to_string();
        debug!("admin {} {}", method, url);

        let mut req = self.client.request(method.clone(), url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(transport)?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Err(AdminError::status(method.as_str(), &path, status, error_message(&text)))
    }

    async fn call_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T, AdminError> {
        self.call(method, url, body)
            .await?
            .json::<T>()
            .await
            .map_err(|e| AdminError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AdminApi for KongAdminClient {
    async fn upsert_service(&self, name: &str, spec: &ServiceSpec) -> Result<VirtualService, AdminError> {
        let url = self.endpoint(&["services", name]);
        self.call_json(Method::PUT, url, Some(spec)).await
    }

    async fn get_service(&self, name: &str) -> Result<Option<VirtualService>, AdminError> {
        let url = self.endpoint(&["services", name]);
        match self.call_json(Method::GET, url, None::<&Value>).await {
            Ok(svc) => Ok(Some(svc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_routes(
        &self,
        service: &str,
        page: Option<&PageToken>,
    ) -> Result<Page<RemoteRoute>, AdminError> {
        let url = match page {
            Some(token) => self.cursor_url(service, token)?,
            None => self.endpoint(&["services", service, "routes"]),
        };
        self.call_json(Method::GET, url, None::<&Value>).await
    }

    async fn create_route(&self, route: &NewRoute) -> Result<RemoteRoute, AdminError> {
        let url = self.endpoint(&["routes"]);
        self.call_json(Method::POST, url, Some(route)).await
    }

    async fn update_route(&self, id: &str, name: &str) -> Result<RemoteRoute, AdminError> {
        let url = self.endpoint(&["routes", id]);
        self.call_json(Method::PATCH, url, Some(&json!({ "name": name }))).await
    }

    async fn delete_route(&self, id: &str) -> Result<(), AdminError> {
        let url = self.endpoint(&["routes", id]);
        self.call(Method::DELETE, url, None::<&Value>).await?;
        Ok(())
    }

    async fn add_plugin(&self, route_id: &str, plugin: &PluginSpec) -> Result<PluginRecord, AdminError> {
        let url = self.endpoint(&["routes", route_id, "plugins"]);
        self.call_json(Method::POST, url, Some(plugin)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kongsync_core::RouteAttributes;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> KongAdminClient {
        KongAdminClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn upsert_service_puts_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/services/lambda-dummy-service"))
            .and(body_json(json!({"url": "http://localhost:8001", "tags": ["sls"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "svc-1",
                "name": "lambda-dummy-service",
                "host": "localhost",
                "port": 8001,
                "tags": ["sls"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = client(&server)
            .upsert_service(
                "lambda-dummy-service",
                &ServiceSpec { url: "http://localhost:8001".into(), tags: vec!["sls".into()] },
            )
            .await
            .unwrap();
        assert_eq!(svc.id, "svc-1");
        assert_eq!(svc.extra.get("port"), Some(&json!(8001)));
    }

    #[tokio::test]
    async fn missing_service_reads_as_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).get_service("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_routes_follows_relative_next() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/svc/routes"))
            .and(query_param("offset", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "r2"}],
                "next": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/svc/routes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "r1", "paths": ["/a"], "service": {"id": "svc-1"}}],
                "next": "/services/svc/routes?offset=abc",
                "offset": "abc"
            })))
            .mount(&server)
            .await;

        let admin = client(&server);
        let first = admin.list_routes("svc", None).await.unwrap();
        assert_eq!(first.data[0].id, "r1");
        let cursor = first.cursor().unwrap();
        let second = admin.list_routes("svc", Some(&cursor)).await.unwrap();
        assert_eq!(second.data[0].id, "r2");
        assert!(second.cursor().is_none());
    }

    #[tokio::test]
    async fn create_route_posts_service_and_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/routes"))
            .and(body_json(json!({"service": {"id": "svc-1"}, "paths": ["/api/users"]})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "r1",
                "name": null,
                "paths": ["/api/users"],
                "service": {"id": "svc-1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let route = client(&server)
            .create_route(&NewRoute::new("svc-1", RouteAttributes::with_paths(["/api/users"])))
            .await
            .unwrap();
        assert_eq!(route.id, "r1");
        assert_eq!(route.name, None);
    }

    #[tokio::test]
    async fn rename_and_plugin_calls() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/routes/r1"))
            .and(body_json(json!({"name": "users-list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r1", "name": "users-list"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/routes/r1/plugins"))
            .and(body_json(json!({
                "name": "aws-lambda",
                "config": {"function_name": "users-list"},
                "enabled": true,
                "tags": []
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p1",
                "name": "aws-lambda",
                "config": {"function_name": "users-list"},
                "route": {"id": "r1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let admin = client(&server);
        let renamed = admin.update_route("r1", "users-list").await.unwrap();
        assert_eq!(renamed.name.as_deref(), Some("users-list"));

        let mut config = kongsync_core::ConfigMap::new();
        config.insert("function_name".into(), json!("users-list"));
        let plugin = admin
            .add_plugin("r1", &PluginSpec::new("aws-lambda", config))
            .await
            .unwrap();
        assert_eq!(plugin.id, "p1");
        assert!(plugin.enabled);
    }

    #[tokio::test]
    async fn error_status_carries_kong_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/routes/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
            .mount(&server)
            .await;

        let err = client(&server).delete_route("missing").await.unwrap_err();
        assert_eq!(err, AdminError::status("DELETE", "/routes/missing", 404, "Not found"));
    }

    #[tokio::test]
    async fn admin_token_and_path_prefix_are_applied() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/admin/routes/r9"))
            .and(header("kong-admin-token", "s3cret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let admin = KongAdminClient::new(
            &format!("{}/admin/", server.uri()),
            Some("s3cret"),
            Duration::from_secs(5),
        )
        .unwrap();
        admin.delete_route("r9").await.unwrap();
    }

    #[test]
    fn bare_offset_cursor_becomes_query() {
        let admin = KongAdminClient::new("http://kong:8001", None, Duration::from_secs(1)).unwrap();
        let url = admin.cursor_url("svc", &PageToken("xyz".into())).unwrap();
        assert_eq!(url.as_str(), "http://kong:8001/services/svc/routes?offset=xyz");
    }
}
