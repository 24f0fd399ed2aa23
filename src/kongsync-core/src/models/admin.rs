use serde::{Deserialize, Serialize};

use super::{nullable, ConfigMap, PluginSpec, RouteAttributes};

fn def_enabled() -> bool {
    true
}

// ---------- admin api entities ----------
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EntityRef {
    pub id: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The single service every synced route hangs off.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VirtualService {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: ConfigMap,
}

/// Body of a service upsert.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServiceSpec {
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RemoteRoute {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub paths: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub methods: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub hosts: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub protocols: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub service: Option<EntityRef>,
    #[serde(flatten)]
    pub extra: ConfigMap,
}

impl RemoteRoute {
    pub fn service_id(&self) -> Option<&str> {
        self.service.as_ref().map(|s| s.id.as_str())
    }
}

/// Body of a route creation: the service association plus the route attributes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewRoute {
    pub service: EntityRef,
    #[serde(flatten)]
    pub attributes: RouteAttributes,
}

impl NewRoute {
    pub fn new(service_id: impl Into<String>, attributes: RouteAttributes) -> Self {
        Self {
            service: EntityRef::new(service_id),
            attributes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginRecord {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub config: ConfigMap,
    #[serde(default = "def_enabled")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub route: Option<EntityRef>,
}

impl PluginRecord {
    pub fn attached(id: impl Into<String>, route_id: &str, spec: &PluginSpec) -> Self {
        Self {
            id: id.into(),
            name: spec.name.clone(),
            config: spec.config.clone(),
            enabled: spec.enabled,
            tags: spec.tags.clone(),
            route: Some(EntityRef::new(route_id)),
        }
    }
}

// ---------- pagination ----------

/// Opaque paging token handed back to the admin api verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(pub String);

impl PageToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a listing. A `null` (or missing) `next` is the only end-of-listing marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default, deserialize_with = "nullable")]
    pub data: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

impl<T> Page<T> {
    pub fn last(data: Vec<T>) -> Self {
        Self { data, next: None, offset: None }
    }

    pub fn cursor(&self) -> Option<PageToken> {
        self.next.clone().map(PageToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_route_tolerates_kong_nulls() {
        let route: RemoteRoute = serde_json::from_value(json!({
            "id": "8d6b1c1e",
            "name": null,
            "paths": ["/users"],
            "methods": ["GET"],
            "hosts": null,
            "tags": null,
            "strip_path": true,
            "service": {"id": "svc-1"}
        }))
        .unwrap();
        assert_eq!(route.name, None);
        assert!(route.hosts.is_empty());
        assert_eq!(route.service_id(), Some("svc-1"));
        assert_eq!(route.extra.get("strip_path"), Some(&json!(true)));
    }

    #[test]
    fn new_route_flattens_attributes() {
        let mut attrs = RouteAttributes::with_paths(["/api/users"]);
        attrs.methods = vec!["GET".into()];
        let body = serde_json::to_value(NewRoute::new("svc-1", attrs)).unwrap();
        assert_eq!(
            body,
            json!({"service": {"id": "svc-1"}, "paths": ["/api/users"], "methods": ["GET"]})
        );
    }

    #[test]
    fn page_next_null_is_terminal() {
        let page: Page<RemoteRoute> =
            serde_json::from_value(json!({"data": [], "next": null})).unwrap();
        assert!(page.cursor().is_none());

        let page: Page<RemoteRoute> = serde_json::from_value(json!({
            "data": [{"id": "a"}],
            "next": "/services/s/routes?offset=abc",
            "offset": "abc"
        }))
        .unwrap();
        assert_eq!(page.cursor(), Some(PageToken("/services/s/routes?offset=abc".into())));
        assert_eq!(page.data.len(), 1);
    }
}
