use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{nullable, ConfigMap};

/// Event key marking a gateway-routing declaration.
pub const GATEWAY_EVENT_KEY: &str = "kong";

fn def_enabled() -> bool {
    true
}

// ---------- functions (read-only view of the manifest) ----------
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FunctionEntry {
    /// Key the function is declared under in the manifest.
    pub key: String,
    /// Deployed function name, used as `function_name` and as the final route name.
    pub name: String,
    pub region: String,
    #[serde(default, deserialize_with = "nullable")]
    pub events: Vec<EventDeclaration>,
}

impl FunctionEntry {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            region: region.into(),
            events: vec![],
        }
    }

    pub fn with_event(mut self, event: EventDeclaration) -> Self {
        self.events.push(event);
        self
    }

    pub fn gateway_events(&self) -> impl Iterator<Item = &Value> {
        self.events.iter().filter_map(EventDeclaration::gateway)
    }
}

/// Opaque event entry; only the gateway declaration is ever inspected.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct EventDeclaration(pub Value);

impl EventDeclaration {
    pub fn gateway(&self) -> Option<&Value> {
        self.0.get(GATEWAY_EVENT_KEY)
    }
}

impl From<Value> for EventDeclaration {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

// ---------- kong event ----------
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GatewayDeclaration {
    #[serde(default)]
    pub route: Option<RouteAttributes>,
    #[serde(default, rename = "lambda")]
    pub lambda_override: Option<ConfigMap>,
    #[serde(default, deserialize_with = "nullable")]
    pub plugins: Vec<PluginSpec>,
    /// Flat per-event invocation settings; an explicit `lambda` block beats them.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub aws_key: Option<String>,
    #[serde(default)]
    pub aws_secret: Option<String>,
}

impl GatewayDeclaration {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        GatewayDeclaration::deserialize(value)
    }
}

/// Route fields understood by the admin api. Unknown keys ride along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RouteAttributes {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: ConfigMap,
}

impl RouteAttributes {
    pub fn with_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginSpec {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub config: ConfigMap,
    #[serde(default = "def_enabled")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, config: ConfigMap) -> Self {
        Self {
            name: name.into(),
            config,
            enabled: true,
            tags: vec![],
        }
    }
}
