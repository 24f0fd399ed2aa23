use serde::Serialize;

use super::{ConfigMap, PluginSpec, RouteAttributes};

/// Invocation plugin config after layering, always carrying `function_name` and `aws_region`.
pub type LambdaConfig = ConfigMap;

/// One route the gateway should expose after the run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DesiredRoute {
    /// Route attributes with base path and tags applied. `None` when the
    /// declaration had no usable `route` block.
    pub spec: Option<RouteAttributes>,
    /// Deployed name of the owning function.
    pub owner: String,
    /// Name the route receives once stale routes are gone.
    pub name: String,
    pub lambda_config: LambdaConfig,
    pub plugins: Vec<PluginSpec>,
}

impl DesiredRoute {
    pub fn paths(&self) -> &[String] {
        self.spec.as_ref().map(|s| s.paths.as_slice()).unwrap_or_default()
    }

    /// The invocation plugin for this route, tagged like the route itself.
    pub fn invocation_plugin(&self, plugin_name: &str) -> PluginSpec {
        PluginSpec {
            name: plugin_name.to_string(),
            config: self.lambda_config.clone(),
            enabled: true,
            tags: self.spec.as_ref().map(|s| s.tags.clone()).unwrap_or_default(),
        }
    }
}
