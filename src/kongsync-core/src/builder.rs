use std::collections::HashSet;
use tracing::{debug, warn};

use crate::{
    declaration_overrides, lambda_config, route_attributes, ConfigMap, DesiredRoute, FunctionEntry,
    GatewayDeclaration,
};

/// Run-wide defaults layered under every declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteDefaults {
    pub base_path: String,
    pub tags: Vec<String>,
    pub lambda: ConfigMap,
}

/// Turns the functions' gateway declarations into desired routes, in function then event order.
pub fn build(functions: &[FunctionEntry], defaults: &RouteDefaults) -> Vec<DesiredRoute> {
    let mut desired = Vec::new();
    // bare names of routed functions are reserved up front so no suffix can steal them
    let reserved: HashSet<&str> = functions
        .iter()
        .filter(|f| f.gateway_events().next().is_some())
        .map(|f| f.name.as_str())
        .collect();
    let mut taken: HashSet<String> = HashSet::new();

    for function in functions {
        for raw in function.gateway_events() {
            let decl = GatewayDeclaration::from_value(raw).unwrap_or_else(|e| {
                warn!(function = %function.name, key = %function.key, "unreadable gateway declaration: {e}");
                GatewayDeclaration::default()
            });

            let name = route_name(&function.name, &reserved, &taken);
            taken.insert(name.clone());

            let spec = decl
                .route
                .as_ref()
                .map(|r| route_attributes(r, &defaults.base_path, &defaults.tags));

            let plugins = decl
                .plugins
                .iter()
                .cloned()
                .map(|mut p| {
                    p.tags = defaults.tags.clone();
                    p
                })
                .collect();

            debug!(function = %function.name, route = %name, "desired route");
            desired.push(DesiredRoute {
                spec,
                owner: function.name.clone(),
                name,
                lambda_config: lambda_config(function, &defaults.lambda, declaration_overrides(&decl).as_ref()),
                plugins,
            });
        }
    }

    desired
}

/// The function's own name on its first route, then the lowest free `name-<n>` with `n >= 2`.
fn route_name(function: &str, reserved: &HashSet<&str>, taken: &HashSet<String>) -> String {
    if !taken.contains(function) {
        return function.to_string();
    }
    (2..)
        .map(|n| format!("{function}-{n}"))
        .find(|candidate| !taken.contains(candidate) && !reserved.contains(candidate.as_str()))
        .unwrap_or_else(|| function.to_string())
}
