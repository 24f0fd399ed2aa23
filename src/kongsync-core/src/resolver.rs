use serde_json::Value;

use crate::{ConfigMap, FunctionEntry, GatewayDeclaration, LambdaConfig, RouteAttributes};

pub const FUNCTION_NAME_KEY: &str = "function_name";
pub const AWS_REGION_KEY: &str = "aws_region";

/// Shallow right-biased merge: keys in `overrides` win, everything else keeps its default.
pub fn resolve(defaults: &ConfigMap, overrides: &ConfigMap) -> ConfigMap {
    merge_layers([defaults, overrides])
}

/// Applies mapping layers in precedence order, lowest first. Nested objects are replaced, not merged.
pub fn merge_layers<'a, I>(layers: I) -> ConfigMap
where
    I: IntoIterator<Item = &'a ConfigMap>,
{
    let mut merged = ConfigMap::new();
    for layer in layers {
        for (k, v) in layer {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

/// `{aws_region, function_name}` < global lambda defaults < per-route override.
pub fn lambda_config(
    function: &FunctionEntry,
    defaults: &ConfigMap,
    overrides: Option<&ConfigMap>,
) -> LambdaConfig {
    let mut seed = ConfigMap::new();
    seed.insert(AWS_REGION_KEY.into(), Value::String(function.region.clone()));
    seed.insert(FUNCTION_NAME_KEY.into(), Value::String(function.name.clone()));

    let empty = ConfigMap::new();
    merge_layers([&seed, defaults, overrides.unwrap_or(&empty)])
}

/// Per-route override layer: flat `region`/`aws_key`/`aws_secret` under the `lambda` block.
pub fn declaration_overrides(decl: &GatewayDeclaration) -> Option<ConfigMap> {
    let mut flat = ConfigMap::new();
    let keys = [
        (AWS_REGION_KEY, &decl.region),
        ("aws_key", &decl.aws_key),
        ("aws_secret", &decl.aws_secret),
    ];
    for (key, value) in keys {
        if let Some(v) = value {
            flat.insert(key.into(), Value::String(v.clone()));
        }
    }

    match (&decl.lambda_override, flat.is_empty()) {
        (None, true) => None,
        (None, false) => Some(flat),
        (Some(lambda), _) => Some(resolve(&flat, lambda)),
    }
}

/// Private copy of `route` with `base_path` prepended to each path and tags replaced by `tags`.
pub fn route_attributes(route: &RouteAttributes, base_path: &str, tags: &[String]) -> RouteAttributes {
    let mut out = route.clone();
    out.paths = route
        .paths
        .iter()
        .map(|p| format!("{base_path}{p}"))
        .collect();
    out.tags = tags.to_vec();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> ConfigMap {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn override_wins_and_defaults_survive() {
        let merged = resolve(&map(json!({"a": 1, "b": 2})), &map(json!({"b": 3, "c": 4})));
        assert_eq!(Value::Object(merged), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn merge_is_shallow() {
        let merged = resolve(
            &map(json!({"nested": {"x": 1, "y": 2}})),
            &map(json!({"nested": {"x": 9}})),
        );
        assert_eq!(merged["nested"], json!({"x": 9}));
    }

    #[test]
    fn lambda_precedence() {
        let f = FunctionEntry::new("f", "us-east-1");
        let resolved = lambda_config(
            &f,
            &map(json!({"timeout": 10})),
            Some(&map(json!({"timeout": 30, "aws_key": "X"}))),
        );
        assert_eq!(
            Value::Object(resolved),
            json!({"aws_region": "us-east-1", "function_name": "f", "timeout": 30, "aws_key": "X"})
        );
    }

    #[test]
    fn seeds_can_be_overridden() {
        let f = FunctionEntry::new("f", "us-east-1");
        let resolved = lambda_config(
            &f,
            &map(json!({"aws_region": "eu-west-1"})),
            Some(&map(json!({"function_name": "alias-f"}))),
        );
        assert_eq!(resolved["aws_region"], json!("eu-west-1"));
        assert_eq!(resolved["function_name"], json!("alias-f"));
    }

    #[test]
    fn flat_event_keys_override_defaults_but_not_lambda_block() {
        let decl = GatewayDeclaration::from_value(&json!({
            "region": "eu-central-1",
            "aws_key": "event-key",
            "aws_secret": "event-secret",
            "lambda": {"aws_secret": "block-secret"}
        }))
        .unwrap();
        let f = FunctionEntry::new("f", "us-east-1");
        let resolved = lambda_config(
            &f,
            &map(json!({"aws_key": "global-key", "aws_secret": "global-secret"})),
            declaration_overrides(&decl).as_ref(),
        );
        assert_eq!(
            Value::Object(resolved),
            json!({
                "function_name": "f",
                "aws_region": "eu-central-1",
                "aws_key": "event-key",
                "aws_secret": "block-secret"
            })
        );
    }

    #[test]
    fn no_event_settings_means_no_override() {
        let decl = GatewayDeclaration::from_value(&json!({"route": {"paths": ["/x"]}})).unwrap();
        assert_eq!(declaration_overrides(&decl), None);
    }

    #[test]
    fn base_path_is_plain_concatenation() {
        let route = RouteAttributes::with_paths(["/users", "users"]);
        let out = route_attributes(&route, "/api", &[]);
        assert_eq!(out.paths, vec!["/api/users", "/apiusers"]);
        assert_eq!(route.paths, vec!["/users", "users"]);
    }

    #[test]
    fn tags_are_replaced() {
        let mut route = RouteAttributes::with_paths(["/x"]);
        route.tags = vec!["manual".into()];
        let out = route_attributes(&route, "", &["managed-by-kongsync".to_string()]);
        assert_eq!(out.tags, vec!["managed-by-kongsync"]);
    }
}
