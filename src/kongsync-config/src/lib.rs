pub mod manifest;

pub use manifest::*;

use anyhow::{anyhow, Context, Result};
use kongsync_core::{ConfigMap, FunctionEntry, RouteDefaults};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use tracing::debug;

pub const DEFAULT_ADMIN_URL: &str = "http://localhost:8001";
pub const DEFAULT_REGION: &str = "us-east-1";

fn def_admin_url() -> String { DEFAULT_ADMIN_URL.into() }
fn def_timeout() -> u64 { 30 }
fn def_concurrency() -> usize { 8 }
fn def_invocation_plugin() -> String { "aws-lambda".into() }
fn def_service_name() -> String { "lambda-dummy-service".into() }
fn def_service_url() -> String { DEFAULT_ADMIN_URL.into() }

// ---------- custom.kong ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KongCfg {
    #[serde(default = "def_admin_url")]
    pub admin_api_url: String,
    #[serde(default)]
    pub admin_token: Option<String>,
    #[serde(default = "def_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "def_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub service: ServiceCfg,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub lambda: ConfigMap,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "def_invocation_plugin")]
    pub invocation_plugin: String,
    /// Flat credential keys, folded into the lambda defaults.
    #[serde(default)]
    pub aws_key: Option<String>,
    #[serde(default)]
    pub aws_secret: Option<String>,
}

impl Default for KongCfg {
    fn default() -> Self {
        Self {
            admin_api_url: def_admin_url(),
            admin_token: None,
            timeout_secs: def_timeout(),
            concurrency: def_concurrency(),
            service: ServiceCfg::default(),
            base_path: String::new(),
            tags: vec![],
            lambda: ConfigMap::new(),
            region: None,
            invocation_plugin: def_invocation_plugin(),
            aws_key: None,
            aws_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCfg {
    #[serde(default = "def_service_name")]
    pub name: String,
    #[serde(default = "def_service_url")]
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for ServiceCfg {
    fn default() -> Self {
        Self {
            name: def_service_name(),
            url: def_service_url(),
            tags: vec![],
        }
    }
}

impl KongCfg {
    /// Global lambda defaults; an explicit `lambda.aws_key` beats the flat `aws_key`.
    pub fn lambda_defaults(&self) -> ConfigMap {
        let mut out = ConfigMap::new();
        if let Some(key) = &self.aws_key {
            out.insert("aws_key".into(), Value::String(key.clone()));
        }
        if let Some(secret) = &self.aws_secret {
            out.insert("aws_secret".into(), Value::String(secret.clone()));
        }
        for (k, v) in &self.lambda {
            out.insert(k.clone(), v.clone());
        }
        out
    }

    pub fn route_defaults(&self) -> RouteDefaults {
        RouteDefaults {
            base_path: self.base_path.clone(),
            tags: self.tags.clone(),
            lambda: self.lambda_defaults(),
        }
    }
}

// ---------- loading ----------

fn parse_by_extension<T: DeserializeOwned>(path: &str, content: &str) -> Result<T> {
    if path.ends_with(".yaml") || path.ends_with(".yml") {
        Ok(serde_yml::from_str(content)?)
    } else if path.ends_with(".json") {
        Ok(serde_json::from_str(content)?)
    } else if path.ends_with(".toml") {
        Ok(toml::from_str(content)?)
    } else {
        Err(anyhow!("Unknown config extension: {}", path))
    }
}

pub fn load_manifest(path: &str) -> Result<Manifest> {
    let content = fs::read_to_string(path).with_context(|| format!("read manifest {}", path))?;
    parse_by_extension(path, &content).with_context(|| format!("parse manifest {}", path))
}

/// Standalone sync config, same shape as `custom.kong`.
pub fn load_config(path: &str) -> Result<KongCfg> {
    let content = fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    parse_by_extension(path, &content).with_context(|| format!("parse config {}", path))
}

/// Command-line / environment values that beat the files.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<String>,
    pub admin_url: Option<String>,
    pub admin_token: Option<String>,
    pub stage: Option<String>,
    pub region: Option<String>,
    pub concurrency: Option<usize>,
}

/// Everything a run needs, resolved from manifest, config file and overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub kong: KongCfg,
    pub stage: String,
    pub region: String,
    pub functions: Vec<FunctionEntry>,
}

impl Settings {
    pub fn load(manifest_path: &str, overrides: Overrides) -> Result<Self> {
        let manifest = load_manifest(manifest_path)?;
        let file_cfg = match &overrides.config {
            Some(path) => Some(load_config(path)?),
            None => None,
        };
        Ok(Self::resolve(manifest, file_cfg, overrides))
    }

    /// A standalone config file stands in for `custom.kong` as a whole; CLI overrides win over both.
    pub fn resolve(manifest: Manifest, file_cfg: Option<KongCfg>, overrides: Overrides) -> Self {
        let mut kong = file_cfg
            .or_else(|| manifest.custom.kong.clone())
            .unwrap_or_default();

        if let Some(url) = overrides.admin_url {
            kong.admin_api_url = url;
        }
        if let Some(token) = overrides.admin_token {
            kong.admin_token = Some(token);
        }
        if let Some(n) = overrides.concurrency {
            kong.concurrency = n;
        }
        kong.concurrency = kong.concurrency.max(1);

        let stage = overrides.stage.unwrap_or_else(|| manifest.provider.stage.clone());
        let region = overrides
            .region
            .or_else(|| kong.region.clone())
            .or_else(|| manifest.provider.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let functions = manifest.function_entries(&stage, &region);
        debug!(
            functions = functions.len(),
            stage = %stage,
            region = %region,
            admin = %kong.admin_api_url,
            "settings resolved"
        );

        Self { kong, stage, region, functions }
    }
}
