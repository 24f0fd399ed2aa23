use kongsync_core::{EventDeclaration, FunctionEntry};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::KongCfg;

fn def_stage() -> String {
    "dev".into()
}

// ---------- serverless.yml ----------
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub service: ServiceName,
    #[serde(default)]
    pub provider: ProviderCfg,
    #[serde(default)]
    pub functions: FunctionDecls,
    #[serde(default)]
    pub custom: CustomCfg,
}

/// `service: users-api` or `service: { name: users-api }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceName {
    Plain(String),
    Named { name: String },
}

impl Default for ServiceName {
    fn default() -> Self {
        ServiceName::Plain(String::new())
    }
}

impl ServiceName {
    pub fn as_str(&self) -> &str {
        match self {
            ServiceName::Plain(s) => s,
            ServiceName::Named { name } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCfg {
    #[serde(default)]
    pub name: String,
    #[serde(default = "def_stage")]
    pub stage: String,
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for ProviderCfg {
    fn default() -> Self {
        Self {
            name: String::new(),
            stage: def_stage(),
            region: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CustomCfg {
    #[serde(default)]
    pub kong: Option<KongCfg>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FunctionDecl {
    /// Explicit deployed name; defaults to `<service>-<stage>-<key>`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub events: Option<Vec<EventDeclaration>>,
}

/// `functions:` mapping, kept in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FunctionDecls(pub Vec<(String, FunctionDecl)>);

impl<'de> Deserialize<'de> for FunctionDecls {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FunctionDeclsVisitor;

        impl<'de> Visitor<'de> for FunctionDeclsVisitor {
            type Value = FunctionDecls;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a map of function name to function declaration")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, decl)) = map.next_entry::<String, Option<FunctionDecl>>()? {
                    out.push((key, decl.unwrap_or_default()));
                }
                Ok(FunctionDecls(out))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(FunctionDecls::default())
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(FunctionDecls::default())
            }
        }

        deserializer.deserialize_any(FunctionDeclsVisitor)
    }
}

impl Manifest {
    pub fn service_name(&self) -> &str {
        self.service.as_str()
    }

    /// Function entries for the run, in manifest order.
    pub fn function_entries(&self, stage: &str, region: &str) -> Vec<FunctionEntry> {
        self.functions
            .0
            .iter()
            .map(|(key, decl)| FunctionEntry {
                key: key.clone(),
                name: decl
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{}-{}-{}", self.service_name(), stage, key)),
                region: region.to_string(),
                events: decl.events.clone().unwrap_or_default(),
            })
            .collect()
    }
}
