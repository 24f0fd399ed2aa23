pub mod admin;
pub mod desired;
pub mod manifest;

pub use admin::*;
pub use desired::*;
pub use manifest::*;

use serde::{Deserialize, Deserializer};

/// Free-form JSON object used for plugin and lambda configuration.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// The admin api reports empty collections as `null`; treat that the same as a missing field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
