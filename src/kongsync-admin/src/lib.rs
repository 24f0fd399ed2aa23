pub mod client;
pub mod dry_run;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod reader;

pub use client::*;
pub use dry_run::*;
#[cfg(any(test, feature = "testing"))]
pub use memory::*;
pub use reader::*;

use async_trait::async_trait;
use kongsync_core::{NewRoute, Page, PageToken, PluginRecord, PluginSpec, RemoteRoute, ServiceSpec, VirtualService};
use kongsync_errors::AdminError;

/// The admin api operations a sync run needs.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Create-or-update keyed by name.
    async fn upsert_service(&self, name: &str, spec: &ServiceSpec) -> Result<VirtualService, AdminError>;

    async fn get_service(&self, name: &str) -> Result<Option<VirtualService>, AdminError>;

    /// One page of the routes of `service` (name or id). `page` is the cursor of the previous page.
    async fn list_routes(
        &self,
        service: &str,
        page: Option<&PageToken>,
    ) -> Result<Page<RemoteRoute>, AdminError>;

    async fn create_route(&self, route: &NewRoute) -> Result<RemoteRoute, AdminError>;

    async fn update_route(&self, id: &str, name: &str) -> Result<RemoteRoute, AdminError>;

    async fn delete_route(&self, id: &str) -> Result<(), AdminError>;

    async fn add_plugin(&self, route_id: &str, plugin: &PluginSpec) -> Result<PluginRecord, AdminError>;
}
