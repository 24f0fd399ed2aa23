use async_trait::async_trait;
use kongsync_core::{
    NewRoute, Page, PageToken, PluginRecord, PluginSpec, RemoteRoute, ServiceSpec, VirtualService,
};
use kongsync_errors::AdminError;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use uuid::Uuid;

use crate::AdminApi;

/// Reads go to the wrapped admin api; writes are logged and answered with planned records.
pub struct DryRunAdmin<A> {
    inner: A,
    service_planned: AtomicBool,
}

fn planned_id(kind: &str) -> String {
    format!("planned-{kind}-{}", Uuid::new_v4())
}

impl<A: AdminApi> DryRunAdmin<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            service_planned: AtomicBool::new(false),
        }
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

#[async_trait]
impl<A: AdminApi> AdminApi for DryRunAdmin<A> {
    async fn upsert_service(&self, name: &str, spec: &ServiceSpec) -> Result<VirtualService, AdminError> {
        match self.inner.get_service(name).await? {
            Some(mut svc) => {
                info!("[dry-run] would update service {name} ({})", svc.id);
                svc.url = Some(spec.url.clone());
                svc.tags = spec.tags.clone();
                Ok(svc)
            }
            None => {
                info!("[dry-run] would create service {name} -> {}", spec.url);
                self.service_planned.store(true, Ordering::SeqCst);
                Ok(VirtualService {
                    id: planned_id("service"),
                    name: name.to_string(),
                    url: Some(spec.url.clone()),
                    tags: spec.tags.clone(),
                    ..Default::default()
                })
            }
        }
    }

    async fn get_service(&self, name: &str) -> Result<Option<VirtualService>, AdminError> {
        self.inner.get_service(name).await
    }

    async fn list_routes(
        &self,
        service: &str,
        page: Option<&PageToken>,
    ) -> Result<Page<RemoteRoute>, AdminError> {
        // a service that does not exist yet has no routes to list
        if self.service_planned.load(Ordering::SeqCst) {
            return Ok(Page::last(vec![]));
        }
        self.inner.list_routes(service, page).await
    }

    async fn create_route(&self, route: &NewRoute) -> Result<RemoteRoute, AdminError> {
        info!("[dry-run] would create route {:?}", route.attributes.paths);
        let attrs = &route.attributes;
        Ok(RemoteRoute {
            id: planned_id("route"),
            name: None,
            paths: attrs.paths.clone(),
            methods: attrs.methods.clone(),
            hosts: attrs.hosts.clone(),
            protocols: attrs.protocols.clone(),
            tags: attrs.tags.clone(),
            service: Some(route.service.clone()),
            extra: attrs.extra.clone(),
        })
    }

    async fn update_route(&self, id: &str, name: &str) -> Result<RemoteRoute, AdminError> {
        info!("[dry-run] would rename route {id} to {name}");
        Ok(RemoteRoute {
            id: id.to_string(),
            name: Some(name.to_string()),
            ..Default::default()
        })
    }

    async fn delete_route(&self, id: &str) -> Result<(), AdminError> {
        info!("[dry-run] would delete route {id}");
        Ok(())
    }

    async fn add_plugin(&self, route_id: &str, plugin: &PluginSpec) -> Result<PluginRecord, AdminError> {
        info!("[dry-run] would attach plugin {} to route {route_id}", plugin.name);
        Ok(PluginRecord::attached(planned_id("plugin"), route_id, plugin))
    }
}
