pub mod report;

pub use report::*;

use futures::stream::{self, StreamExt};
use kongsync_admin::{list_all, AdminApi};
use kongsync_core::{DesiredRoute, NewRoute, RemoteRoute, ServiceSpec, VirtualService};
use kongsync_errors::{AdminError, Operation, RouteFailure, SyncError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Steps of a run, always taken in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    EnsureService,
    SnapshotExisting,
    ApplyDesired,
    DeleteStale,
    RenameNew,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::EnsureService => "ensure-service",
            Phase::SnapshotExisting => "snapshot-existing",
            Phase::ApplyDesired => "apply-desired",
            Phase::DeleteStale => "delete-stale",
            Phase::RenameNew => "rename-new",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub service_name: String,
    pub service: ServiceSpec,
    pub invocation_plugin: String,
    /// Upper bound on in-flight calls within one phase.
    pub concurrency: usize,
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            service_name: "lambda-dummy-service".into(),
            service: ServiceSpec {
                url: "http://localhost:8001".into(),
                tags: vec![],
            },
            invocation_plugin: "aws-lambda".into(),
            concurrency: 8,
            dry_run: false,
        }
    }
}

/// Failures appended from concurrently running per-route operations.
#[derive(Debug, Default)]
struct FailureLog(Mutex<Vec<RouteFailure>>);

impl FailureLog {
    fn push(&self, failure: RouteFailure) {
        warn!("{failure}");
        self.0.lock().push(failure);
    }

    fn into_inner(self) -> Vec<RouteFailure> {
        self.0.into_inner()
    }
}

/// A route created in this run, with its plugins, waiting for its final name.
#[derive(Debug, Clone)]
struct Applied {
    route: RemoteRoute,
    owner: String,
    name: String,
    plugins: Vec<String>,
}

pub struct Reconciler<A: ?Sized> {
    api: Arc<A>,
    options: ReconcileOptions,
}

impl<A: AdminApi + ?Sized> Reconciler<A> {
    pub fn new(api: Arc<A>, options: ReconcileOptions) -> Self {
        Self { api, options }
    }

    fn width(&self) -> usize {
        self.options.concurrency.max(1)
    }

    /// Converges the service's routes onto `desired`.
    ///
    /// Only the service upsert and the snapshot of existing routes can fail the run.
    /// Everything after that is best effort and lands in [`SyncReport::failures`].
    #[instrument(skip_all, fields(service = %self.options.service_name, desired = desired.len()))]
    pub async fn run(&self, desired: &[DesiredRoute]) -> Result<SyncReport, SyncError> {
        let start = Instant::now();

        enter(Phase::EnsureService);
        let service = self.ensure_service().await?;

        enter(Phase::SnapshotExisting);
        let existing = self.snapshot().await?;

        let failures = FailureLog::default();

        enter(Phase::ApplyDesired);
        let applied = self.apply_desired(&service, desired, &failures).await;

        enter(Phase::DeleteStale);
        let deleted = self.delete_stale(&existing, &failures).await;

        // new routes only claim their names once every stale route has been dealt with
        enter(Phase::RenameNew);
        let routes = self.rename_new(applied, &failures).await;

        enter(Phase::Done);
        let report = SyncReport {
            service,
            routes,
            deleted,
            failures: failures.into_inner(),
            dry_run: self.options.dry_run,
        };
        info!(
            routes = report.routes.len(),
            deleted = report.deleted.len(),
            failures = report.failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn ensure_service(&self) -> Result<VirtualService, SyncError> {
        let name = &self.options.service_name;
        let service = self
            .api
            .upsert_service(name, &self.options.service)
            .await
            .map_err(|source| SyncError::ServiceUpsert { service: name.clone(), source })?;
        debug!(id = %service.id, "service ready");
        Ok(service)
    }

    async fn snapshot(&self) -> Result<Vec<RemoteRoute>, SyncError> {
        let name = &self.options.service_name;
        let existing = list_all(self.api.as_ref(), name)
            .await
            .map_err(|source| SyncError::Snapshot { service: name.clone(), source })?;
        info!(existing = existing.len(), "existing routes snapshotted");
        Ok(existing)
    }

    async fn apply_desired(
        &self,
        service: &VirtualService,
        desired: &[DesiredRoute],
        failures: &FailureLog,
    ) -> Vec<Applied> {
        stream::iter(desired)
            .map(|d| self.apply_one(&service.id, d, failures))
            .buffer_unordered(self.width())
            .filter_map(|applied| async move { applied })
            .collect::<Vec<_>>()
            .await
    }

    async fn apply_one(&self, service_id: &str, desired: &DesiredRoute, failures: &FailureLog) -> Option<Applied> {
        let Some(spec) = &desired.spec else {
            failures.push(
                RouteFailure::new(Operation::CreateRoute, AdminError::MissingField("route".into()))
                    .owner(&desired.owner),
            );
            return None;
        };

        let route = match self.api.create_route(&NewRoute::new(service_id, spec.clone())).await {
            Ok(route) => route,
            Err(e) => {
                failures.push(RouteFailure::new(Operation::CreateRoute, e).owner(&desired.owner));
                return None;
            }
        };
        debug!(id = %route.id, owner = %desired.owner, "route created");

        let invocation = desired.invocation_plugin(&self.options.invocation_plugin);
        let mut plugins = Vec::with_capacity(desired.plugins.len() + 1);
        for plugin in std::iter::once(&invocation).chain(desired.plugins.iter()) {
            if let Err(e) = self.api.add_plugin(&route.id, plugin).await {
                failures.push(
                    RouteFailure::new(Operation::AddPlugin { plugin: plugin.name.clone() }, e)
                        .route(&route.id)
                        .owner(&desired.owner),
                );
                return None;
            }
            plugins.push(plugin.name.clone());
        }

        Some(Applied {
            route,
            owner: desired.owner.clone(),
            name: desired.name.clone(),
            plugins,
        })
    }

    async fn delete_stale(&self, existing: &[RemoteRoute], failures: &FailureLog) -> Vec<String> {
        stream::iter(existing)
            .map(|route| async move {
                match self.api.delete_route(&route.id).await {
                    Ok(()) => Some(route.id.clone()),
                    Err(e) => {
                        let mut failure = RouteFailure::new(Operation::DeleteRoute, e).route(&route.id);
                        failure.owner = route.name.clone();
                        failures.push(failure);
                        None
                    }
                }
            })
            .buffer_unordered(self.width())
            .filter_map(|id| async move { id })
            .collect::<Vec<_>>()
            .await
    }

    async fn rename_new(&self, applied: Vec<Applied>, failures: &FailureLog) -> Vec<ReconciledRoute> {
        stream::iter(applied)
            .map(|a| async move {
                match self.api.update_route(&a.route.id, &a.name).await {
                    Ok(_) => Some(ReconciledRoute {
                        id: a.route.id,
                        name: a.name,
                        owner: a.owner,
                        paths: a.route.paths,
                        plugins: a.plugins,
                    }),
                    Err(e) => {
                        failures.push(
                            RouteFailure::new(Operation::RenameRoute { name: a.name.clone() }, e)
                                .route(&a.route.id)
                                .owner(&a.owner),
                        );
                        None
                    }
                }
            })
            .buffer_unordered(self.width())
            .filter_map(|r| async move { r })
            .collect::<Vec<_>>()
            .await
    }
}

fn enter(phase: Phase) {
    debug!(%phase, "entering phase");
}
