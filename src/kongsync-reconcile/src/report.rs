use kongsync_core::VirtualService;
use kongsync_errors::RouteFailure;
use serde::Serialize;
use std::fmt;

/// A route that made it through every phase under its final name.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReconciledRoute {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub paths: Vec<String>,
    pub plugins: Vec<String>,
}

/// Terminal state of a run that got past service upsert and snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub service: VirtualService,
    pub routes: Vec<ReconciledRoute>,
    /// Ids of the previously existing routes that were removed.
    pub deleted: Vec<String>,
    pub failures: Vec<RouteFailure>,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn route_named(&self, name: &str) -> Option<&ReconciledRoute> {
        self.routes.iter().find(|r| r.name == name)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "would sync" } else { "synced" };
        writeln!(
            f,
            "{verb} service {} ({}): {} route(s), {} stale route(s) removed, {} failure(s)",
            self.service.name,
            self.service.id,
            self.routes.len(),
            self.deleted.len(),
            self.failures.len()
        )?;
        for route in &self.routes {
            writeln!(
                f,
                "  + {} {} [{}]",
                route.name,
                route.paths.join(","),
                route.plugins.join(",")
            )?;
        }
        for id in &self.deleted {
            writeln!(f, "  - {id}")?;
        }
        for failure in &self.failures {
            writeln!(f, "  ! {failure}")?;
        }
        Ok(())
    }
}
