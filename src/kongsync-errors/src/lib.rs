use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ---------- single admin api call ----------

/// Failure of one call against the gateway's Admin API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdminError {
    #[error("{method} {path} returned {status}: {message}")]
    Status {
        method: String,
        path: String,
        status: u16,
        message: String,
    },
    #[error("admin api request failed: {0}")]
    Transport(String),
    #[error("unexpected admin api payload: {0}")]
    Decode(String),
    #[error("pagination error: {0}")]
    Pagination(String),
    #[error("missing field `{0}`")]
    MissingField(String),
}

impl AdminError {
    pub fn status(method: &str, path: &str, status: u16, message: impl Into<String>) -> Self {
        AdminError::Status {
            method: method.to_string(),
            path: path.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AdminError::Status { status: 404, .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AdminError::Status { status: 409, .. })
    }
}

// ---------- fatal run errors ----------

/// Errors that abort a reconciliation run before any route is touched.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to upsert service `{service}`: {source}")]
    ServiceUpsert {
        service: String,
        #[source]
        source: AdminError,
    },
    #[error("failed to read existing routes of service `{service}`: {source}")]
    Snapshot {
        service: String,
        #[source]
        source: AdminError,
    },
}

// ---------- per-route failures ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    CreateRoute,
    AddPlugin { plugin: String },
    DeleteRoute,
    RenameRoute { name: String },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateRoute => write!(f, "create route"),
            Operation::AddPlugin { plugin } => write!(f, "add plugin `{plugin}`"),
            Operation::DeleteRoute => write!(f, "delete route"),
            Operation::RenameRoute { name } => write!(f, "rename route to `{name}`"),
        }
    }
}

/// One failed operation of a run that did not abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteFailure {
    pub route_id: Option<String>,
    pub owner: Option<String>,
    pub operation: Operation,
    pub error: String,
}

impl RouteFailure {
    pub fn new(operation: Operation, error: impl fmt::Display) -> Self {
        Self {
            route_id: None,
            owner: None,
            operation,
            error: error.to_string(),
        }
    }

    pub fn route(mut self, id: impl Into<String>) -> Self {
        self.route_id = Some(id.into());
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

impl fmt::Display for RouteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if let Some(owner) = &self.owner {
            write!(f, " for function `{owner}`")?;
        }
        if let Some(id) = &self.route_id {
            write!(f, " (route {id})")?;
        }
        write!(f, ": {}", self.error)
    }
}
