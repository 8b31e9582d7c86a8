use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::lookup::{CustomKind, LookupError};
use crate::validation::FieldErrors;

#[derive(Debug, Error)]
pub enum TakeoffError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("takeoff model {model_id} not found")]
    ModelNotFound { model_id: String },
    #[error("estimate {estimate_id} not found")]
    EstimateNotFound { estimate_id: String },
    #[error("estimate {estimate_id} has no takeoff model configured")]
    ModelNotConfigured { estimate_id: String },
    #[error("price list {price_list_id} not found")]
    PriceListNotFound { price_list_id: String },
    #[error("{kind} {name} not found on takeoff model {model_id}")]
    CustomValueNotFound {
        model_id: String,
        kind: CustomKind,
        name: String,
    },
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("lookup failed: {0}")]
    Lookup(#[from] LookupError),
    #[error("script failed: {message}")]
    Script { message: String, logs: Vec<String> },
    #[error("failed to reconcile {kind}s of takeoff model {model_id}: {source}")]
    Reconciliation {
        model_id: String,
        kind: CustomKind,
        source: rusqlite::Error,
    },
    #[error("failed to persist results of estimate {estimate_id}: {source}")]
    ResultsPersistence {
        estimate_id: String,
        source: rusqlite::Error,
    },
    #[error("takeoff store path not configured")]
    MissingStore,
    #[error("failed to open database at {path}: {source}")]
    OpenDatabase {
        path: PathBuf,
        source: rusqlite::Error,
    },
}

/// Coarse classification used by callers to decide how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ScriptFailure,
    ValidationFailure,
    PersistenceFailure,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ScriptFailure => "script_failure",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::PersistenceFailure => "persistence_failure",
            ErrorKind::Storage => "storage",
        };
        f.write_str(label)
    }
}

impl TakeoffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TakeoffError::ModelNotFound { .. }
            | TakeoffError::EstimateNotFound { .. }
            | TakeoffError::ModelNotConfigured { .. }
            | TakeoffError::PriceListNotFound { .. }
            | TakeoffError::CustomValueNotFound { .. } => ErrorKind::NotFound,
            TakeoffError::Script { .. } | TakeoffError::Lookup(_) => ErrorKind::ScriptFailure,
            TakeoffError::Validation(_) => ErrorKind::ValidationFailure,
            TakeoffError::Reconciliation { .. } | TakeoffError::ResultsPersistence { .. } => {
                ErrorKind::PersistenceFailure
            }
            TakeoffError::Database(_)
            | TakeoffError::Serde(_)
            | TakeoffError::MissingStore
            | TakeoffError::OpenDatabase { .. } => ErrorKind::Storage,
        }
    }

    /// Diagnostics the script produced before failing, if any.
    pub fn script_logs(&self) -> &[String] {
        match self {
            TakeoffError::Script { logs, .. } => logs,
            _ => &[],
        }
    }
}

impl From<FieldErrors> for TakeoffError {
    fn from(errors: FieldErrors) -> Self {
        TakeoffError::Validation(errors)
    }
}

pub type TakeoffResult<T> = std::result::Result<T, TakeoffError>;
