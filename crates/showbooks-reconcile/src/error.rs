//! Error types for the reconciliation engine.
//!
//! Only structural failures surface as [`EngineError`]: they abort the run.
//! Per-record failures (an external call rejected one record, a single row
//! failed to persist) are absorbed into the run summary and never abort a
//! pass; see [`crate::summary::FailedRecord`].

use showbooks_db::models::BatchRunStatus;
use showbooks_db::DbError;
use std::fmt;
use uuid::Uuid;

/// Structural failures of a reconciliation run.
///
/// `Display`, `Error`, and `From` are implemented by hand because
/// `Conflict.source` is the name of the originating log, not an error
/// cause, and derived `thiserror::Error` would treat any field named
/// `source` as the cause (requiring `String: std::error::Error`).
#[derive(Debug)]
pub enum EngineError {
    /// Another run for the same source is already STARTED.
    Conflict { source: String },

    /// The run is not in the state the transition requires.
    InvalidState {
        run_id: Uuid,
        status: BatchRunStatus,
    },

    /// The run id does not exist.
    RunNotFound(Uuid),

    /// The store itself failed; for connection failures the whole run is
    /// aborted rather than a single record.
    Store(DbError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { source } => {
                write!(f, "a run for source '{source}' is already in progress")
            }
            Self::InvalidState { run_id, status } => {
                write!(f, "run {run_id} cannot transition from {status}")
            }
            Self::RunNotFound(run_id) => write!(f, "run {run_id} not found"),
            Self::Store(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => std::error::Error::source(err),
            _ => None,
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        Self::Store(err)
    }
}

impl EngineError {
    /// Whether beginning the run was refused without any writes.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
