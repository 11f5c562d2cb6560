//! Error types for ledger-store operations.

use thiserror::Error;

/// Errors from the ledger store.
#[derive(Debug, Error)]
pub enum DbError {
    /// Could not reach the database.
    #[error("database connection failed")]
    ConnectionFailed(#[source] sqlx::Error),

    /// Migration run failed.
    #[error("database migration failed")]
    MigrationFailed(#[from] sqlx::migrate::MigrateError),

    /// A query failed for a reason other than connectivity.
    #[error("database query failed")]
    QueryFailed(#[source] sqlx::Error),

    /// The referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The write would violate a store invariant.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

impl DbError {
    /// Whether the error means the database itself is unreachable, as opposed
    /// to a problem with one record. Callers treat these as fatal for the
    /// whole run rather than for the record.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => Self::ConnectionFailed(error),
            other => Self::QueryFailed(other),
        }
    }
}
