//! Batch runs: one row per reconciliation run of a purchase-order log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "batch_run_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchRunStatus {
    /// Registered, not yet picked up.
    Pending,
    /// Reconciliation in progress. At most one per source.
    Started,
    /// All four passes finished; per-record failures may still be recorded.
    Completed,
    /// Aborted by a structural failure.
    Failed,
}

impl BatchRunStatus {
    /// Completed and failed runs never transition again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for BatchRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// A batch run record.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct BatchRun {
    pub id: Uuid,

    /// Identifier of the originating log, e.g. a board or spreadsheet id.
    pub source: String,

    /// Project the log belongs to, when the source is scoped to one.
    pub project_number: Option<i32>,

    pub status: BatchRunStatus,

    /// Failure description, set only on FAILED runs.
    pub error_message: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to register a new run.
#[derive(Debug, Clone)]
pub struct CreateBatchRun {
    pub source: String,
    pub project_number: Option<i32>,
}

impl BatchRun {
    /// Build an in-memory PENDING run.
    #[must_use]
    pub fn new(data: &CreateBatchRun) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source: data.source.clone(),
            project_number: data.project_number,
            status: BatchRunStatus::Pending,
            error_message: None,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Register a new PENDING run.
    pub async fn create(pool: &PgPool, data: CreateBatchRun) -> Result<Self, sqlx::Error> {
        let run = BatchRun::new(&data);
        sqlx::query_as(
            r"
            INSERT INTO batch_run (id, source, project_number, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(run.id)
        .bind(&run.source)
        .bind(run.project_number)
        .bind(run.status)
        .bind(run.created_at)
        .bind(run.updated_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM batch_run WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The run currently holding the STARTED slot for a source, if any.
    /// The partial unique index on (source) guarantees at most one.
    pub async fn find_started_by_source(
        pool: &PgPool,
        source: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM batch_run
            WHERE source = $1 AND status = 'STARTED'
            LIMIT 1
            ",
        )
        .bind(source)
        .fetch_optional(pool)
        .await
    }

    /// Transition PENDING to STARTED. Returns `None` when the run is not
    /// PENDING; the conditional UPDATE makes the transition atomic.
    pub async fn mark_started(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE batch_run
            SET status = 'STARTED', started_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Transition STARTED to COMPLETED. Returns `None` when the run is not
    /// STARTED.
    pub async fn mark_completed(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE batch_run
            SET status = 'COMPLETED', finished_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'STARTED'
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Transition STARTED to FAILED with a failure description. Returns
    /// `None` when the run is not STARTED.
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        error_message: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE batch_run
            SET status = 'FAILED', error_message = $2, finished_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'STARTED'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(error_message)
        .fetch_optional(pool)
        .await
    }

    /// List runs, newest first, with optional project and status filters.
    pub async fn list(
        pool: &PgPool,
        project_number: Option<i32>,
        status: Option<BatchRunStatus>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM batch_run
            WHERE ($1 IS NULL OR project_number = $1)
              AND ($2 IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            ",
        )
        .bind(project_number)
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_runs_are_pending() {
        let run = BatchRun::new(&CreateBatchRun {
            source: "board-8821".to_string(),
            project_number: Some(2417),
        });
        assert_eq!(run.status, BatchRunStatus::Pending);
        assert!(run.started_at.is_none());
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!BatchRunStatus::Pending.is_terminal());
        assert!(!BatchRunStatus::Started.is_terminal());
        assert!(BatchRunStatus::Completed.is_terminal());
        assert!(BatchRunStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&BatchRunStatus::Started).unwrap();
        assert_eq!(json, "\"STARTED\"");
        assert_eq!(BatchRunStatus::Completed.to_string(), "COMPLETED");
    }
}
