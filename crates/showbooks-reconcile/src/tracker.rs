//! Batch-run state machine.
//!
//! The tracker is the only writer of the batch-run row during a run. It
//! layers the source-conflict and idempotency rules over the store's bare
//! compare-and-set transitions.

use crate::error::EngineError;
use showbooks_db::models::{BatchRun, BatchRunStatus};
use showbooks_db::LedgerStore;
use std::sync::Arc;
use uuid::Uuid;

pub struct RunTracker {
    store: Arc<dyn LedgerStore>,
}

impl RunTracker {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Transition PENDING to STARTED.
    ///
    /// Refused, without any writes, when another run for the same source is
    /// already STARTED ([`EngineError::Conflict`]) or when the run is not
    /// PENDING ([`EngineError::InvalidState`]).
    pub async fn begin(&self, run_id: Uuid) -> Result<BatchRun, EngineError> {
        let run = self
            .store
            .find_run(run_id)
            .await?
            .ok_or(EngineError::RunNotFound(run_id))?;

        if let Some(other) = self.store.find_started_run_for_source(&run.source).await? {
            if other.id != run.id {
                return Err(EngineError::Conflict { source: run.source });
            }
        }

        if run.status != BatchRunStatus::Pending {
            return Err(EngineError::InvalidState {
                run_id,
                status: run.status,
            });
        }

        // the conditional update loses cleanly if someone else got here first
        match self.store.begin_run(run_id).await? {
            Some(run) => {
                tracing::info!(%run_id, source = %run.source, "batch run started");
                Ok(run)
            }
            None => Err(EngineError::InvalidState {
                run_id,
                status: run.status,
            }),
        }
    }

    /// Transition STARTED to COMPLETED.
    pub async fn complete(&self, run_id: Uuid) -> Result<BatchRun, EngineError> {
        match self.store.complete_run(run_id).await? {
            Some(run) => {
                tracing::info!(%run_id, "batch run completed");
                Ok(run)
            }
            None => {
                let run = self
                    .store
                    .find_run(run_id)
                    .await?
                    .ok_or(EngineError::RunNotFound(run_id))?;
                Err(EngineError::InvalidState {
                    run_id,
                    status: run.status,
                })
            }
        }
    }

    /// Transition STARTED to FAILED. Idempotent: failing an already FAILED
    /// run is a no-op.
    pub async fn fail(&self, run_id: Uuid, reason: &str) -> Result<BatchRun, EngineError> {
        if let Some(run) = self.store.fail_run(run_id, reason).await? {
            tracing::warn!(%run_id, reason, "batch run failed");
            return Ok(run);
        }

        let run = self
            .store
            .find_run(run_id)
            .await?
            .ok_or(EngineError::RunNotFound(run_id))?;
        if run.status == BatchRunStatus::Failed {
            return Ok(run);
        }
        Err(EngineError::InvalidState {
            run_id,
            status: run.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use showbooks_db::models::CreateBatchRun;
    use showbooks_db::MemoryLedgerStore;

    async fn pending_run(store: &Arc<dyn LedgerStore>, source: &str) -> BatchRun {
        store
            .create_run(CreateBatchRun {
                source: source.to_string(),
                project_number: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn begin_conflicts_when_another_run_holds_the_source() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let tracker = RunTracker::new(store.clone());

        let first = pending_run(&store, "board-8821").await;
        let second = pending_run(&store, "board-8821").await;

        tracker.begin(first.id).await.unwrap();
        let err = tracker.begin(second.id).await.unwrap_err();
        assert!(err.is_conflict());

        // the refused run was never touched
        let untouched = store.find_run(second.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, BatchRunStatus::Pending);
    }

    #[tokio::test]
    async fn begin_twice_is_an_invalid_state_not_a_conflict() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let tracker = RunTracker::new(store.clone());

        let run = pending_run(&store, "board-8821").await;
        tracker.begin(run.id).await.unwrap();

        let err = tracker.begin(run.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                status: BatchRunStatus::Started,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn distinct_sources_run_side_by_side() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let tracker = RunTracker::new(store.clone());

        let a = pending_run(&store, "board-8821").await;
        let b = pending_run(&store, "board-9944").await;

        tracker.begin(a.id).await.unwrap();
        tracker.begin(b.id).await.unwrap();
    }

    #[tokio::test]
    async fn fail_is_idempotent() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let tracker = RunTracker::new(store.clone());

        let run = pending_run(&store, "board-8821").await;
        tracker.begin(run.id).await.unwrap();

        let failed = tracker.fail(run.id, "source unreachable").await.unwrap();
        assert_eq!(failed.status, BatchRunStatus::Failed);

        let again = tracker.fail(run.id, "source unreachable").await.unwrap();
        assert_eq!(again.status, BatchRunStatus::Failed);
        assert_eq!(again.error_message.as_deref(), Some("source unreachable"));
    }

    #[tokio::test]
    async fn fail_rejects_runs_that_never_started() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let tracker = RunTracker::new(store.clone());

        let run = pending_run(&store, "board-8821").await;
        let err = tracker.fail(run.id, "too early").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                status: BatchRunStatus::Pending,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn complete_rejects_terminal_runs() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let tracker = RunTracker::new(store.clone());

        let run = pending_run(&store, "board-8821").await;
        tracker.begin(run.id).await.unwrap();
        tracker.complete(run.id).await.unwrap();

        let err = tracker.complete(run.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                status: BatchRunStatus::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let tracker = RunTracker::new(store);

        let err = tracker.begin(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::RunNotFound(_)));
    }
}
