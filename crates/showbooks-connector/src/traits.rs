//! Client traits for the external services.
//!
//! Both services expose the same batch upsert shape: one call takes a chunk of
//! records and answers with one outcome per record, in the same order. `Err`
//! is reserved for faults that affect the whole call (connection loss, rate
//! limiting, timeout); a rejected record is a `Failure` outcome, not an `Err`.

use crate::error::ConnectorResult;
use crate::types::{BoardItemKind, LedgerRecordKind, RecordOutcome, UpsertRecord};
use async_trait::async_trait;

/// Client for the project-management board.
#[async_trait]
pub trait BoardClient: Send + Sync {
    /// Create records that have no external id yet and update the ones that
    /// do. Outcomes align positionally with `records`.
    async fn create_or_update(
        &self,
        kind: BoardItemKind,
        records: &[UpsertRecord],
    ) -> ConnectorResult<Vec<RecordOutcome>>;
}

/// Client for the accounting ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Same contract as [`BoardClient::create_or_update`], keyed on derived
    /// reference numbers.
    async fn create_or_update(
        &self,
        kind: LedgerRecordKind,
        records: &[UpsertRecord],
    ) -> ConnectorResult<Vec<RecordOutcome>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingBoard {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BoardClient for CountingBoard {
        async fn create_or_update(
            &self,
            _kind: BoardItemKind,
            records: &[UpsertRecord],
        ) -> ConnectorResult<Vec<RecordOutcome>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(records
                .iter()
                .enumerate()
                .map(|(i, _)| RecordOutcome::success(format!("{call}-{i}")))
                .collect())
        }
    }

    #[tokio::test]
    async fn board_client_is_usable_as_trait_object() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client: Arc<dyn BoardClient> = Arc::new(CountingBoard {
            calls: Arc::clone(&calls),
        });

        let records = vec![UpsertRecord::create("k", "n", serde_json::json!({}))];
        let outcomes = client
            .create_or_update(BoardItemKind::Item, &records)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
