//! The persistence boundary of the reconciliation engine.
//!
//! [`LedgerStore`] is the seam the engine writes through. Two implementations
//! ship with this crate: [`crate::pg::PgLedgerStore`] backed by Postgres, and
//! [`crate::memory::MemoryLedgerStore`] for tests. Both honour the same upsert
//! semantics, which live on the model types themselves.

use crate::error::DbError;
use crate::models::{
    AuditEvent, BatchRun, BatchRunStatus, Contact, CreateBatchRun, DetailItem, LedgerBill,
    LedgerBillLine, NewAuditEvent, Project, PurchaseOrder, UpsertBillLine, UpsertContact,
    UpsertDetailItem, UpsertLedgerBill, UpsertPurchaseOrder,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use showbooks_core::{BillKey, ExternalId, PoKey};
use uuid::Uuid;

/// What an upsert did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The row did not exist and was inserted.
    Created,
    /// The row existed and the merge changed it.
    Updated,
    /// The row existed and the merge left it byte-identical.
    Unchanged,
}

impl WriteOutcome {
    /// Whether the upsert actually touched storage.
    #[must_use]
    pub fn wrote(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// An upserted row together with what happened to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<T> {
    pub record: T,
    pub outcome: WriteOutcome,
}

impl<T> Upserted<T> {
    #[must_use]
    pub fn created(record: T) -> Self {
        Self {
            record,
            outcome: WriteOutcome::Created,
        }
    }

    #[must_use]
    pub fn updated(record: T) -> Self {
        Self {
            record,
            outcome: WriteOutcome::Updated,
        }
    }

    #[must_use]
    pub fn unchanged(record: T) -> Self {
        Self {
            record,
            outcome: WriteOutcome::Unchanged,
        }
    }
}

/// Storage operations the reconciliation engine depends on.
///
/// Every upsert keys on the entity's natural key and reports whether it
/// created, updated, or left the row unchanged. The batch-run transitions are
/// compare-and-set: they return `Ok(None)` when the run was not in the
/// expected state, and never overwrite a terminal status.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // contacts

    async fn upsert_contact(&self, input: UpsertContact) -> Result<Upserted<Contact>, DbError>;

    async fn find_contact_by_name(&self, name: &str) -> Result<Option<Contact>, DbError>;

    // projects

    /// Find the project for a number, creating a placeholder row when the
    /// number has never been seen.
    async fn ensure_project(
        &self,
        project_number: i32,
        name: &str,
    ) -> Result<Upserted<Project>, DbError>;

    // purchase orders

    async fn upsert_purchase_order(
        &self,
        input: UpsertPurchaseOrder,
    ) -> Result<Upserted<PurchaseOrder>, DbError>;

    async fn find_purchase_order(&self, key: PoKey) -> Result<Option<PurchaseOrder>, DbError>;

    /// Record a successful board sync for a purchase order.
    async fn record_po_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<PurchaseOrder, DbError>;

    /// Recompute the purchase order's derived total from its detail items.
    /// Returns `None` when no such purchase order exists.
    async fn recompute_po_total(&self, key: PoKey) -> Result<Option<PurchaseOrder>, DbError>;

    // detail items

    async fn upsert_detail_item(
        &self,
        input: UpsertDetailItem,
    ) -> Result<Upserted<DetailItem>, DbError>;

    async fn list_detail_items(&self, key: PoKey) -> Result<Vec<DetailItem>, DbError>;

    /// Record a successful board sync for a detail item, noting the board
    /// item it was created under.
    async fn record_detail_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        parent_external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<DetailItem, DbError>;

    // ledger bills

    async fn upsert_ledger_bill(
        &self,
        input: UpsertLedgerBill,
    ) -> Result<Upserted<LedgerBill>, DbError>;

    async fn find_ledger_bill(&self, key: BillKey) -> Result<Option<LedgerBill>, DbError>;

    async fn upsert_bill_line(
        &self,
        input: UpsertBillLine,
    ) -> Result<Upserted<LedgerBillLine>, DbError>;

    async fn list_bill_lines(&self, bill_id: Uuid) -> Result<Vec<LedgerBillLine>, DbError>;

    /// Record a successful ledger sync for a bill.
    async fn record_bill_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<LedgerBill, DbError>;

    /// Record a successful ledger sync for a bill line.
    async fn record_bill_line_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<LedgerBillLine, DbError>;

    // batch runs

    async fn create_run(&self, data: CreateBatchRun) -> Result<BatchRun, DbError>;

    async fn find_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError>;

    /// The run currently STARTED for a source, if any.
    async fn find_started_run_for_source(&self, source: &str)
        -> Result<Option<BatchRun>, DbError>;

    /// PENDING to STARTED; `None` when the run was not PENDING.
    async fn begin_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError>;

    /// STARTED to COMPLETED; `None` when the run was not STARTED.
    async fn complete_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError>;

    /// STARTED to FAILED; `None` when the run was not STARTED.
    async fn fail_run(&self, id: Uuid, error_message: &str) -> Result<Option<BatchRun>, DbError>;

    async fn list_runs(
        &self,
        project_number: Option<i32>,
        status: Option<BatchRunStatus>,
        limit: i64,
    ) -> Result<Vec<BatchRun>, DbError>;

    // audit trail

    async fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent, DbError>;

    async fn list_audit_events(&self, limit: i64) -> Result<Vec<AuditEvent>, DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unchanged_skips_the_write() {
        assert!(WriteOutcome::Created.wrote());
        assert!(WriteOutcome::Updated.wrote());
        assert!(!WriteOutcome::Unchanged.wrote());
    }

    #[test]
    fn constructors_tag_the_outcome() {
        assert_eq!(Upserted::created(1).outcome, WriteOutcome::Created);
        assert_eq!(Upserted::updated(1).outcome, WriteOutcome::Updated);
        assert_eq!(Upserted::unchanged(1).outcome, WriteOutcome::Unchanged);
    }
}
