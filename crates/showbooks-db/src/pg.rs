//! Postgres-backed [`LedgerStore`].

use crate::error::DbError;
use crate::models::{
    AuditEvent, BatchRun, BatchRunStatus, Contact, CreateBatchRun, DetailItem, LedgerBill,
    LedgerBillLine, NewAuditEvent, Project, PurchaseOrder, UpsertBillLine, UpsertContact,
    UpsertDetailItem, UpsertLedgerBill, UpsertPurchaseOrder,
};
use crate::pool::DbPool;
use crate::store::{LedgerStore, Upserted};
use async_trait::async_trait;
use showbooks_core::{BillKey, ExternalId, PoKey};
use uuid::Uuid;

/// [`LedgerStore`] over a Postgres pool. Thin: all SQL lives on the model
/// types, this type only translates errors and absent rows.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: DbPool,
}

impl PgLedgerStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn upsert_contact(&self, input: UpsertContact) -> Result<Upserted<Contact>, DbError> {
        Ok(Contact::upsert(self.pool.inner(), input).await?)
    }

    async fn find_contact_by_name(&self, name: &str) -> Result<Option<Contact>, DbError> {
        Ok(Contact::find_by_name(self.pool.inner(), name).await?)
    }

    async fn ensure_project(
        &self,
        project_number: i32,
        name: &str,
    ) -> Result<Upserted<Project>, DbError> {
        if let Some(project) = Project::find_by_number(self.pool.inner(), project_number).await? {
            return Ok(Upserted::unchanged(project));
        }
        let project =
            Project::insert(self.pool.inner(), &Project::new(project_number, name)).await?;
        Ok(Upserted::created(project))
    }

    async fn upsert_purchase_order(
        &self,
        input: UpsertPurchaseOrder,
    ) -> Result<Upserted<PurchaseOrder>, DbError> {
        Ok(PurchaseOrder::upsert(self.pool.inner(), input).await?)
    }

    async fn find_purchase_order(&self, key: PoKey) -> Result<Option<PurchaseOrder>, DbError> {
        Ok(PurchaseOrder::find_by_key(self.pool.inner(), key).await?)
    }

    async fn record_po_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<PurchaseOrder, DbError> {
        PurchaseOrder::set_sync(self.pool.inner(), id, external_id, fingerprint)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("purchase order {id}")))
    }

    async fn recompute_po_total(&self, key: PoKey) -> Result<Option<PurchaseOrder>, DbError> {
        Ok(PurchaseOrder::recompute_total(self.pool.inner(), key).await?)
    }

    async fn upsert_detail_item(
        &self,
        input: UpsertDetailItem,
    ) -> Result<Upserted<DetailItem>, DbError> {
        Ok(DetailItem::upsert(self.pool.inner(), input).await?)
    }

    async fn list_detail_items(&self, key: PoKey) -> Result<Vec<DetailItem>, DbError> {
        Ok(DetailItem::list_for_po(self.pool.inner(), key).await?)
    }

    async fn record_detail_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        parent_external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<DetailItem, DbError> {
        DetailItem::set_sync(self.pool.inner(), id, external_id, parent_external_id, fingerprint)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("detail item {id}")))
    }

    async fn upsert_ledger_bill(
        &self,
        input: UpsertLedgerBill,
    ) -> Result<Upserted<LedgerBill>, DbError> {
        Ok(LedgerBill::upsert(self.pool.inner(), input).await?)
    }

    async fn find_ledger_bill(&self, key: BillKey) -> Result<Option<LedgerBill>, DbError> {
        Ok(LedgerBill::find_by_key(self.pool.inner(), key).await?)
    }

    async fn upsert_bill_line(
        &self,
        input: UpsertBillLine,
    ) -> Result<Upserted<LedgerBillLine>, DbError> {
        Ok(LedgerBillLine::upsert(self.pool.inner(), input).await?)
    }

    async fn list_bill_lines(&self, bill_id: Uuid) -> Result<Vec<LedgerBillLine>, DbError> {
        Ok(LedgerBillLine::list_for_bill(self.pool.inner(), bill_id).await?)
    }

    async fn record_bill_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<LedgerBill, DbError> {
        LedgerBill::set_sync(self.pool.inner(), id, external_id, fingerprint)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("ledger bill {id}")))
    }

    async fn record_bill_line_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<LedgerBillLine, DbError> {
        LedgerBillLine::set_sync(self.pool.inner(), id, external_id, fingerprint)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("bill line {id}")))
    }

    async fn create_run(&self, data: CreateBatchRun) -> Result<BatchRun, DbError> {
        Ok(BatchRun::create(self.pool.inner(), data).await?)
    }

    async fn find_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError> {
        Ok(BatchRun::find_by_id(self.pool.inner(), id).await?)
    }

    async fn find_started_run_for_source(
        &self,
        source: &str,
    ) -> Result<Option<BatchRun>, DbError> {
        Ok(BatchRun::find_started_by_source(self.pool.inner(), source).await?)
    }

    async fn begin_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError> {
        Ok(BatchRun::mark_started(self.pool.inner(), id).await?)
    }

    async fn complete_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError> {
        Ok(BatchRun::mark_completed(self.pool.inner(), id).await?)
    }

    async fn fail_run(&self, id: Uuid, error_message: &str) -> Result<Option<BatchRun>, DbError> {
        Ok(BatchRun::mark_failed(self.pool.inner(), id, error_message).await?)
    }

    async fn list_runs(
        &self,
        project_number: Option<i32>,
        status: Option<BatchRunStatus>,
        limit: i64,
    ) -> Result<Vec<BatchRun>, DbError> {
        Ok(BatchRun::list(self.pool.inner(), project_number, status, limit).await?)
    }

    async fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent, DbError> {
        Ok(AuditEvent::append(self.pool.inner(), event).await?)
    }

    async fn list_audit_events(&self, limit: i64) -> Result<Vec<AuditEvent>, DbError> {
        Ok(AuditEvent::list(self.pool.inner(), limit).await?)
    }
}
