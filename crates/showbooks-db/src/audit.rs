//! Audit decorator for [`LedgerStore`].
//!
//! Wraps any store and appends one audit event per write that actually
//! happened. Upserts that leave the row unchanged produce no event, so an
//! idempotent re-run of a batch leaves the trail untouched.

use crate::error::DbError;
use crate::models::{
    AuditEvent, BatchRun, BatchRunStatus, Contact, CreateBatchRun, DetailItem, LedgerBill,
    LedgerBillLine, NewAuditEvent, Project, PurchaseOrder, UpsertBillLine, UpsertContact,
    UpsertDetailItem, UpsertLedgerBill, UpsertPurchaseOrder,
};
use crate::store::{LedgerStore, Upserted, WriteOutcome};
use async_trait::async_trait;
use showbooks_core::{BillKey, ExternalId, PoKey};
use uuid::Uuid;

/// A [`LedgerStore`] that records every effective write on the audit trail
/// of the wrapped store.
#[derive(Debug)]
pub struct AuditedStore<S> {
    inner: S,
}

impl<S: LedgerStore> AuditedStore<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn record_write(
        &self,
        table: &str,
        record_id: Uuid,
        outcome: WriteOutcome,
        detail: &str,
    ) -> Result<(), DbError> {
        let event = match outcome {
            WriteOutcome::Created => NewAuditEvent::insert(table, record_id, detail),
            WriteOutcome::Updated => NewAuditEvent::update(table, record_id, detail),
            WriteOutcome::Unchanged => return Ok(()),
        };
        self.inner.append_audit(event).await?;
        Ok(())
    }
}

#[async_trait]
impl<S: LedgerStore> LedgerStore for AuditedStore<S> {
    async fn upsert_contact(&self, input: UpsertContact) -> Result<Upserted<Contact>, DbError> {
        let upserted = self.inner.upsert_contact(input).await?;
        self.record_write(
            "contact",
            upserted.record.id,
            upserted.outcome,
            &upserted.record.name,
        )
        .await?;
        Ok(upserted)
    }

    async fn find_contact_by_name(&self, name: &str) -> Result<Option<Contact>, DbError> {
        self.inner.find_contact_by_name(name).await
    }

    async fn ensure_project(
        &self,
        project_number: i32,
        name: &str,
    ) -> Result<Upserted<Project>, DbError> {
        let upserted = self.inner.ensure_project(project_number, name).await?;
        self.record_write(
            "project",
            upserted.record.id,
            upserted.outcome,
            &upserted.record.name,
        )
        .await?;
        Ok(upserted)
    }

    async fn upsert_purchase_order(
        &self,
        input: UpsertPurchaseOrder,
    ) -> Result<Upserted<PurchaseOrder>, DbError> {
        let upserted = self.inner.upsert_purchase_order(input).await?;
        self.record_write(
            "purchase_order",
            upserted.record.id,
            upserted.outcome,
            &upserted.record.po_key().to_string(),
        )
        .await?;
        Ok(upserted)
    }

    async fn find_purchase_order(&self, key: PoKey) -> Result<Option<PurchaseOrder>, DbError> {
        self.inner.find_purchase_order(key).await
    }

    async fn record_po_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<PurchaseOrder, DbError> {
        let po = self.inner.record_po_sync(id, external_id, fingerprint).await?;
        self.inner
            .append_audit(NewAuditEvent::update(
                "purchase_order",
                po.id,
                format!("synced to board item {external_id}"),
            ))
            .await?;
        Ok(po)
    }

    async fn recompute_po_total(&self, key: PoKey) -> Result<Option<PurchaseOrder>, DbError> {
        let po = self.inner.recompute_po_total(key).await?;
        if let Some(po) = &po {
            self.inner
                .append_audit(NewAuditEvent::update(
                    "purchase_order",
                    po.id,
                    format!("total recomputed to {}", po.amount_total),
                ))
                .await?;
        }
        Ok(po)
    }

    async fn upsert_detail_item(
        &self,
        input: UpsertDetailItem,
    ) -> Result<Upserted<DetailItem>, DbError> {
        let upserted = self.inner.upsert_detail_item(input).await?;
        self.record_write(
            "detail_item",
            upserted.record.id,
            upserted.outcome,
            &upserted.record.detail_key().to_string(),
        )
        .await?;
        Ok(upserted)
    }

    async fn list_detail_items(&self, key: PoKey) -> Result<Vec<DetailItem>, DbError> {
        self.inner.list_detail_items(key).await
    }

    async fn record_detail_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        parent_external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<DetailItem, DbError> {
        let item = self
            .inner
            .record_detail_sync(id, external_id, parent_external_id, fingerprint)
            .await?;
        self.inner
            .append_audit(NewAuditEvent::update(
                "detail_item",
                item.id,
                format!("synced to board subitem {external_id}"),
            ))
            .await?;
        Ok(item)
    }

    async fn upsert_ledger_bill(
        &self,
        input: UpsertLedgerBill,
    ) -> Result<Upserted<LedgerBill>, DbError> {
        let upserted = self.inner.upsert_ledger_bill(input).await?;
        self.record_write(
            "ledger_bill",
            upserted.record.id,
            upserted.outcome,
            &upserted.record.reference,
        )
        .await?;
        Ok(upserted)
    }

    async fn find_ledger_bill(&self, key: BillKey) -> Result<Option<LedgerBill>, DbError> {
        self.inner.find_ledger_bill(key).await
    }

    async fn upsert_bill_line(
        &self,
        input: UpsertBillLine,
    ) -> Result<Upserted<LedgerBillLine>, DbError> {
        let upserted = self.inner.upsert_bill_line(input).await?;
        self.record_write(
            "ledger_bill_line",
            upserted.record.id,
            upserted.outcome,
            &upserted.record.reference,
        )
        .await?;
        Ok(upserted)
    }

    async fn list_bill_lines(&self, bill_id: Uuid) -> Result<Vec<LedgerBillLine>, DbError> {
        self.inner.list_bill_lines(bill_id).await
    }

    async fn record_bill_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<LedgerBill, DbError> {
        let bill = self
            .inner
            .record_bill_sync(id, external_id, fingerprint)
            .await?;
        self.inner
            .append_audit(NewAuditEvent::update(
                "ledger_bill",
                bill.id,
                format!("synced to ledger bill {external_id}"),
            ))
            .await?;
        Ok(bill)
    }

    async fn record_bill_line_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<LedgerBillLine, DbError> {
        let line = self
            .inner
            .record_bill_line_sync(id, external_id, fingerprint)
            .await?;
        self.inner
            .append_audit(NewAuditEvent::update(
                "ledger_bill_line",
                line.id,
                format!("synced to ledger line {external_id}"),
            ))
            .await?;
        Ok(line)
    }

    async fn create_run(&self, data: CreateBatchRun) -> Result<BatchRun, DbError> {
        let run = self.inner.create_run(data).await?;
        self.inner
            .append_audit(NewAuditEvent::insert(
                "batch_run",
                run.id,
                format!("registered for source {}", run.source),
            ))
            .await?;
        Ok(run)
    }

    async fn find_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError> {
        self.inner.find_run(id).await
    }

    async fn find_started_run_for_source(
        &self,
        source: &str,
    ) -> Result<Option<BatchRun>, DbError> {
        self.inner.find_started_run_for_source(source).await
    }

    async fn begin_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError> {
        let run = self.inner.begin_run(id).await?;
        if let Some(run) = &run {
            self.inner
                .append_audit(NewAuditEvent::update("batch_run", run.id, "started"))
                .await?;
        }
        Ok(run)
    }

    async fn complete_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError> {
        let run = self.inner.complete_run(id).await?;
        if let Some(run) = &run {
            self.inner
                .append_audit(NewAuditEvent::update("batch_run", run.id, "completed"))
                .await?;
        }
        Ok(run)
    }

    async fn fail_run(&self, id: Uuid, error_message: &str) -> Result<Option<BatchRun>, DbError> {
        let run = self.inner.fail_run(id, error_message).await?;
        if let Some(run) = &run {
            self.inner
                .append_audit(NewAuditEvent::update(
                    "batch_run",
                    run.id,
                    format!("failed: {error_message}"),
                ))
                .await?;
        }
        Ok(run)
    }

    async fn list_runs(
        &self,
        project_number: Option<i32>,
        status: Option<BatchRunStatus>,
        limit: i64,
    ) -> Result<Vec<BatchRun>, DbError> {
        self.inner.list_runs(project_number, status, limit).await
    }

    async fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent, DbError> {
        self.inner.append_audit(event).await
    }

    async fn list_audit_events(&self, limit: i64) -> Result<Vec<AuditEvent>, DbError> {
        self.inner.list_audit_events(limit).await
    }
}
