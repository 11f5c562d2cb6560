//! In-memory [`LedgerStore`] for tests.
//!
//! Shares the merge and derivation logic with the Postgres store by reusing
//! the model types' `new`/`apply` methods, so behaviour differences between
//! the two stores are limited to storage itself.

use crate::error::DbError;
use crate::models::{
    AuditEvent, BatchRun, BatchRunStatus, Contact, CreateBatchRun, DetailItem, LedgerBill,
    LedgerBillLine, NewAuditEvent, Project, PurchaseOrder, UpsertBillLine, UpsertContact,
    UpsertDetailItem, UpsertLedgerBill, UpsertPurchaseOrder,
};
use crate::store::{LedgerStore, Upserted};
use async_trait::async_trait;
use chrono::Utc;
use showbooks_core::{BillKey, DetailKey, ExternalId, PoKey};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    contacts: HashMap<String, Contact>,
    projects: HashMap<i32, Project>,
    purchase_orders: HashMap<PoKey, PurchaseOrder>,
    detail_items: HashMap<DetailKey, DetailItem>,
    ledger_bills: HashMap<BillKey, LedgerBill>,
    bill_lines: HashMap<DetailKey, LedgerBillLine>,
    runs: HashMap<Uuid, BatchRun>,
    audit_events: Vec<AuditEvent>,
}

/// [`LedgerStore`] backed by hash maps behind one async mutex.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: Mutex<MemoryState>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn set_sync_fields(
    board_id: &mut Option<String>,
    fingerprint_field: &mut Option<String>,
    external_id: &ExternalId,
    fingerprint: &str,
) {
    if board_id.is_none() {
        *board_id = Some(external_id.as_str().to_string());
    }
    *fingerprint_field = Some(fingerprint.to_string());
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn upsert_contact(&self, input: UpsertContact) -> Result<Upserted<Contact>, DbError> {
        let mut state = self.state.lock().await;
        match state.contacts.get_mut(&input.name) {
            None => {
                let contact = Contact::new(&input);
                state.contacts.insert(input.name.clone(), contact.clone());
                Ok(Upserted::created(contact))
            }
            Some(contact) => {
                if contact.apply(&input) {
                    contact.updated_at = Utc::now();
                    Ok(Upserted::updated(contact.clone()))
                } else {
                    Ok(Upserted::unchanged(contact.clone()))
                }
            }
        }
    }

    async fn find_contact_by_name(&self, name: &str) -> Result<Option<Contact>, DbError> {
        let state = self.state.lock().await;
        Ok(state.contacts.get(name).cloned())
    }

    async fn ensure_project(
        &self,
        project_number: i32,
        name: &str,
    ) -> Result<Upserted<Project>, DbError> {
        let mut state = self.state.lock().await;
        if let Some(project) = state.projects.get(&project_number) {
            return Ok(Upserted::unchanged(project.clone()));
        }
        let project = Project::new(project_number, name);
        state.projects.insert(project_number, project.clone());
        Ok(Upserted::created(project))
    }

    async fn upsert_purchase_order(
        &self,
        input: UpsertPurchaseOrder,
    ) -> Result<Upserted<PurchaseOrder>, DbError> {
        let mut state = self.state.lock().await;
        match state.purchase_orders.get_mut(&input.key) {
            None => {
                let po = PurchaseOrder::new(&input);
                state.purchase_orders.insert(input.key, po.clone());
                Ok(Upserted::created(po))
            }
            Some(po) => {
                if po.apply(&input) {
                    po.updated_at = Utc::now();
                    Ok(Upserted::updated(po.clone()))
                } else {
                    Ok(Upserted::unchanged(po.clone()))
                }
            }
        }
    }

    async fn find_purchase_order(&self, key: PoKey) -> Result<Option<PurchaseOrder>, DbError> {
        let state = self.state.lock().await;
        Ok(state.purchase_orders.get(&key).cloned())
    }

    async fn record_po_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<PurchaseOrder, DbError> {
        let mut state = self.state.lock().await;
        let po = state
            .purchase_orders
            .values_mut()
            .find(|po| po.id == id)
            .ok_or_else(|| DbError::NotFound(format!("purchase order {id}")))?;
        set_sync_fields(
            &mut po.board_item_id,
            &mut po.synced_fingerprint,
            external_id,
            fingerprint,
        );
        po.updated_at = Utc::now();
        Ok(po.clone())
    }

    async fn recompute_po_total(&self, key: PoKey) -> Result<Option<PurchaseOrder>, DbError> {
        let mut state = self.state.lock().await;
        let Some(po_id) = state.purchase_orders.get(&key).map(|po| po.id) else {
            return Ok(None);
        };
        let total = state
            .detail_items
            .values()
            .filter(|item| item.purchase_order_id == Some(po_id))
            .map(|item| item.sub_total)
            .sum();
        let po = state
            .purchase_orders
            .get_mut(&key)
            .ok_or_else(|| DbError::NotFound(format!("purchase order {key}")))?;
        if po.amount_total != total {
            po.amount_total = total;
            po.updated_at = Utc::now();
        }
        Ok(Some(po.clone()))
    }

    async fn upsert_detail_item(
        &self,
        input: UpsertDetailItem,
    ) -> Result<Upserted<DetailItem>, DbError> {
        let mut state = self.state.lock().await;
        match state.detail_items.get_mut(&input.key) {
            None => {
                let item = DetailItem::new(&input);
                state.detail_items.insert(input.key, item.clone());
                Ok(Upserted::created(item))
            }
            Some(item) => {
                if item.apply(&input) {
                    item.updated_at = Utc::now();
                    Ok(Upserted::updated(item.clone()))
                } else {
                    Ok(Upserted::unchanged(item.clone()))
                }
            }
        }
    }

    async fn list_detail_items(&self, key: PoKey) -> Result<Vec<DetailItem>, DbError> {
        let state = self.state.lock().await;
        let mut items: Vec<DetailItem> = state
            .detail_items
            .values()
            .filter(|item| item.detail_key().po_key() == key)
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.detail_number, item.line_number));
        Ok(items)
    }

    async fn record_detail_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        parent_external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<DetailItem, DbError> {
        let mut state = self.state.lock().await;
        let item = state
            .detail_items
            .values_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| DbError::NotFound(format!("detail item {id}")))?;
        set_sync_fields(
            &mut item.board_item_id,
            &mut item.synced_fingerprint,
            external_id,
            fingerprint,
        );
        if item.parent_board_id.is_none() {
            item.parent_board_id = Some(parent_external_id.as_str().to_string());
        }
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn upsert_ledger_bill(
        &self,
        input: UpsertLedgerBill,
    ) -> Result<Upserted<LedgerBill>, DbError> {
        let mut state = self.state.lock().await;
        match state.ledger_bills.get_mut(&input.key) {
            None => {
                let bill = LedgerBill::new(&input);
                state.ledger_bills.insert(input.key, bill.clone());
                Ok(Upserted::created(bill))
            }
            Some(bill) => {
                if bill.apply(&input) {
                    bill.updated_at = Utc::now();
                    Ok(Upserted::updated(bill.clone()))
                } else {
                    Ok(Upserted::unchanged(bill.clone()))
                }
            }
        }
    }

    async fn find_ledger_bill(&self, key: BillKey) -> Result<Option<LedgerBill>, DbError> {
        let state = self.state.lock().await;
        Ok(state.ledger_bills.get(&key).cloned())
    }

    async fn upsert_bill_line(
        &self,
        input: UpsertBillLine,
    ) -> Result<Upserted<LedgerBillLine>, DbError> {
        let mut state = self.state.lock().await;
        match state.bill_lines.get_mut(&input.key) {
            None => {
                let line = LedgerBillLine::new(&input);
                state.bill_lines.insert(input.key, line.clone());
                Ok(Upserted::created(line))
            }
            Some(line) => {
                if line.apply(&input) {
                    line.updated_at = Utc::now();
                    Ok(Upserted::updated(line.clone()))
                } else {
                    Ok(Upserted::unchanged(line.clone()))
                }
            }
        }
    }

    async fn list_bill_lines(&self, bill_id: Uuid) -> Result<Vec<LedgerBillLine>, DbError> {
        let state = self.state.lock().await;
        let mut lines: Vec<LedgerBillLine> = state
            .bill_lines
            .values()
            .filter(|line| line.bill_id == bill_id)
            .cloned()
            .collect();
        lines.sort_by_key(|line| line.line_number);
        Ok(lines)
    }

    async fn record_bill_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<LedgerBill, DbError> {
        let mut state = self.state.lock().await;
        let bill = state
            .ledger_bills
            .values_mut()
            .find(|bill| bill.id == id)
            .ok_or_else(|| DbError::NotFound(format!("ledger bill {id}")))?;
        set_sync_fields(
            &mut bill.ledger_bill_id,
            &mut bill.synced_fingerprint,
            external_id,
            fingerprint,
        );
        bill.updated_at = Utc::now();
        Ok(bill.clone())
    }

    async fn record_bill_line_sync(
        &self,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<LedgerBillLine, DbError> {
        let mut state = self.state.lock().await;
        let line = state
            .bill_lines
            .values_mut()
            .find(|line| line.id == id)
            .ok_or_else(|| DbError::NotFound(format!("bill line {id}")))?;
        set_sync_fields(
            &mut line.ledger_line_id,
            &mut line.synced_fingerprint,
            external_id,
            fingerprint,
        );
        line.updated_at = Utc::now();
        let line = line.clone();
        // Stamp the originating detail item with the ledger entry it became.
        if let Some(item) = state.detail_items.get_mut(&line.detail_key()) {
            if item.ledger_entry_id.is_none() {
                item.ledger_entry_id = Some(external_id.as_str().to_string());
                item.updated_at = Utc::now();
            }
        }
        Ok(line)
    }

    async fn create_run(&self, data: CreateBatchRun) -> Result<BatchRun, DbError> {
        let mut state = self.state.lock().await;
        let run = BatchRun::new(&data);
        state.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn find_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError> {
        let state = self.state.lock().await;
        Ok(state.runs.get(&id).cloned())
    }

    async fn find_started_run_for_source(
        &self,
        source: &str,
    ) -> Result<Option<BatchRun>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .runs
            .values()
            .find(|run| run.source == source && run.status == BatchRunStatus::Started)
            .cloned())
    }

    async fn begin_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError> {
        let mut state = self.state.lock().await;
        let Some(run) = state.runs.get_mut(&id) else {
            return Ok(None);
        };
        if run.status != BatchRunStatus::Pending {
            return Ok(None);
        }
        run.status = BatchRunStatus::Started;
        run.started_at = Some(Utc::now());
        run.updated_at = Utc::now();
        Ok(Some(run.clone()))
    }

    async fn complete_run(&self, id: Uuid) -> Result<Option<BatchRun>, DbError> {
        let mut state = self.state.lock().await;
        let Some(run) = state.runs.get_mut(&id) else {
            return Ok(None);
        };
        if run.status != BatchRunStatus::Started {
            return Ok(None);
        }
        run.status = BatchRunStatus::Completed;
        run.finished_at = Some(Utc::now());
        run.updated_at = Utc::now();
        Ok(Some(run.clone()))
    }

    async fn fail_run(&self, id: Uuid, error_message: &str) -> Result<Option<BatchRun>, DbError> {
        let mut state = self.state.lock().await;
        let Some(run) = state.runs.get_mut(&id) else {
            return Ok(None);
        };
        if run.status != BatchRunStatus::Started {
            return Ok(None);
        }
        run.status = BatchRunStatus::Failed;
        run.error_message = Some(error_message.to_string());
        run.finished_at = Some(Utc::now());
        run.updated_at = Utc::now();
        Ok(Some(run.clone()))
    }

    async fn list_runs(
        &self,
        project_number: Option<i32>,
        status: Option<BatchRunStatus>,
        limit: i64,
    ) -> Result<Vec<BatchRun>, DbError> {
        let state = self.state.lock().await;
        let mut runs: Vec<BatchRun> = state
            .runs
            .values()
            .filter(|run| project_number.is_none_or(|p| run.project_number == Some(p)))
            .filter(|run| status.is_none_or(|s| run.status == s))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(runs)
    }

    async fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent, DbError> {
        let mut state = self.state.lock().await;
        let event = AuditEvent::new(&event);
        state.audit_events.push(event.clone());
        Ok(event)
    }

    async fn list_audit_events(&self, limit: i64) -> Result<Vec<AuditEvent>, DbError> {
        let state = self.state.lock().await;
        let mut events: Vec<AuditEvent> = state.audit_events.iter().rev().cloned().collect();
        events.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(events)
    }
}
