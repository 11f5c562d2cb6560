//! Pass 4: accounts-payable bills derived from this batch's billable items.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use showbooks_connector::{run_chunked, LedgerRecordKind, RecordOutcome, UpsertRecord};
use showbooks_core::{BillKey, PoKey};
use showbooks_db::models::{
    DetailItem, LedgerBill, LedgerBillLine, UpsertBillLine, UpsertLedgerBill,
};

use crate::engine::{ReconciliationEngine, RunContext};
use crate::error::EngineError;
use crate::fingerprint::fingerprint;
use crate::passes::QueuedSync;
use crate::summary::{EntityKind, FailureKind};

/// One bill queued for ledger sync, by position in the pass's bill list.
struct BillSync {
    index: usize,
    key: String,
    fingerprint: String,
}

impl ReconciliationEngine {
    /// Derive bills from the batch's billable detail items and sync them,
    /// with their lines, to the ledger.
    ///
    /// Sibling lines (same project, po and detail number) roll up into one
    /// bill: transaction date is the earliest across siblings, due date the
    /// latest. Bills sync before their lines so a bill created this run can
    /// parent its lines in the same run; lines of a bill that failed to sync
    /// are deferred, not failed.
    pub(crate) async fn reconcile_ledger_bills(
        &self,
        ctx: &mut RunContext,
    ) -> Result<(), EngineError> {
        let mut groups: BTreeMap<BillKey, Vec<DetailItem>> = BTreeMap::new();
        for item in &ctx.detail_items {
            if item.qualifies_for_billing() {
                groups.entry(item.bill_key()).or_default().push(item.clone());
            }
        }
        if groups.is_empty() {
            return Ok(());
        }
        info!(bills = groups.len(), "ledger-bill pass");

        let mut bills: Vec<(LedgerBill, Vec<LedgerBillLine>)> = Vec::new();
        for (key, items) in &groups {
            let contact_ledger_id = self.resolve_bill_contact(key.po_key(), ctx).await?;
            let input = UpsertLedgerBill {
                key: *key,
                status: None,
                transaction_date: items.iter().filter_map(|i| i.transaction_date).min(),
                due_date: items.iter().filter_map(|i| i.due_date).max(),
                contact_ledger_id,
                link: None,
            };
            let upserted = match self.store.upsert_ledger_bill(input).await {
                Ok(upserted) => upserted,
                Err(err) => {
                    ctx.absorb(EntityKind::LedgerBill, &key.to_string(), err)?;
                    continue;
                }
            };
            ctx.summary.ledger_bills.record(upserted.outcome);
            let bill = upserted.record;

            let mut lines = Vec::new();
            for item in items {
                let line_input = UpsertBillLine {
                    key: item.detail_key(),
                    bill_id: bill.id,
                    description: item.description.clone(),
                    account_code: item.account_code.clone(),
                    quantity: item.quantity,
                    unit_amount: item.rate,
                    line_amount: item.sub_total,
                };
                match self.store.upsert_bill_line(line_input).await {
                    Ok(upserted) => {
                        ctx.summary.bill_lines.record(upserted.outcome);
                        lines.push(upserted.record);
                    }
                    Err(err) => {
                        ctx.absorb(EntityKind::BillLine, &item.detail_key().to_string(), err)?;
                    }
                }
            }
            bills.push((bill, lines));
        }

        self.sync_bills(&mut bills, ctx).await?;
        self.sync_bill_lines(&bills, ctx).await
    }

    async fn sync_bills(
        &self,
        bills: &mut [(LedgerBill, Vec<LedgerBillLine>)],
        ctx: &mut RunContext,
    ) -> Result<(), EngineError> {
        let mut queue = Vec::new();
        let mut queued: Vec<BillSync> = Vec::new();
        for (index, (bill, lines)) in bills.iter().enumerate() {
            let fields = ledger_bill_fields(bill, lines);
            let fingerprint = fingerprint(&fields);
            match bill.ledger_external_id() {
                None => {
                    queue.push(UpsertRecord::create(
                        bill.reference.clone(),
                        bill.reference.clone(),
                        fields,
                    ));
                    queued.push(BillSync {
                        index,
                        key: bill.reference.clone(),
                        fingerprint,
                    });
                }
                Some(external_id)
                    if bill.synced_fingerprint.as_deref() != Some(fingerprint.as_str()) =>
                {
                    queue.push(UpsertRecord::update(
                        bill.reference.clone(),
                        bill.reference.clone(),
                        external_id,
                        fields,
                    ));
                    queued.push(BillSync {
                        index,
                        key: bill.reference.clone(),
                        fingerprint,
                    });
                }
                Some(_) => {}
            }
        }
        if queue.is_empty() {
            return Ok(());
        }
        info!(count = queue.len(), "syncing bills to the ledger");

        let policy = self.config.batch_policy();
        let ledger = self.ledger.clone();
        let outcomes = run_chunked(&policy, queue, move |chunk| {
            let ledger = ledger.clone();
            async move { ledger.create_or_update(LedgerRecordKind::Bill, &chunk).await }
        })
        .await;

        for (sync, outcome) in queued.into_iter().zip(outcomes) {
            match outcome {
                RecordOutcome::Success { external_id } => {
                    let bill_id = bills[sync.index].0.id;
                    match self
                        .store
                        .record_bill_sync(bill_id, &external_id, &sync.fingerprint)
                        .await
                    {
                        Ok(bill) => bills[sync.index].0 = bill,
                        Err(err) => ctx.absorb(EntityKind::LedgerBill, &sync.key, err)?,
                    }
                }
                RecordOutcome::Failure { reason } => {
                    warn!(key = %sync.key, reason, "ledger rejected bill");
                    ctx.summary.push_failure(
                        EntityKind::LedgerBill,
                        sync.key,
                        FailureKind::ExternalCall,
                        reason,
                    );
                }
            }
        }
        Ok(())
    }

    async fn sync_bill_lines(
        &self,
        bills: &[(LedgerBill, Vec<LedgerBillLine>)],
        ctx: &mut RunContext,
    ) -> Result<(), EngineError> {
        let mut queue = Vec::new();
        let mut queued: Vec<QueuedSync> = Vec::new();
        for (bill, lines) in bills {
            let Some(bill_external) = bill.ledger_external_id() else {
                if !lines.is_empty() {
                    debug!(reference = %bill.reference, "bill not in the ledger yet, deferring line sync");
                }
                continue;
            };
            for line in lines {
                let fields = ledger_line_fields(line);
                let fingerprint = fingerprint(&fields);
                match line.ledger_external_id() {
                    None => {
                        queue.push(
                            UpsertRecord::create(line.reference.clone(), line_name(line), fields)
                                .with_parent(bill_external.clone()),
                        );
                        queued.push(QueuedSync {
                            record_id: line.id,
                            key: line.reference.clone(),
                            fingerprint,
                        });
                    }
                    Some(external_id)
                        if line.synced_fingerprint.as_deref() != Some(fingerprint.as_str()) =>
                    {
                        queue.push(
                            UpsertRecord::update(
                                line.reference.clone(),
                                line_name(line),
                                external_id,
                                fields,
                            )
                            .with_parent(bill_external.clone()),
                        );
                        queued.push(QueuedSync {
                            record_id: line.id,
                            key: line.reference.clone(),
                            fingerprint,
                        });
                    }
                    Some(_) => {}
                }
            }
        }
        if queue.is_empty() {
            return Ok(());
        }
        info!(count = queue.len(), "syncing bill lines to the ledger");

        let policy = self.config.batch_policy();
        let ledger = self.ledger.clone();
        let outcomes = run_chunked(&policy, queue, move |chunk| {
            let ledger = ledger.clone();
            async move { ledger.create_or_update(LedgerRecordKind::BillLine, &chunk).await }
        })
        .await;

        for (sync, outcome) in queued.into_iter().zip(outcomes) {
            match outcome {
                RecordOutcome::Success { external_id } => {
                    if let Err(err) = self
                        .store
                        .record_bill_line_sync(sync.record_id, &external_id, &sync.fingerprint)
                        .await
                    {
                        ctx.absorb(EntityKind::BillLine, &sync.key, err)?;
                    }
                }
                RecordOutcome::Failure { reason } => {
                    warn!(key = %sync.key, reason, "ledger rejected bill line");
                    ctx.summary.push_failure(
                        EntityKind::BillLine,
                        sync.key,
                        FailureKind::ExternalCall,
                        reason,
                    );
                }
            }
        }
        Ok(())
    }

    /// Ledger contact id for a bill, through its purchase order's vendor.
    async fn resolve_bill_contact(
        &self,
        key: PoKey,
        ctx: &mut RunContext,
    ) -> Result<Option<String>, EngineError> {
        let Some(vendor_name) = ctx
            .purchase_orders
            .get(&key)
            .and_then(|po| po.vendor_name.clone())
        else {
            return Ok(None);
        };
        if let Some(contact) = ctx.contacts.get(&vendor_name) {
            return Ok(contact.ledger_contact_id.clone());
        }
        let Some(contact) = self.store.find_contact_by_name(&vendor_name).await? else {
            return Ok(None);
        };
        let ledger_id = contact.ledger_contact_id.clone();
        ctx.contacts.insert(vendor_name, contact);
        Ok(ledger_id)
    }
}

/// Ledger column values for a bill. The total is the sum of its current
/// lines, so adding a sibling line re-syncs the bill.
fn ledger_bill_fields(bill: &LedgerBill, lines: &[LedgerBillLine]) -> Value {
    let total: Decimal = lines.iter().map(|line| line.line_amount).sum();
    json!({
        "reference": bill.reference,
        "status": bill.status,
        "transaction_date": bill.transaction_date,
        "due_date": bill.due_date,
        "contact": bill.contact_ledger_id,
        "total": total,
    })
}

fn ledger_line_fields(line: &LedgerBillLine) -> Value {
    json!({
        "reference": line.reference,
        "description": line.description,
        "account_code": line.account_code,
        "quantity": line.quantity,
        "unit_amount": line.unit_amount,
        "line_amount": line.line_amount,
    })
}

fn line_name(line: &LedgerBillLine) -> String {
    line.description
        .clone()
        .unwrap_or_else(|| line.reference.clone())
}
