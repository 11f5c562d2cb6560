//! Pass 3: detail items, upserted locally and mirrored to board subitems.

use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use showbooks_connector::{run_chunked, BoardItemKind, RecordOutcome, UpsertRecord};
use showbooks_core::{ExternalId, PoKey};
use showbooks_db::models::{DetailItem, DetailItemState, PurchaseOrder, UpsertDetailItem};

use crate::batch_input::ParsedBatch;
use crate::engine::{ReconciliationEngine, RunContext};
use crate::error::EngineError;
use crate::fingerprint::fingerprint;
use crate::summary::{EntityKind, FailureKind};

/// A queued subitem together with the board item it syncs under.
struct SubitemSync {
    record_id: Uuid,
    key: String,
    fingerprint: String,
    parent: ExternalId,
}

impl ReconciliationEngine {
    /// Upsert the batch's detail items, maintain the parents' derived totals,
    /// and sync changed items to the board as subitems of their parent.
    ///
    /// An item whose purchase order cannot be resolved is still persisted,
    /// flagged PO_MISMATCH, and kept away from the board until a later batch
    /// supplies the parent. An item whose parent exists locally but has no
    /// board identity yet is persisted and left unsynced for a later run; that
    /// is not a failure.
    pub(crate) async fn reconcile_detail_items(
        &self,
        batch: &ParsedBatch,
        ctx: &mut RunContext,
    ) -> Result<(), EngineError> {
        let records = batch.effective_detail_items();
        if records.is_empty() {
            return Ok(());
        }
        info!(count = records.len(), "detail-item pass");

        let mut queue = Vec::new();
        let mut queued: Vec<SubitemSync> = Vec::new();

        for record in records {
            let key = record.detail_key();
            let parent = self.resolve_parent_po(record.po_key(), ctx).await?;

            // The batch never decides PO_MISMATCH; the engine owns it. A
            // resolved parent clears a stale mismatch back to PENDING.
            let state = match (&parent, record.state) {
                (None, _) => DetailItemState::PoMismatch,
                (Some(_), Some(DetailItemState::PoMismatch)) | (Some(_), None) => {
                    DetailItemState::Pending
                }
                (Some(_), Some(state)) => state,
            };

            let input = UpsertDetailItem {
                key,
                purchase_order_id: parent.as_ref().map(|po| po.id),
                account_code: record.account_code.clone(),
                vendor: record.vendor.clone(),
                payment_type: record.payment_type.clone(),
                description: record.description.clone(),
                state,
                transaction_date: record.transaction_date,
                due_date: record.due_date,
                rate: record.rate,
                quantity: record.quantity,
                overtime: record.overtime,
                fringes: record.fringes,
            };
            let upserted = match self.store.upsert_detail_item(input).await {
                Ok(upserted) => upserted,
                Err(err) => {
                    ctx.absorb(EntityKind::DetailItem, &key.to_string(), err)?;
                    continue;
                }
            };
            ctx.summary.detail_items.record(upserted.outcome);
            let item = upserted.record;

            let Some(parent) = parent else {
                warn!(key = %key, "purchase order not found, detail item flagged PO_MISMATCH");
                ctx.summary.mismatched_detail_items += 1;
                ctx.detail_items.push(item);
                continue;
            };

            if upserted.outcome.wrote() {
                match self.store.recompute_po_total(parent.po_key()).await {
                    Ok(Some(po)) => {
                        ctx.purchase_orders.insert(po.po_key(), po);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        ctx.absorb(EntityKind::PurchaseOrder, &parent.po_key().to_string(), err)?;
                    }
                }
            }

            let parent_external = ctx
                .purchase_orders
                .get(&parent.po_key())
                .and_then(PurchaseOrder::board_external_id);
            let Some(parent_external) = parent_external else {
                debug!(key = %key, "parent not on the board yet, deferring subitem sync");
                ctx.detail_items.push(item);
                continue;
            };

            let fields = board_subitem_fields(&item);
            let fingerprint = fingerprint(&fields);
            match item.board_external_id() {
                None => {
                    queue.push(
                        UpsertRecord::create(key.to_string(), subitem_name(&item), fields)
                            .with_parent(parent_external.clone()),
                    );
                    queued.push(SubitemSync {
                        record_id: item.id,
                        key: key.to_string(),
                        fingerprint,
                        parent: parent_external,
                    });
                }
                Some(external_id)
                    if item.synced_fingerprint.as_deref() != Some(fingerprint.as_str()) =>
                {
                    queue.push(
                        UpsertRecord::update(
                            key.to_string(),
                            subitem_name(&item),
                            external_id,
                            fields,
                        )
                        .with_parent(parent_external.clone()),
                    );
                    queued.push(SubitemSync {
                        record_id: item.id,
                        key: key.to_string(),
                        fingerprint,
                        parent: parent_external,
                    });
                }
                Some(_) => {}
            }
            ctx.detail_items.push(item);
        }

        if queue.is_empty() {
            return Ok(());
        }
        info!(count = queue.len(), "syncing detail items to the board");

        let policy = self.config.batch_policy();
        let board = self.board.clone();
        let outcomes = run_chunked(&policy, queue, move |chunk| {
            let board = board.clone();
            async move { board.create_or_update(BoardItemKind::Subitem, &chunk).await }
        })
        .await;

        for (sync, outcome) in queued.into_iter().zip(outcomes) {
            match outcome {
                RecordOutcome::Success { external_id } => {
                    if let Err(err) = self
                        .store
                        .record_detail_sync(
                            sync.record_id,
                            &external_id,
                            &sync.parent,
                            &sync.fingerprint,
                        )
                        .await
                    {
                        ctx.absorb(EntityKind::DetailItem, &sync.key, err)?;
                    }
                }
                RecordOutcome::Failure { reason } => {
                    warn!(key = %sync.key, reason, "board rejected detail item");
                    ctx.summary.push_failure(
                        EntityKind::DetailItem,
                        sync.key,
                        FailureKind::ExternalCall,
                        reason,
                    );
                }
            }
        }
        Ok(())
    }

    /// Resolve a purchase-order key through the run cache, falling back to
    /// the store for parents created by earlier batches.
    async fn resolve_parent_po(
        &self,
        key: PoKey,
        ctx: &mut RunContext,
    ) -> Result<Option<PurchaseOrder>, EngineError> {
        if let Some(po) = ctx.purchase_orders.get(&key) {
            return Ok(Some(po.clone()));
        }
        let Some(po) = self.store.find_purchase_order(key).await? else {
            return Ok(None);
        };
        ctx.purchase_orders.insert(key, po.clone());
        Ok(Some(po))
    }
}

/// Board column values for a detail item's subitem. The stored subtotal is
/// part of the payload, so a rate or quantity correction re-syncs the row.
fn board_subitem_fields(item: &DetailItem) -> Value {
    json!({
        "reference": item.detail_key().to_string(),
        "account_code": item.account_code,
        "vendor": item.vendor,
        "payment_type": item.payment_type,
        "description": item.description,
        "state": item.state,
        "transaction_date": item.transaction_date,
        "due_date": item.due_date,
        "rate": item.rate,
        "quantity": item.quantity,
        "overtime": item.overtime,
        "fringes": item.fringes,
        "sub_total": item.sub_total,
    })
}

fn subitem_name(item: &DetailItem) -> String {
    item.description
        .clone()
        .unwrap_or_else(|| item.detail_key().to_string())
}
