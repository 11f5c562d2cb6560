//! Pass 2: purchase orders, upserted locally and mirrored to board items.

use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use showbooks_connector::{run_chunked, BoardItemKind, RecordOutcome, UpsertRecord};
use showbooks_db::models::{Project, PurchaseOrder, UpsertContact, UpsertPurchaseOrder};

use crate::batch_input::ParsedBatch;
use crate::engine::{ReconciliationEngine, RunContext};
use crate::error::EngineError;
use crate::fingerprint::fingerprint;
use crate::passes::QueuedSync;
use crate::summary::{EntityKind, FailureKind};

impl ReconciliationEngine {
    /// Upsert the batch's purchase orders and sync changed ones to the board.
    ///
    /// Projects are created as placeholders on first sight of their number;
    /// vendor references resolve through the contact cache, falling back to
    /// the store for vendors from earlier batches.
    pub(crate) async fn reconcile_purchase_orders(
        &self,
        batch: &ParsedBatch,
        ctx: &mut RunContext,
    ) -> Result<(), EngineError> {
        let records = batch.effective_purchase_orders();
        if records.is_empty() {
            return Ok(());
        }
        info!(count = records.len(), "purchase-order pass");

        let mut queue = Vec::new();
        let mut queued: Vec<QueuedSync> = Vec::new();

        for record in records {
            let key = record.po_key();
            let Some(project) = self.ensure_project(key.project_number, ctx).await? else {
                continue;
            };
            let contact_id = self
                .resolve_contact(record.vendor_name.as_deref(), ctx)
                .await?;

            let input = UpsertPurchaseOrder {
                key,
                project_id: project.id,
                vendor_name: record.vendor_name.clone(),
                description: record.description.clone(),
                po_type: record.po_type.clone(),
                producer: record.producer.clone(),
                folder_link: record.folder_link.clone(),
                contact_id,
            };
            let upserted = match self.store.upsert_purchase_order(input).await {
                Ok(upserted) => upserted,
                Err(err) => {
                    ctx.absorb(EntityKind::PurchaseOrder, &key.to_string(), err)?;
                    continue;
                }
            };
            ctx.summary.purchase_orders.record(upserted.outcome);
            let po = upserted.record;

            let fields = board_item_fields(&po);
            let fingerprint = fingerprint(&fields);
            match po.board_external_id() {
                None => {
                    queue.push(UpsertRecord::create(key.to_string(), item_name(&po), fields));
                    queued.push(QueuedSync {
                        record_id: po.id,
                        key: key.to_string(),
                        fingerprint,
                    });
                }
                Some(external_id)
                    if po.synced_fingerprint.as_deref() != Some(fingerprint.as_str()) =>
                {
                    queue.push(UpsertRecord::update(
                        key.to_string(),
                        item_name(&po),
                        external_id,
                        fields,
                    ));
                    queued.push(QueuedSync {
                        record_id: po.id,
                        key: key.to_string(),
                        fingerprint,
                    });
                }
                Some(_) => {}
            }
            ctx.purchase_orders.insert(key, po);
        }

        if queue.is_empty() {
            return Ok(());
        }
        info!(count = queue.len(), "syncing purchase orders to the board");

        let policy = self.config.batch_policy();
        let board = self.board.clone();
        let outcomes = run_chunked(&policy, queue, move |chunk| {
            let board = board.clone();
            async move { board.create_or_update(BoardItemKind::Item, &chunk).await }
        })
        .await;

        for (sync, outcome) in queued.into_iter().zip(outcomes) {
            match outcome {
                RecordOutcome::Success { external_id } => {
                    match self
                        .store
                        .record_po_sync(sync.record_id, &external_id, &sync.fingerprint)
                        .await
                    {
                        Ok(po) => {
                            ctx.purchase_orders.insert(po.po_key(), po);
                        }
                        Err(err) => ctx.absorb(EntityKind::PurchaseOrder, &sync.key, err)?,
                    }
                }
                RecordOutcome::Failure { reason } => {
                    warn!(key = %sync.key, reason, "board rejected purchase order");
                    ctx.summary.push_failure(
                        EntityKind::PurchaseOrder,
                        sync.key,
                        FailureKind::ExternalCall,
                        reason,
                    );
                }
            }
        }
        Ok(())
    }

    /// Resolve a project number to its row, creating a placeholder when the
    /// number has never been seen. Resolutions are cached per run.
    async fn ensure_project(
        &self,
        project_number: i32,
        ctx: &mut RunContext,
    ) -> Result<Option<Project>, EngineError> {
        if let Some(project) = ctx.projects.get(&project_number) {
            return Ok(Some(project.clone()));
        }
        let name = Project::placeholder_name(project_number);
        let upserted = match self.store.ensure_project(project_number, &name).await {
            Ok(upserted) => upserted,
            Err(err) => {
                ctx.absorb(EntityKind::Project, &project_number.to_string(), err)?;
                return Ok(None);
            }
        };
        ctx.summary.projects.record(upserted.outcome);
        ctx.projects.insert(project_number, upserted.record.clone());
        Ok(Some(upserted.record))
    }

    /// Resolve a vendor name to a contact id, creating a bare PENDING contact
    /// when the name is not known from this batch or an earlier one.
    async fn resolve_contact(
        &self,
        vendor_name: Option<&str>,
        ctx: &mut RunContext,
    ) -> Result<Option<Uuid>, EngineError> {
        let Some(name) = vendor_name.map(str::trim).filter(|name| !name.is_empty()) else {
            return Ok(None);
        };
        if let Some(contact) = ctx.contacts.get(name) {
            return Ok(Some(contact.id));
        }
        let input = UpsertContact {
            name: name.to_string(),
            ..UpsertContact::default()
        };
        let upserted = match self.store.upsert_contact(input).await {
            Ok(upserted) => upserted,
            Err(err) => {
                ctx.absorb(EntityKind::Contact, name, err)?;
                return Ok(None);
            }
        };
        ctx.summary.contacts.record(upserted.outcome);
        let id = upserted.record.id;
        ctx.contacts.insert(name.to_string(), upserted.record);
        Ok(Some(id))
    }
}

/// Board column values for a purchase order's item.
///
/// The derived total is not part of the payload: the detail pass recomputes
/// it after this sync, and the board derives its own rollup from subitems.
fn board_item_fields(po: &PurchaseOrder) -> Value {
    json!({
        "reference": po.po_key().to_string(),
        "vendor_name": po.vendor_name,
        "description": po.description,
        "po_type": po.po_type,
        "producer": po.producer,
        "folder_link": po.folder_link,
    })
}

fn item_name(po: &PurchaseOrder) -> String {
    po.vendor_name
        .clone()
        .unwrap_or_else(|| po.po_key().to_string())
}
