//! The reconciliation engine and its per-run working state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use showbooks_connector::{BoardClient, LedgerClient};
use showbooks_core::PoKey;
use showbooks_db::models::{Contact, DetailItem, Project, PurchaseOrder};
use showbooks_db::{DbError, LedgerStore};

use crate::batch_input::ParsedBatch;
use crate::config::ReconcileConfig;
use crate::error::EngineError;
use crate::summary::{EntityKind, FailureKind, RunSummary};
use crate::tracker::RunTracker;

/// Drives one batch through the four reconciliation passes.
///
/// Passes run strictly in order (contacts, purchase orders, detail items,
/// ledger bills) so that each pass can resolve the natural-key references the
/// previous one established. Local persistence always happens before any
/// external call; a record that fails to sync keeps its local row and is
/// retried on the next run.
pub struct ReconciliationEngine {
    pub(crate) store: Arc<dyn LedgerStore>,
    pub(crate) board: Arc<dyn BoardClient>,
    pub(crate) ledger: Arc<dyn LedgerClient>,
    pub(crate) config: ReconcileConfig,
    tracker: RunTracker,
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        board: Arc<dyn BoardClient>,
        ledger: Arc<dyn LedgerClient>,
        config: ReconcileConfig,
    ) -> Self {
        let tracker = RunTracker::new(store.clone());
        Self {
            store,
            board,
            ledger,
            config,
            tracker,
        }
    }

    /// Reconcile one parsed batch under an already-registered run.
    ///
    /// Claims the run (refusing if another run for the same source is in
    /// flight), executes the passes, and settles the run as COMPLETED or
    /// FAILED. Per-record problems are absorbed into the returned
    /// [`RunSummary`]; only a claim refusal or a lost store connection
    /// surfaces as an error, and the batch is untouched in the refusal case.
    #[instrument(skip(self, batch), fields(run_id = %run_id))]
    pub async fn run(
        &self,
        run_id: Uuid,
        batch: &ParsedBatch,
    ) -> Result<RunSummary, EngineError> {
        let run = self.tracker.begin(run_id).await?;
        info!(
            source = %run.source,
            contacts = batch.contacts.len(),
            purchase_orders = batch.purchase_orders.len(),
            detail_items = batch.detail_items.len(),
            "reconciling batch"
        );

        let mut ctx = RunContext::new(run_id);
        match self.run_passes(batch, &mut ctx).await {
            Ok(()) => {
                self.tracker.complete(run_id).await?;
                info!(
                    failures = ctx.summary.failures.len(),
                    mismatches = ctx.summary.mismatched_detail_items,
                    "batch reconciled"
                );
                Ok(ctx.summary)
            }
            Err(err) => {
                // Best effort; the original error is the one worth surfacing.
                if let Err(fail_err) = self.tracker.fail(run_id, &err.to_string()).await {
                    warn!(error = %fail_err, "could not mark run failed");
                }
                Err(err)
            }
        }
    }

    async fn run_passes(
        &self,
        batch: &ParsedBatch,
        ctx: &mut RunContext,
    ) -> Result<(), EngineError> {
        self.reconcile_contacts(batch, ctx).await?;
        self.reconcile_purchase_orders(batch, ctx).await?;
        self.reconcile_detail_items(batch, ctx).await?;
        self.reconcile_ledger_bills(ctx).await?;
        Ok(())
    }
}

/// Working state shared by the passes of one run.
///
/// The maps cache rows already touched this run so later passes resolve
/// references without re-reading the store; `detail_items` carries this
/// batch's effective detail rows forward into the billing pass.
pub(crate) struct RunContext {
    pub(crate) contacts: HashMap<String, Contact>,
    pub(crate) projects: HashMap<i32, Project>,
    pub(crate) purchase_orders: HashMap<PoKey, PurchaseOrder>,
    pub(crate) detail_items: Vec<DetailItem>,
    pub(crate) summary: RunSummary,
}

impl RunContext {
    fn new(run_id: Uuid) -> Self {
        Self {
            contacts: HashMap::new(),
            projects: HashMap::new(),
            purchase_orders: HashMap::new(),
            detail_items: Vec::new(),
            summary: RunSummary::new(run_id),
        }
    }

    /// Absorb a per-record store error into the summary.
    ///
    /// A lost connection aborts the run; anything else marks the one record
    /// failed and lets the pass continue.
    pub(crate) fn absorb(
        &mut self,
        entity: EntityKind,
        key: &str,
        err: DbError,
    ) -> Result<(), EngineError> {
        if err.is_connection_failure() {
            return Err(err.into());
        }
        warn!(%entity, key, error = %err, "record not persisted");
        self.summary
            .push_failure(entity, key, FailureKind::Persistence, err.to_string());
        Ok(())
    }
}
