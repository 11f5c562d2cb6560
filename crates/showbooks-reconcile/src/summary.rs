//! Run result summary: what happened to every record in a batch.

use serde::Serialize;
use showbooks_db::WriteOutcome;
use std::fmt;
use uuid::Uuid;

/// Which entity a failed record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Contact,
    PurchaseOrder,
    DetailItem,
    LedgerBill,
    BillLine,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Project => "project",
            Self::Contact => "contact",
            Self::PurchaseOrder => "purchase order",
            Self::DetailItem => "detail item",
            Self::LedgerBill => "ledger bill",
            Self::BillLine => "bill line",
        };
        write!(f, "{s}")
    }
}

/// Why a record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The external service rejected the record.
    ExternalCall,
    /// The local write failed.
    Persistence,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ExternalCall => "external call",
            Self::Persistence => "persistence",
        };
        write!(f, "{s}")
    }
}

/// One record that did not make it, with its natural key and the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRecord {
    pub entity: EntityKind,
    pub key: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome counters for one entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
}

impl EntityCounts {
    /// Count one local upsert outcome.
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created => self.created += 1,
            WriteOutcome::Updated => self.updated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Records that were written or confirmed present.
    #[must_use]
    pub fn processed(&self) -> u32 {
        self.created + self.updated + self.unchanged
    }
}

/// The visible output of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub projects: EntityCounts,
    pub contacts: EntityCounts,
    pub purchase_orders: EntityCounts,
    pub detail_items: EntityCounts,
    /// Detail items persisted with state PO_MISMATCH this run.
    pub mismatched_detail_items: u32,
    pub ledger_bills: EntityCounts,
    pub bill_lines: EntityCounts,
    pub failures: Vec<FailedRecord>,
}

impl RunSummary {
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            ..Self::default()
        }
    }

    pub fn push_failure(
        &mut self,
        entity: EntityKind,
        key: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
    ) {
        let counts = match entity {
            EntityKind::Project => &mut self.projects,
            EntityKind::Contact => &mut self.contacts,
            EntityKind::PurchaseOrder => &mut self.purchase_orders,
            EntityKind::DetailItem => &mut self.detail_items,
            EntityKind::LedgerBill => &mut self.ledger_bills,
            EntityKind::BillLine => &mut self.bill_lines,
        };
        counts.record_failure();
        self.failures.push(FailedRecord {
            entity,
            key: key.into(),
            kind,
            reason: reason.into(),
        });
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_outcomes() {
        let mut counts = EntityCounts::default();
        counts.record(WriteOutcome::Created);
        counts.record(WriteOutcome::Created);
        counts.record(WriteOutcome::Updated);
        counts.record(WriteOutcome::Unchanged);
        assert_eq!(counts.created, 2);
        assert_eq!(counts.updated, 1);
        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.processed(), 4);
        assert_eq!(counts.failed, 0);
    }

    #[test]
    fn pushed_failures_increment_the_entity_counter() {
        let mut summary = RunSummary::new(Uuid::new_v4());
        summary.push_failure(
            EntityKind::PurchaseOrder,
            "2417_05",
            FailureKind::ExternalCall,
            "board rejected the item",
        );
        assert!(summary.has_failures());
        assert_eq!(summary.purchase_orders.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].key, "2417_05");
    }
}
