//! Row types and SQL for the ledger tables.
//!
//! One module per table. Each carries the `FromRow` struct, its status enum
//! where it owns one, the upsert/create input struct, and the SQL functions.
//! Merge semantics live on the row types (`new` / `apply`) so the Postgres
//! and in-memory stores share one definition of every derived value.

pub mod audit_event;
pub mod batch_run;
pub mod contact;
pub mod detail_item;
pub mod ledger_bill;
pub mod ledger_bill_line;
pub mod project;
pub mod purchase_order;

pub use audit_event::{AuditEvent, AuditOperation, NewAuditEvent};
pub use batch_run::{BatchRun, BatchRunStatus, CreateBatchRun};
pub use contact::{Contact, ContactStatus, UpsertContact};
pub use detail_item::{DetailItem, DetailItemState, UpsertDetailItem};
pub use ledger_bill::{BillStatus, LedgerBill, UpsertLedgerBill};
pub use ledger_bill_line::{LedgerBillLine, UpsertBillLine};
pub use project::{Project, ProjectStatus};
pub use purchase_order::{PurchaseOrder, UpsertPurchaseOrder};

/// Treat empty and whitespace-only strings as absent.
pub(crate) fn normalized(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Non-empty incoming values win; absent values leave the row alone.
pub(crate) fn merge_field(
    current: &mut Option<String>,
    incoming: &Option<String>,
    changed: &mut bool,
) {
    if let Some(value) = normalized(incoming.clone()) {
        if current.as_deref() != Some(value.as_str()) {
            *current = Some(value);
            *changed = true;
        }
    }
}

/// External ids are write-once: an already assigned id is never overwritten.
pub(crate) fn merge_external_id(
    current: &mut Option<String>,
    incoming: &Option<String>,
    changed: &mut bool,
) {
    if current.is_none() {
        if let Some(value) = normalized(incoming.clone()) {
            *current = Some(value);
            *changed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_drops_blank_strings() {
        assert_eq!(normalized(Some("  ".to_string())), None);
        assert_eq!(normalized(Some(String::new())), None);
        assert_eq!(normalized(Some("x".to_string())), Some("x".to_string()));
        assert_eq!(normalized(None), None);
    }

    #[test]
    fn merge_field_keeps_existing_on_absent_input() {
        let mut current = Some("old".to_string());
        let mut changed = false;

        merge_field(&mut current, &None, &mut changed);
        assert_eq!(current.as_deref(), Some("old"));
        assert!(!changed);

        merge_field(&mut current, &Some(String::new()), &mut changed);
        assert_eq!(current.as_deref(), Some("old"));
        assert!(!changed);

        merge_field(&mut current, &Some("new".to_string()), &mut changed);
        assert_eq!(current.as_deref(), Some("new"));
        assert!(changed);
    }

    #[test]
    fn merge_external_id_never_overwrites() {
        let mut current = Some("b-1".to_string());
        let mut changed = false;
        merge_external_id(&mut current, &Some("b-2".to_string()), &mut changed);
        assert_eq!(current.as_deref(), Some("b-1"));
        assert!(!changed);

        let mut empty = None;
        merge_external_id(&mut empty, &Some("b-2".to_string()), &mut changed);
        assert_eq!(empty.as_deref(), Some("b-2"));
        assert!(changed);
    }
}
