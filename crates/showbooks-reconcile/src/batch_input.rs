//! The parsed PO-log batch handed to the engine.
//!
//! Produced by the out-of-scope ingestion layer (file events, OCR, board
//! exports); the engine only requires the three ordered record lists. Within
//! one batch, a later record with the same natural key replaces an earlier
//! one: source logs carry corrections appended after the originals, so
//! last-write-wins is documented behaviour, not an error.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use showbooks_core::{DetailKey, PoKey};
use showbooks_db::models::{ContactStatus, DetailItemState};
use std::collections::HashMap;
use std::hash::Hash;

/// One ingestion attempt's full set of records, in source order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedBatch {
    #[serde(default)]
    pub contacts: Vec<ContactRecord>,
    #[serde(default)]
    pub purchase_orders: Vec<PurchaseOrderRecord>,
    #[serde(default)]
    pub detail_items: Vec<DetailItemRecord>,
}

/// A vendor/payee row from the log. Natural key: `name`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub status: Option<ContactStatus>,
    pub vendor_type: Option<String>,
    pub payment_details: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub tax_type: Option<String>,
    pub tax_number: Option<String>,
    pub board_item_id: Option<String>,
    pub ledger_contact_id: Option<String>,
}

/// A purchase-order row from the log. Natural key: (project, po);
/// `vendor_name` references a contact by its natural key.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseOrderRecord {
    pub project_number: i32,
    pub po_number: i32,
    pub vendor_name: Option<String>,
    pub description: Option<String>,
    pub po_type: Option<String>,
    pub producer: Option<String>,
    pub folder_link: Option<String>,
}

impl PurchaseOrderRecord {
    #[must_use]
    pub fn po_key(&self) -> PoKey {
        PoKey::new(self.project_number, self.po_number)
    }
}

/// A detail (cost line) row from the log. Natural key: the four-part key;
/// (project, po) references a purchase order by its natural key.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailItemRecord {
    pub project_number: i32,
    pub po_number: i32,
    pub detail_number: i32,
    #[serde(default = "default_line_number")]
    pub line_number: i32,
    pub account_code: Option<String>,
    pub vendor: Option<String>,
    pub payment_type: Option<String>,
    pub description: Option<String>,
    /// Workflow state from the source; absent means PENDING. PO_MISMATCH is
    /// engine-owned and is not accepted from the log.
    pub state: Option<DetailItemState>,
    pub transaction_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub rate: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    pub overtime: Option<Decimal>,
    pub fringes: Option<Decimal>,
}

fn default_line_number() -> i32 {
    1
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

impl DetailItemRecord {
    #[must_use]
    pub fn detail_key(&self) -> DetailKey {
        DetailKey::new(
            self.project_number,
            self.po_number,
            self.detail_number,
            self.line_number,
        )
    }

    #[must_use]
    pub fn po_key(&self) -> PoKey {
        PoKey::new(self.project_number, self.po_number)
    }
}

impl ParsedBatch {
    /// Contacts after last-write-wins by name, in first-seen order.
    #[must_use]
    pub fn effective_contacts(&self) -> Vec<&ContactRecord> {
        last_write_wins(&self.contacts, |c| c.name.clone())
    }

    /// Purchase orders after last-write-wins by (project, po), in first-seen
    /// order.
    #[must_use]
    pub fn effective_purchase_orders(&self) -> Vec<&PurchaseOrderRecord> {
        last_write_wins(&self.purchase_orders, PurchaseOrderRecord::po_key)
    }

    /// Detail items after last-write-wins by the four-part key, in first-seen
    /// order.
    #[must_use]
    pub fn effective_detail_items(&self) -> Vec<&DetailItemRecord> {
        last_write_wins(&self.detail_items, DetailItemRecord::detail_key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty() && self.purchase_orders.is_empty() && self.detail_items.is_empty()
    }
}

/// Deduplicate by natural key: the later record wins, in the position where
/// its key first appeared.
fn last_write_wins<T, K>(records: &[T], key_of: impl Fn(&T) -> K) -> Vec<&T>
where
    K: Eq + Hash,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut effective: Vec<&T> = Vec::new();
    for record in records {
        match index.get(&key_of(record)) {
            Some(&position) => effective[position] = record,
            None => {
                index.insert(key_of(record), effective.len());
                effective.push(record);
            }
        }
    }
    effective
}
