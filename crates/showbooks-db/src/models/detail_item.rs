//! Detail items: the individual cost lines under a purchase order.

use crate::models::{merge_field, normalized};
use crate::store::Upserted;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use showbooks_core::{subtotal_of, BillKey, DetailKey, ExternalId, PoKey};
use sqlx::PgPool;
use uuid::Uuid;

/// Payment types that are backed by a vendor invoice. Only detail items with
/// one of these payment types can flow on to the accounting ledger.
pub const BILLABLE_PAYMENT_TYPES: [&str; 3] = ["INV", "PROF", "PROJ"];

/// Workflow state of a detail item, carried over from the batch source except
/// for [`DetailItemState::PoMismatch`], which is owned by the reconciliation
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "detail_item_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetailItemState {
    /// Entered but not yet reviewed.
    Pending,
    /// Past its due date without payment.
    Overdue,
    /// Looked over by production accounting.
    Reviewed,
    /// A problem blocks further processing.
    Issue,
    /// Ready to pay; qualifies the line for ledger billing.
    Rtp,
    /// Matched against the ledger.
    Reconciled,
    /// Payment has been issued.
    Paid,
    /// Approved for payment.
    Approved,
    /// Submitted to the ledger.
    Submitted,
    /// The referenced purchase order does not exist. Set by the engine when
    /// the parent cannot be resolved, cleared when a later batch resolves it.
    PoMismatch,
}

impl DetailItemState {
    /// Terminal states no longer participate in billing derivation.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Reconciled)
    }
}

/// A detail item. Natural key: (project_number, po_number, detail_number,
/// line_number).
///
/// `purchase_order_id` is `None` exactly when the parent purchase order could
/// not be resolved; such rows carry state [`DetailItemState::PoMismatch`].
/// `sub_total` is derived from rate, quantity, overtime and fringes and is
/// never accepted from the outside.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DetailItem {
    pub id: Uuid,
    pub purchase_order_id: Option<Uuid>,
    pub project_number: i32,
    pub po_number: i32,
    pub detail_number: i32,
    pub line_number: i32,
    pub account_code: Option<String>,
    pub vendor: Option<String>,
    pub payment_type: Option<String>,
    pub description: Option<String>,
    pub state: DetailItemState,
    pub transaction_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub rate: Decimal,
    pub quantity: Decimal,
    pub overtime: Option<Decimal>,
    pub fringes: Option<Decimal>,
    pub sub_total: Decimal,
    pub board_item_id: Option<String>,
    /// Board item the subitem was created under, recorded at sync time.
    pub parent_board_id: Option<String>,
    /// Ledger line this item was billed as, recorded when the line syncs.
    pub ledger_entry_id: Option<String>,
    pub synced_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming detail-item fields for an upsert by the four-part key.
#[derive(Debug, Clone)]
pub struct UpsertDetailItem {
    pub key: DetailKey,
    pub purchase_order_id: Option<Uuid>,
    pub account_code: Option<String>,
    pub vendor: Option<String>,
    pub payment_type: Option<String>,
    pub description: Option<String>,
    pub state: DetailItemState,
    pub transaction_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub rate: Decimal,
    pub quantity: Decimal,
    pub overtime: Option<Decimal>,
    pub fringes: Option<Decimal>,
}

impl DetailItem {
    #[must_use]
    pub fn new(input: &UpsertDetailItem) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            purchase_order_id: input.purchase_order_id,
            project_number: input.key.project_number,
            po_number: input.key.po_number,
            detail_number: input.key.detail_number,
            line_number: input.key.line_number,
            account_code: normalized(input.account_code.clone()),
            vendor: normalized(input.vendor.clone()),
            payment_type: normalized(input.payment_type.clone()),
            description: normalized(input.description.clone()),
            state: input.state,
            transaction_date: input.transaction_date,
            due_date: input.due_date,
            rate: input.rate,
            quantity: input.quantity,
            overtime: input.overtime,
            fringes: input.fringes,
            sub_total: subtotal_of(input.rate, input.quantity, input.overtime, input.fringes),
            board_item_id: None,
            parent_board_id: None,
            ledger_entry_id: None,
            synced_fingerprint: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge incoming content. The batch is authoritative for the numeric
    /// columns, the state and the parent link (including clearing overtime
    /// and fringes back to `None`); strings merge non-empty and dates
    /// overwrite only when present. The subtotal is rederived whenever a
    /// numeric input moved. Returns whether anything changed.
    pub fn apply(&mut self, input: &UpsertDetailItem) -> bool {
        let mut changed = false;

        if self.purchase_order_id != input.purchase_order_id {
            self.purchase_order_id = input.purchase_order_id;
            changed = true;
        }
        if self.state != input.state {
            self.state = input.state;
            changed = true;
        }

        merge_field(&mut self.account_code, &input.account_code, &mut changed);
        merge_field(&mut self.vendor, &input.vendor, &mut changed);
        merge_field(&mut self.payment_type, &input.payment_type, &mut changed);
        merge_field(&mut self.description, &input.description, &mut changed);

        if input.transaction_date.is_some() && self.transaction_date != input.transaction_date {
            self.transaction_date = input.transaction_date;
            changed = true;
        }
        if input.due_date.is_some() && self.due_date != input.due_date {
            self.due_date = input.due_date;
            changed = true;
        }

        if self.rate != input.rate {
            self.rate = input.rate;
            changed = true;
        }
        if self.quantity != input.quantity {
            self.quantity = input.quantity;
            changed = true;
        }
        if self.overtime != input.overtime {
            self.overtime = input.overtime;
            changed = true;
        }
        if self.fringes != input.fringes {
            self.fringes = input.fringes;
            changed = true;
        }

        let sub_total = subtotal_of(self.rate, self.quantity, self.overtime, self.fringes);
        if self.sub_total != sub_total {
            self.sub_total = sub_total;
            changed = true;
        }

        changed
    }

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
    pub fn bill_key(&self) -> BillKey {
        self.detail_key().bill_key()
    }

    #[must_use]
    pub fn board_external_id(&self) -> Option<ExternalId> {
        self.board_item_id.clone().map(ExternalId::from)
    }

    /// Whether the line's payment type is one of the invoice-backed types.
    #[must_use]
    pub fn is_invoice_backed(&self) -> bool {
        self.payment_type
            .as_deref()
            .is_some_and(|pt| BILLABLE_PAYMENT_TYPES.contains(&pt))
    }

    /// Whether the line flows on to ledger billing: invoice-backed, ready to
    /// pay, and linked to a resolved purchase order.
    #[must_use]
    pub fn qualifies_for_billing(&self) -> bool {
        self.is_invoice_backed()
            && self.state == DetailItemState::Rtp
            && self.purchase_order_id.is_some()
    }

    /// Upsert by the four-part key.
    pub async fn upsert(
        pool: &PgPool,
        input: UpsertDetailItem,
    ) -> Result<Upserted<DetailItem>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, DetailItem>(
            r"
            SELECT * FROM detail_item
            WHERE project_number = $1 AND po_number = $2
              AND detail_number = $3 AND line_number = $4
            ",
        )
        .bind(input.key.project_number)
        .bind(input.key.po_number)
        .bind(input.key.detail_number)
        .bind(input.key.line_number)
        .fetch_optional(&mut *tx)
        .await?;

        let result = match existing {
            None => {
                let row = Self::insert(&mut tx, &DetailItem::new(&input)).await?;
                Upserted::created(row)
            }
            Some(mut row) => {
                if row.apply(&input) {
                    row.updated_at = Utc::now();
                    let row = Self::update(&mut tx, &row).await?;
                    Upserted::updated(row)
                } else {
                    Upserted::unchanged(row)
                }
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    pub async fn find_by_key(
        pool: &PgPool,
        key: DetailKey,
    ) -> Result<Option<DetailItem>, sqlx::Error> {
        sqlx::query_as::<_, DetailItem>(
            r"
            SELECT * FROM detail_item
            WHERE project_number = $1 AND po_number = $2
              AND detail_number = $3 AND line_number = $4
            ",
        )
        .bind(key.project_number)
        .bind(key.po_number)
        .bind(key.detail_number)
        .bind(key.line_number)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_for_po(pool: &PgPool, key: PoKey) -> Result<Vec<DetailItem>, sqlx::Error> {
        sqlx::query_as::<_, DetailItem>(
            r"
            SELECT * FROM detail_item
            WHERE project_number = $1 AND po_number = $2
            ORDER BY detail_number, line_number
            ",
        )
        .bind(key.project_number)
        .bind(key.po_number)
        .fetch_all(pool)
        .await
    }

    /// Record a successful external sync: write the board id and parent board
    /// id (both write-once) and the fingerprint of the content that was
    /// synced.
    pub async fn set_sync(
        pool: &PgPool,
        id: Uuid,
        external_id: &ExternalId,
        parent_external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<Option<DetailItem>, sqlx::Error> {
        sqlx::query_as::<_, DetailItem>(
            r"
            UPDATE detail_item
            SET board_item_id = COALESCE(board_item_id, $2),
                parent_board_id = COALESCE(parent_board_id, $3),
                synced_fingerprint = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(external_id.as_str())
        .bind(parent_external_id.as_str())
        .bind(fingerprint)
        .fetch_optional(pool)
        .await
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &DetailItem,
    ) -> Result<DetailItem, sqlx::Error> {
        sqlx::query_as::<_, DetailItem>(
            r"
            INSERT INTO detail_item (
                id, purchase_order_id, project_number, po_number, detail_number,
                line_number, account_code, vendor, payment_type, description,
                state, transaction_date, due_date, rate, quantity,
                overtime, fringes, sub_total, board_item_id, parent_board_id,
                ledger_entry_id, synced_fingerprint, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(row.purchase_order_id)
        .bind(row.project_number)
        .bind(row.po_number)
        .bind(row.detail_number)
        .bind(row.line_number)
        .bind(&row.account_code)
        .bind(&row.vendor)
        .bind(&row.payment_type)
        .bind(&row.description)
        .bind(row.state)
        .bind(row.transaction_date)
        .bind(row.due_date)
        .bind(row.rate)
        .bind(row.quantity)
        .bind(row.overtime)
        .bind(row.fringes)
        .bind(row.sub_total)
        .bind(&row.board_item_id)
        .bind(&row.parent_board_id)
        .bind(&row.ledger_entry_id)
        .bind(&row.synced_fingerprint)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }

    async fn update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &DetailItem,
    ) -> Result<DetailItem, sqlx::Error> {
        sqlx::query_as::<_, DetailItem>(
            r"
            UPDATE detail_item
            SET purchase_order_id = $2,
                account_code = $3,
                vendor = $4,
                payment_type = $5,
                description = $6,
                state = $7,
                transaction_date = $8,
                due_date = $9,
                rate = $10,
                quantity = $11,
                overtime = $12,
                fringes = $13,
                sub_total = $14,
                updated_at = $15
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(row.purchase_order_id)
        .bind(&row.account_code)
        .bind(&row.vendor)
        .bind(&row.payment_type)
        .bind(&row.description)
        .bind(row.state)
        .bind(row.transaction_date)
        .bind(row.due_date)
        .bind(row.rate)
        .bind(row.quantity)
        .bind(row.overtime)
        .bind(row.fringes)
        .bind(row.sub_total)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }
}
