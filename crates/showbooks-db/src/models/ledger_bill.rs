//! Ledger bills: one accounts-payable bill per (project, po, detail) group.

use crate::models::{merge_field, normalized};
use crate::store::Upserted;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use showbooks_core::{BillKey, ExternalId};
use sqlx::PgPool;
use uuid::Uuid;

/// Lifecycle of a bill on the accounting ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bill_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    Draft,
    Submitted,
    Authorised,
    Paid,
}

/// A ledger bill. Natural key: (project_number, po_number, detail_number);
/// the reference column carries the same key in its printable form.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LedgerBill {
    pub id: Uuid,
    pub project_number: i32,
    pub po_number: i32,
    pub detail_number: i32,
    pub reference: String,
    pub status: BillStatus,
    pub transaction_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub contact_ledger_id: Option<String>,
    pub ledger_bill_id: Option<String>,
    /// Online view of the bill in the ledger UI, supplied out of band.
    pub link: Option<String>,
    pub synced_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming bill fields for an upsert by (project, po, detail).
#[derive(Debug, Clone)]
pub struct UpsertLedgerBill {
    pub key: BillKey,
    pub status: Option<BillStatus>,
    pub transaction_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub contact_ledger_id: Option<String>,
    pub link: Option<String>,
}

impl LedgerBill {
    #[must_use]
    pub fn new(input: &UpsertLedgerBill) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_number: input.key.project_number,
            po_number: input.key.po_number,
            detail_number: input.key.detail_number,
            reference: input.key.to_string(),
            status: input.status.unwrap_or(BillStatus::Draft),
            transaction_date: input.transaction_date,
            due_date: input.due_date,
            contact_ledger_id: normalized(input.contact_ledger_id.clone()),
            ledger_bill_id: None,
            link: normalized(input.link.clone()),
            synced_fingerprint: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge incoming content. Dates overwrite when present, the contact
    /// ledger id merges non-empty, and the status moves only when the batch
    /// carries one. Returns whether anything changed.
    pub fn apply(&mut self, input: &UpsertLedgerBill) -> bool {
        let mut changed = false;

        if let Some(status) = input.status {
            if self.status != status {
                self.status = status;
                changed = true;
            }
        }
        if input.transaction_date.is_some() && self.transaction_date != input.transaction_date {
            self.transaction_date = input.transaction_date;
            changed = true;
        }
        if input.due_date.is_some() && self.due_date != input.due_date {
            self.due_date = input.due_date;
            changed = true;
        }

        merge_field(&mut self.contact_ledger_id, &input.contact_ledger_id, &mut changed);
        merge_field(&mut self.link, &input.link, &mut changed);

        changed
    }

    #[must_use]
    pub fn bill_key(&self) -> BillKey {
        BillKey::new(self.project_number, self.po_number, self.detail_number)
    }

    #[must_use]
    pub fn ledger_external_id(&self) -> Option<ExternalId> {
        self.ledger_bill_id.clone().map(ExternalId::from)
    }

    /// Upsert by (project, po, detail).
    pub async fn upsert(
        pool: &PgPool,
        input: UpsertLedgerBill,
    ) -> Result<Upserted<LedgerBill>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, LedgerBill>(
            r"
            SELECT * FROM ledger_bill
            WHERE project_number = $1 AND po_number = $2 AND detail_number = $3
            ",
        )
        .bind(input.key.project_number)
        .bind(input.key.po_number)
        .bind(input.key.detail_number)
        .fetch_optional(&mut *tx)
        .await?;

        let result = match existing {
            None => {
                let row = Self::insert(&mut tx, &LedgerBill::new(&input)).await?;
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
        key: BillKey,
    ) -> Result<Option<LedgerBill>, sqlx::Error> {
        sqlx::query_as::<_, LedgerBill>(
            r"
            SELECT * FROM ledger_bill
            WHERE project_number = $1 AND po_number = $2 AND detail_number = $3
            ",
        )
        .bind(key.project_number)
        .bind(key.po_number)
        .bind(key.detail_number)
        .fetch_optional(pool)
        .await
    }

    /// Record a successful external sync: write the ledger bill id
    /// (write-once) and the fingerprint of the content that was synced.
    pub async fn set_sync(
        pool: &PgPool,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<Option<LedgerBill>, sqlx::Error> {
        sqlx::query_as::<_, LedgerBill>(
            r"
            UPDATE ledger_bill
            SET ledger_bill_id = COALESCE(ledger_bill_id, $2),
                synced_fingerprint = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(external_id.as_str())
        .bind(fingerprint)
        .fetch_optional(pool)
        .await
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &LedgerBill,
    ) -> Result<LedgerBill, sqlx::Error> {
        sqlx::query_as::<_, LedgerBill>(
            r"
            INSERT INTO ledger_bill (
                id, project_number, po_number, detail_number, reference,
                status, transaction_date, due_date, contact_ledger_id,
                ledger_bill_id, link, synced_fingerprint, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(row.project_number)
        .bind(row.po_number)
        .bind(row.detail_number)
        .bind(&row.reference)
        .bind(row.status)
        .bind(row.transaction_date)
        .bind(row.due_date)
        .bind(&row.contact_ledger_id)
        .bind(&row.ledger_bill_id)
        .bind(&row.link)
        .bind(&row.synced_fingerprint)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }

    async fn update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &LedgerBill,
    ) -> Result<LedgerBill, sqlx::Error> {
        sqlx::query_as::<_, LedgerBill>(
            r"
            UPDATE ledger_bill
            SET status = $2,
                transaction_date = $3,
                due_date = $4,
                contact_ledger_id = $5,
                link = $6,
                updated_at = $7
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(row.status)
        .bind(row.transaction_date)
        .bind(row.due_date)
        .bind(&row.contact_ledger_id)
        .bind(&row.link)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(key: BillKey) -> UpsertLedgerBill {
        UpsertLedgerBill {
            key,
            status: None,
            transaction_date: NaiveDate::from_ymd_opt(2025, 3, 14),
            due_date: NaiveDate::from_ymd_opt(2025, 4, 14),
            contact_ledger_id: None,
            link: None,
        }
    }

    #[test]
    fn new_bills_default_to_draft_with_a_printable_reference() {
        let bill = LedgerBill::new(&input(BillKey::new(2417, 5, 3)));
        assert_eq!(bill.status, BillStatus::Draft);
        assert_eq!(bill.reference, "2417_05_03");
        assert!(bill.ledger_bill_id.is_none());
    }

    #[test]
    fn apply_moves_dates_and_status() {
        let mut bill = LedgerBill::new(&input(BillKey::new(2417, 5, 3)));

        let mut next = input(BillKey::new(2417, 5, 3));
        next.status = Some(BillStatus::Submitted);
        next.due_date = NaiveDate::from_ymd_opt(2025, 5, 1);
        assert!(bill.apply(&next));
        assert_eq!(bill.status, BillStatus::Submitted);
        assert_eq!(bill.due_date, NaiveDate::from_ymd_opt(2025, 5, 1));

        // a batch without a status leaves the current one alone
        let again = input(BillKey::new(2417, 5, 3));
        let mut third = LedgerBill::new(&input(BillKey::new(2417, 5, 3)));
        third.status = BillStatus::Paid;
        assert!(!third.apply(&again));
        assert_eq!(third.status, BillStatus::Paid);
    }
}
