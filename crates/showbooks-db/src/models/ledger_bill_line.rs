//! Ledger bill lines: one line per detail-item line under a bill.

use crate::models::{merge_field, normalized};
use crate::store::Upserted;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use showbooks_core::{DetailKey, ExternalId};
use sqlx::PgPool;
use uuid::Uuid;

/// A bill line. Natural key: the full four-part detail key; rows hang off
/// their parent bill through `bill_id`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LedgerBillLine {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub project_number: i32,
    pub po_number: i32,
    pub detail_number: i32,
    pub line_number: i32,
    pub reference: String,
    pub description: Option<String>,
    pub account_code: Option<String>,
    pub quantity: Decimal,
    pub unit_amount: Decimal,
    pub line_amount: Decimal,
    pub ledger_line_id: Option<String>,
    pub synced_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming bill-line fields for an upsert by the four-part key.
#[derive(Debug, Clone)]
pub struct UpsertBillLine {
    pub key: DetailKey,
    pub bill_id: Uuid,
    pub description: Option<String>,
    pub account_code: Option<String>,
    pub quantity: Decimal,
    pub unit_amount: Decimal,
    pub line_amount: Decimal,
}

impl LedgerBillLine {
    #[must_use]
    pub fn new(input: &UpsertBillLine) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            bill_id: input.bill_id,
            project_number: input.key.project_number,
            po_number: input.key.po_number,
            detail_number: input.key.detail_number,
            line_number: input.key.line_number,
            reference: input.key.to_string(),
            description: normalized(input.description.clone()),
            account_code: normalized(input.account_code.clone()),
            quantity: input.quantity,
            unit_amount: input.unit_amount,
            line_amount: input.line_amount,
            ledger_line_id: None,
            synced_fingerprint: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge incoming content. Amounts come straight from the effective
    /// detail item and overwrite; strings merge non-empty; a reparent
    /// follows the bill. Returns whether anything changed.
    pub fn apply(&mut self, input: &UpsertBillLine) -> bool {
        let mut changed = false;

        if self.bill_id != input.bill_id {
            self.bill_id = input.bill_id;
            changed = true;
        }

        merge_field(&mut self.description, &input.description, &mut changed);
        merge_field(&mut self.account_code, &input.account_code, &mut changed);

        if self.quantity != input.quantity {
            self.quantity = input.quantity;
            changed = true;
        }
        if self.unit_amount != input.unit_amount {
            self.unit_amount = input.unit_amount;
            changed = true;
        }
        if self.line_amount != input.line_amount {
            self.line_amount = input.line_amount;
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
    pub fn ledger_external_id(&self) -> Option<ExternalId> {
        self.ledger_line_id.clone().map(ExternalId::from)
    }

    /// Upsert by the four-part key.
    pub async fn upsert(
        pool: &PgPool,
        input: UpsertBillLine,
    ) -> Result<Upserted<LedgerBillLine>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, LedgerBillLine>(
            r"
            SELECT * FROM ledger_bill_line
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
                let row = Self::insert(&mut tx, &LedgerBillLine::new(&input)).await?;
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

    pub async fn list_for_bill(
        pool: &PgPool,
        bill_id: Uuid,
    ) -> Result<Vec<LedgerBillLine>, sqlx::Error> {
        sqlx::query_as::<_, LedgerBillLine>(
            r"
            SELECT * FROM ledger_bill_line
            WHERE bill_id = $1
            ORDER BY line_number
            ",
        )
        .bind(bill_id)
        .fetch_all(pool)
        .await
    }

    /// Record a successful external sync: write the ledger line id
    /// (write-once) and the fingerprint of the content that was synced, and
    /// stamp the originating detail item with the ledger entry it became.
    pub async fn set_sync(
        pool: &PgPool,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<Option<LedgerBillLine>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let line = sqlx::query_as::<_, LedgerBillLine>(
            r"
            UPDATE ledger_bill_line
            SET ledger_line_id = COALESCE(ledger_line_id, $2),
                synced_fingerprint = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(external_id.as_str())
        .bind(fingerprint)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(line) = &line {
            sqlx::query(
                r"
                UPDATE detail_item
                SET ledger_entry_id = COALESCE(ledger_entry_id, $5),
                    updated_at = NOW()
                WHERE project_number = $1 AND po_number = $2
                  AND detail_number = $3 AND line_number = $4
                ",
            )
            .bind(line.project_number)
            .bind(line.po_number)
            .bind(line.detail_number)
            .bind(line.line_number)
            .bind(external_id.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(line)
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &LedgerBillLine,
    ) -> Result<LedgerBillLine, sqlx::Error> {
        sqlx::query_as::<_, LedgerBillLine>(
            r"
            INSERT INTO ledger_bill_line (
                id, bill_id, project_number, po_number, detail_number,
                line_number, reference, description, account_code, quantity,
                unit_amount, line_amount, ledger_line_id, synced_fingerprint,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(row.bill_id)
        .bind(row.project_number)
        .bind(row.po_number)
        .bind(row.detail_number)
        .bind(row.line_number)
        .bind(&row.reference)
        .bind(&row.description)
        .bind(&row.account_code)
        .bind(row.quantity)
        .bind(row.unit_amount)
        .bind(row.line_amount)
        .bind(&row.ledger_line_id)
        .bind(&row.synced_fingerprint)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }

    async fn update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &LedgerBillLine,
    ) -> Result<LedgerBillLine, sqlx::Error> {
        sqlx::query_as::<_, LedgerBillLine>(
            r"
            UPDATE ledger_bill_line
            SET bill_id = $2,
                description = $3,
                account_code = $4,
                quantity = $5,
                unit_amount = $6,
                line_amount = $7,
                updated_at = $8
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(row.bill_id)
        .bind(&row.description)
        .bind(&row.account_code)
        .bind(row.quantity)
        .bind(row.unit_amount)
        .bind(row.line_amount)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(key: DetailKey, bill_id: Uuid) -> UpsertBillLine {
        UpsertBillLine {
            key,
            bill_id,
            description: Some("dolly track".to_string()),
            account_code: Some("5020".to_string()),
            quantity: Decimal::new(200, 2),
            unit_amount: Decimal::new(10000, 2),
            line_amount: Decimal::new(20000, 2),
        }
    }

    #[test]
    fn new_lines_carry_the_four_part_reference() {
        let bill_id = Uuid::new_v4();
        let line = LedgerBillLine::new(&input(DetailKey::new(2417, 5, 3, 2), bill_id));
        assert_eq!(line.reference, "2417_05_03_02");
        assert_eq!(line.bill_id, bill_id);
    }

    #[test]
    fn apply_overwrites_amounts() {
        let bill_id = Uuid::new_v4();
        let key = DetailKey::new(2417, 5, 3, 2);
        let mut line = LedgerBillLine::new(&input(key, bill_id));

        let mut next = input(key, bill_id);
        next.line_amount = Decimal::new(30000, 2);
        assert!(line.apply(&next));
        assert_eq!(line.line_amount, Decimal::new(30000, 2));

        assert!(!line.apply(&next));
    }
}
