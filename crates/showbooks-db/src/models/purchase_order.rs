//! Purchase orders.

use crate::models::{merge_field, normalized};
use crate::store::Upserted;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use showbooks_core::{ExternalId, PoKey};
use sqlx::PgPool;
use uuid::Uuid;

/// A purchase order. Natural key: (project_number, po_number).
///
/// `amount_total` is derived: it must always equal the sum of the subtotals
/// of the detail items linked to this row, and is recomputed through
/// [`PurchaseOrder::recompute_total`] after every detail-item mutation.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project_number: i32,
    pub po_number: i32,
    pub vendor_name: Option<String>,
    pub description: Option<String>,
    pub po_type: Option<String>,
    pub producer: Option<String>,
    pub folder_link: Option<String>,
    pub contact_id: Option<Uuid>,
    pub amount_total: Decimal,
    pub board_item_id: Option<String>,
    pub synced_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming purchase-order fields for an upsert by (project, po).
#[derive(Debug, Clone)]
pub struct UpsertPurchaseOrder {
    pub key: PoKey,
    pub project_id: Uuid,
    pub vendor_name: Option<String>,
    pub description: Option<String>,
    pub po_type: Option<String>,
    pub producer: Option<String>,
    pub folder_link: Option<String>,
    pub contact_id: Option<Uuid>,
}

impl PurchaseOrder {
    /// Build a fresh row. The derived total starts at zero; detail items have
    /// not been reconciled yet.
    #[must_use]
    pub fn new(input: &UpsertPurchaseOrder) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id: input.project_id,
            project_number: input.key.project_number,
            po_number: input.key.po_number,
            vendor_name: normalized(input.vendor_name.clone()),
            description: normalized(input.description.clone()),
            po_type: normalized(input.po_type.clone()),
            producer: normalized(input.producer.clone()),
            folder_link: normalized(input.folder_link.clone()),
            contact_id: input.contact_id,
            amount_total: Decimal::ZERO,
            board_item_id: None,
            synced_fingerprint: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge incoming content. Non-empty strings win; the contact link is
    /// updated only when the batch resolves one. The board id and fingerprint
    /// belong to the sync write-back, never to the batch. Returns whether
    /// anything changed.
    pub fn apply(&mut self, input: &UpsertPurchaseOrder) -> bool {
        let mut changed = false;

        merge_field(&mut self.vendor_name, &input.vendor_name, &mut changed);
        merge_field(&mut self.description, &input.description, &mut changed);
        merge_field(&mut self.po_type, &input.po_type, &mut changed);
        merge_field(&mut self.producer, &input.producer, &mut changed);
        merge_field(&mut self.folder_link, &input.folder_link, &mut changed);

        if let Some(contact_id) = input.contact_id {
            if self.contact_id != Some(contact_id) {
                self.contact_id = Some(contact_id);
                changed = true;
            }
        }

        changed
    }

    #[must_use]
    pub fn po_key(&self) -> PoKey {
        PoKey::new(self.project_number, self.po_number)
    }

    #[must_use]
    pub fn board_external_id(&self) -> Option<ExternalId> {
        self.board_item_id.clone().map(ExternalId::from)
    }

    /// Upsert by (project, po): insert when absent, merge content when present.
    pub async fn upsert(
        pool: &PgPool,
        input: UpsertPurchaseOrder,
    ) -> Result<Upserted<PurchaseOrder>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_order WHERE project_number = $1 AND po_number = $2",
        )
        .bind(input.key.project_number)
        .bind(input.key.po_number)
        .fetch_optional(&mut *tx)
        .await?;

        let result = match existing {
            None => {
                let row = Self::insert(&mut tx, &PurchaseOrder::new(&input)).await?;
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
        key: PoKey,
    ) -> Result<Option<PurchaseOrder>, sqlx::Error> {
        sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_order WHERE project_number = $1 AND po_number = $2",
        )
        .bind(key.project_number)
        .bind(key.po_number)
        .fetch_optional(pool)
        .await
    }

    /// Record a successful external sync: write the board id (write-once) and
    /// the fingerprint of the content that was synced.
    pub async fn set_sync(
        pool: &PgPool,
        id: Uuid,
        external_id: &ExternalId,
        fingerprint: &str,
    ) -> Result<Option<PurchaseOrder>, sqlx::Error> {
        sqlx::query_as::<_, PurchaseOrder>(
            r"
            UPDATE purchase_order
            SET board_item_id = COALESCE(board_item_id, $2),
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

    /// Recompute the derived total as the sum of the linked detail items'
    /// subtotals, in one atomic statement.
    pub async fn recompute_total(
        pool: &PgPool,
        key: PoKey,
    ) -> Result<Option<PurchaseOrder>, sqlx::Error> {
        sqlx::query_as::<_, PurchaseOrder>(
            r"
            UPDATE purchase_order po
            SET amount_total = COALESCE(
                    (SELECT SUM(d.sub_total) FROM detail_item d WHERE d.purchase_order_id = po.id),
                    0
                ),
                updated_at = NOW()
            WHERE po.project_number = $1 AND po.po_number = $2
            RETURNING *
            ",
        )
        .bind(key.project_number)
        .bind(key.po_number)
        .fetch_optional(pool)
        .await
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &PurchaseOrder,
    ) -> Result<PurchaseOrder, sqlx::Error> {
        sqlx::query_as::<_, PurchaseOrder>(
            r"
            INSERT INTO purchase_order (
                id, project_id, project_number, po_number, vendor_name,
                description, po_type, producer, folder_link, contact_id,
                amount_total, board_item_id, synced_fingerprint,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(row.project_id)
        .bind(row.project_number)
        .bind(row.po_number)
        .bind(&row.vendor_name)
        .bind(&row.description)
        .bind(&row.po_type)
        .bind(&row.producer)
        .bind(&row.folder_link)
        .bind(row.contact_id)
        .bind(row.amount_total)
        .bind(&row.board_item_id)
        .bind(&row.synced_fingerprint)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }

    async fn update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &PurchaseOrder,
    ) -> Result<PurchaseOrder, sqlx::Error> {
        sqlx::query_as::<_, PurchaseOrder>(
            r"
            UPDATE purchase_order
            SET vendor_name = $2,
                description = $3,
                po_type = $4,
                producer = $5,
                folder_link = $6,
                contact_id = $7,
                updated_at = $8
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(&row.vendor_name)
        .bind(&row.description)
        .bind(&row.po_type)
        .bind(&row.producer)
        .bind(&row.folder_link)
        .bind(row.contact_id)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(project: i32, po: i32) -> UpsertPurchaseOrder {
        UpsertPurchaseOrder {
            key: PoKey::new(project, po),
            project_id: Uuid::new_v4(),
            vendor_name: Some("Acme Films".to_string()),
            description: Some("grip rental".to_string()),
            po_type: None,
            producer: None,
            folder_link: None,
            contact_id: None,
        }
    }

    #[test]
    fn new_rows_start_with_zero_total_and_no_board_id() {
        let po = PurchaseOrder::new(&input(2417, 5));
        assert_eq!(po.amount_total, Decimal::ZERO);
        assert!(po.board_item_id.is_none());
        assert!(po.synced_fingerprint.is_none());
        assert_eq!(po.po_key(), PoKey::new(2417, 5));
    }

    #[test]
    fn apply_is_unchanged_for_identical_content() {
        let mut po = PurchaseOrder::new(&input(2417, 5));
        assert!(!po.apply(&input(2417, 5)));
    }

    #[test]
    fn apply_updates_content_and_contact_link() {
        let mut po = PurchaseOrder::new(&input(2417, 5));
        let contact_id = Uuid::new_v4();

        let mut next = input(2417, 5);
        next.description = Some("camera rental".to_string());
        next.contact_id = Some(contact_id);

        assert!(po.apply(&next));
        assert_eq!(po.description.as_deref(), Some("camera rental"));
        assert_eq!(po.contact_id, Some(contact_id));

        // absent contact on a later batch leaves the link alone
        assert!(!po.apply(&next.clone()));
        let mut third = input(2417, 5);
        third.description = Some("camera rental".to_string());
        assert!(!po.apply(&third));
        assert_eq!(po.contact_id, Some(contact_id));
    }
}
