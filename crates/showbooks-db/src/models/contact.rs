//! Vendor/payee contacts.

use crate::models::{merge_external_id, merge_field, normalized};
use crate::store::Upserted;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use showbooks_core::ExternalId;
use sqlx::PgPool;
use uuid::Uuid;

/// Verification status of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contact_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactStatus {
    /// Newly seen, nothing verified yet.
    Pending,
    /// Queued for manual verification.
    ToVerify,
    /// Vendor details approved for payment.
    Approved,
    /// A problem blocks payment.
    Issue,
}

/// A vendor or payee. Natural key: `name`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub status: ContactStatus,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming contact fields for an upsert by name.
#[derive(Debug, Clone, Default)]
pub struct UpsertContact {
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

impl Contact {
    /// Build a fresh row from incoming fields. Status defaults to PENDING.
    #[must_use]
    pub fn new(input: &UpsertContact) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            status: input.status.unwrap_or(ContactStatus::Pending),
            vendor_type: normalized(input.vendor_type.clone()),
            payment_details: normalized(input.payment_details.clone()),
            email: normalized(input.email.clone()),
            phone: normalized(input.phone.clone()),
            address_line_1: normalized(input.address_line_1.clone()),
            address_line_2: normalized(input.address_line_2.clone()),
            city: normalized(input.city.clone()),
            zip: normalized(input.zip.clone()),
            region: normalized(input.region.clone()),
            country: normalized(input.country.clone()),
            tax_type: normalized(input.tax_type.clone()),
            tax_number: normalized(input.tax_number.clone()),
            board_item_id: normalized(input.board_item_id.clone()),
            ledger_contact_id: normalized(input.ledger_contact_id.clone()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge non-empty incoming fields into this row. Already assigned
    /// external ids are never overwritten. Returns whether anything changed.
    pub fn apply(&mut self, input: &UpsertContact) -> bool {
        let mut changed = false;

        if let Some(status) = input.status {
            if self.status != status {
                self.status = status;
                changed = true;
            }
        }

        merge_field(&mut self.vendor_type, &input.vendor_type, &mut changed);
        merge_field(&mut self.payment_details, &input.payment_details, &mut changed);
        merge_field(&mut self.email, &input.email, &mut changed);
        merge_field(&mut self.phone, &input.phone, &mut changed);
        merge_field(&mut self.address_line_1, &input.address_line_1, &mut changed);
        merge_field(&mut self.address_line_2, &input.address_line_2, &mut changed);
        merge_field(&mut self.city, &input.city, &mut changed);
        merge_field(&mut self.zip, &input.zip, &mut changed);
        merge_field(&mut self.region, &input.region, &mut changed);
        merge_field(&mut self.country, &input.country, &mut changed);
        merge_field(&mut self.tax_type, &input.tax_type, &mut changed);
        merge_field(&mut self.tax_number, &input.tax_number, &mut changed);
        merge_external_id(&mut self.board_item_id, &input.board_item_id, &mut changed);
        merge_external_id(&mut self.ledger_contact_id, &input.ledger_contact_id, &mut changed);

        changed
    }

    /// Board id as a typed external id.
    #[must_use]
    pub fn board_external_id(&self) -> Option<ExternalId> {
        self.board_item_id.clone().map(ExternalId::from)
    }

    /// Ledger contact id as a typed external id.
    #[must_use]
    pub fn ledger_external_id(&self) -> Option<ExternalId> {
        self.ledger_contact_id.clone().map(ExternalId::from)
    }

    /// Upsert by name: insert when absent, merge non-empty fields when present.
    pub async fn upsert(
        pool: &PgPool,
        input: UpsertContact,
    ) -> Result<Upserted<Contact>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, Contact>("SELECT * FROM contact WHERE name = $1")
            .bind(&input.name)
            .fetch_optional(&mut *tx)
            .await?;

        let result = match existing {
            None => {
                let row = Self::insert(&mut tx, &Contact::new(&input)).await?;
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

    /// Find a contact by its natural key.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Contact>, sqlx::Error> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contact WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &Contact,
    ) -> Result<Contact, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            r"
            INSERT INTO contact (
                id, name, status, vendor_type, payment_details, email, phone,
                address_line_1, address_line_2, city, zip, region, country,
                tax_type, tax_number, board_item_id, ledger_contact_id,
                created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(&row.name)
        .bind(row.status)
        .bind(&row.vendor_type)
        .bind(&row.payment_details)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(&row.address_line_1)
        .bind(&row.address_line_2)
        .bind(&row.city)
        .bind(&row.zip)
        .bind(&row.region)
        .bind(&row.country)
        .bind(&row.tax_type)
        .bind(&row.tax_number)
        .bind(&row.board_item_id)
        .bind(&row.ledger_contact_id)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }

    async fn update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &Contact,
    ) -> Result<Contact, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            r"
            UPDATE contact
            SET status = $2,
                vendor_type = $3,
                payment_details = $4,
                email = $5,
                phone = $6,
                address_line_1 = $7,
                address_line_2 = $8,
                city = $9,
                zip = $10,
                region = $11,
                country = $12,
                tax_type = $13,
                tax_number = $14,
                board_item_id = $15,
                ledger_contact_id = $16,
                updated_at = $17
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(row.status)
        .bind(&row.vendor_type)
        .bind(&row.payment_details)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(&row.address_line_1)
        .bind(&row.address_line_2)
        .bind(&row.city)
        .bind(&row.zip)
        .bind(&row.region)
        .bind(&row.country)
        .bind(&row.tax_type)
        .bind(&row.tax_number)
        .bind(&row.board_item_id)
        .bind(&row.ledger_contact_id)
        .bind(row.updated_at)
        .fetch_one(&mut **tx)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> UpsertContact {
        UpsertContact {
            name: "Acme Films".to_string(),
            email: Some("ap@acmefilms.example".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn new_rows_default_to_pending() {
        let contact = Contact::new(&acme());
        assert_eq!(contact.status, ContactStatus::Pending);
        assert!(contact.board_item_id.is_none());
    }

    #[test]
    fn apply_merges_non_empty_fields_only() {
        let mut contact = Contact::new(&acme());

        let changed = contact.apply(&UpsertContact {
            name: "Acme Films".to_string(),
            phone: Some("555-0100".to_string()),
            email: Some(String::new()),
            ..Default::default()
        });

        assert!(changed);
        assert_eq!(contact.phone.as_deref(), Some("555-0100"));
        // blank email must not blank the stored one
        assert_eq!(contact.email.as_deref(), Some("ap@acmefilms.example"));
    }

    #[test]
    fn apply_reports_unchanged_for_identical_input() {
        let mut contact = Contact::new(&acme());
        assert!(!contact.apply(&acme()));
    }

    #[test]
    fn external_ids_are_write_once() {
        let mut contact = Contact::new(&acme());

        let changed = contact.apply(&UpsertContact {
            name: "Acme Films".to_string(),
            board_item_id: Some("b-100".to_string()),
            ..Default::default()
        });
        assert!(changed);
        assert_eq!(contact.board_item_id.as_deref(), Some("b-100"));

        let changed = contact.apply(&UpsertContact {
            name: "Acme Films".to_string(),
            board_item_id: Some("b-999".to_string()),
            ..Default::default()
        });
        assert!(!changed);
        assert_eq!(contact.board_item_id.as_deref(), Some("b-100"));
    }

    #[test]
    fn status_follows_the_batch() {
        let mut contact = Contact::new(&acme());
        let changed = contact.apply(&UpsertContact {
            name: "Acme Films".to_string(),
            status: Some(ContactStatus::Approved),
            ..Default::default()
        });
        assert!(changed);
        assert_eq!(contact.status, ContactStatus::Approved);
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&ContactStatus::ToVerify).unwrap();
        assert_eq!(json, "\"TO_VERIFY\"");
    }
}
