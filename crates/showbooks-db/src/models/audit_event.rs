//! Audit events: an append-only trail of reconciliation writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// The kind of write an audit event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_operation", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOperation {
    Insert,
    Update,
    Delete,
}

/// One recorded write.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub table_name: String,
    pub operation: AuditOperation,
    pub record_id: Uuid,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An event waiting to be appended.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub table_name: String,
    pub operation: AuditOperation,
    pub record_id: Uuid,
    pub message: Option<String>,
}

impl NewAuditEvent {
    #[must_use]
    pub fn insert(table_name: &str, record_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            table_name: table_name.to_string(),
            operation: AuditOperation::Insert,
            record_id,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn update(table_name: &str, record_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            table_name: table_name.to_string(),
            operation: AuditOperation::Update,
            record_id,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn delete(table_name: &str, record_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            table_name: table_name.to_string(),
            operation: AuditOperation::Delete,
            record_id,
            message: Some(message.into()),
        }
    }
}

impl AuditEvent {
    /// Build an in-memory event.
    #[must_use]
    pub fn new(data: &NewAuditEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            table_name: data.table_name.clone(),
            operation: data.operation,
            record_id: data.record_id,
            message: data.message.clone(),
            created_at: Utc::now(),
        }
    }

    /// Append one event to the trail.
    pub async fn append(pool: &PgPool, data: NewAuditEvent) -> Result<Self, sqlx::Error> {
        let event = AuditEvent::new(&data);
        sqlx::query_as(
            r"
            INSERT INTO audit_event (id, table_name, operation, record_id, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(event.id)
        .bind(&event.table_name)
        .bind(event.operation)
        .bind(event.record_id)
        .bind(&event.message)
        .bind(event.created_at)
        .fetch_one(pool)
        .await
    }

    /// List the most recent events, newest first.
    pub async fn list(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM audit_event
            ORDER BY created_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_pick_the_operation() {
        let id = Uuid::new_v4();
        assert_eq!(
            NewAuditEvent::insert("contact", id, "created").operation,
            AuditOperation::Insert
        );
        assert_eq!(
            NewAuditEvent::update("contact", id, "merged").operation,
            AuditOperation::Update
        );
        assert_eq!(
            NewAuditEvent::delete("contact", id, "removed").operation,
            AuditOperation::Delete
        );
    }

    #[test]
    fn operation_serializes_screaming() {
        let json = serde_json::to_string(&AuditOperation::Insert).unwrap();
        assert_eq!(json, "\"INSERT\"");
    }
}
