//! Records and outcomes exchanged with the external services.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use showbooks_core::ExternalId;
use std::fmt;

/// Kind of record the board service manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardItemKind {
    /// Top-level board item; one per purchase order.
    Item,
    /// Nested subitem; one per detail line, under its purchase order's item.
    Subitem,
}

impl fmt::Display for BoardItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => write!(f, "item"),
            Self::Subitem => write!(f, "subitem"),
        }
    }
}

/// Kind of record the ledger service manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerRecordKind {
    /// An accounts-payable bill, keyed by its 3-segment reference number.
    Bill,
    /// One line of a bill, keyed by its 4-segment reference number.
    BillLine,
}

impl fmt::Display for LedgerRecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bill => write!(f, "bill"),
            Self::BillLine => write!(f, "bill_line"),
        }
    }
}

/// One record submitted for external upsert.
///
/// `fields` carries the column values exactly as the service expects them.
/// `key` is the record's natural-key/reference string; the services ignore it
/// but logs and failure summaries report it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRecord {
    pub key: String,
    pub name: String,
    /// Present when the record already exists remotely; the call is then an
    /// update of that id rather than a creation.
    pub external_id: Option<ExternalId>,
    /// Id of the remote parent (board item for a subitem, bill for a line).
    pub parent_external_id: Option<ExternalId>,
    pub fields: Value,
}

impl UpsertRecord {
    /// Record for a row that has never synced.
    pub fn create(key: impl Into<String>, name: impl Into<String>, fields: Value) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            external_id: None,
            parent_external_id: None,
            fields,
        }
    }

    /// Record for a row that already has a remote identity.
    pub fn update(
        key: impl Into<String>,
        name: impl Into<String>,
        external_id: ExternalId,
        fields: Value,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            external_id: Some(external_id),
            parent_external_id: None,
            fields,
        }
    }

    /// Attach the remote parent id.
    #[must_use]
    pub fn with_parent(mut self, parent: ExternalId) -> Self {
        self.parent_external_id = Some(parent);
        self
    }

    /// Whether this record would be a remote creation.
    #[must_use]
    pub fn is_create(&self) -> bool {
        self.external_id.is_none()
    }
}

/// Per-record result of a chunk call, positionally aligned with the chunk's
/// input records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// The service accepted the record and returned its id (newly assigned on
    /// creation, echoed back on update).
    Success { external_id: ExternalId },
    /// The service rejected this record; the rest of the chunk stands.
    Failure { reason: String },
}

impl RecordOutcome {
    pub fn success(external_id: impl Into<ExternalId>) -> Self {
        Self::Success {
            external_id: external_id.into(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_records_have_no_external_id() {
        let record = UpsertRecord::create("2417_05", "Acme Films", json!({"po_number": 5}));
        assert!(record.is_create());
        assert!(record.parent_external_id.is_none());
    }

    #[test]
    fn update_records_carry_their_id() {
        let record = UpsertRecord::update(
            "2417_05",
            "Acme Films",
            ExternalId::new("8001"),
            json!({"po_number": 5}),
        );
        assert!(!record.is_create());
        assert_eq!(record.external_id, Some(ExternalId::new("8001")));
    }

    #[test]
    fn with_parent_attaches_the_board_parent() {
        let record = UpsertRecord::create("2417_05_01_01", "day rate", json!({}))
            .with_parent(ExternalId::new("8001"));
        assert_eq!(record.parent_external_id, Some(ExternalId::new("8001")));
    }

    #[test]
    fn outcome_serialization_is_tagged() {
        let ok = RecordOutcome::success("123");
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json, json!({"result": "success", "external_id": "123"}));

        let failed = RecordOutcome::failure("column missing");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json, json!({"result": "failure", "reason": "column missing"}));
    }

    #[test]
    fn kinds_display_as_wire_names() {
        assert_eq!(BoardItemKind::Item.to_string(), "item");
        assert_eq!(BoardItemKind::Subitem.to_string(), "subitem");
        assert_eq!(LedgerRecordKind::Bill.to_string(), "bill");
        assert_eq!(LedgerRecordKind::BillLine.to_string(), "bill_line");
    }
}
