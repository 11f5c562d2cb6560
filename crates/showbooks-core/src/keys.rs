//! Composite natural keys and the reference numbers derived from them.
//!
//! Every record in a PO log is identified by business-meaningful numbers, not
//! surrogate ids: a purchase order by (project, po), a detail line by
//! (project, po, detail, line), a ledger bill by (project, po, detail). The
//! `Display` impls produce the fixed-width, zero-padded reference numbers the
//! external ledger uses as idempotency keys, e.g. `0241_05_02`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error parsing a reference number back into a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// A reference must have 3 or 4 underscore-separated segments.
    #[error("reference '{reference}' has {segments} segments, expected 3 or 4")]
    SegmentCount { reference: String, segments: usize },

    /// Every segment must be a base-10 number.
    #[error("reference '{reference}' has non-numeric segment '{segment}'")]
    NonNumericSegment { reference: String, segment: String },
}

/// Natural key of a purchase order: project number plus per-project PO number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoKey {
    pub project_number: i32,
    pub po_number: i32,
}

impl PoKey {
    pub fn new(project_number: i32, po_number: i32) -> Self {
        Self {
            project_number,
            po_number,
        }
    }
}

impl fmt::Display for PoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}_{:02}", self.project_number, self.po_number)
    }
}

/// Natural key of a detail line: (project, po, detail, line).
///
/// `Display` renders the 4-segment reference number, e.g. `2417_05_01_02`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DetailKey {
    pub project_number: i32,
    pub po_number: i32,
    pub detail_number: i32,
    pub line_number: i32,
}

impl DetailKey {
    pub fn new(project_number: i32, po_number: i32, detail_number: i32, line_number: i32) -> Self {
        Self {
            project_number,
            po_number,
            detail_number,
            line_number,
        }
    }

    /// Key of the purchase order this line belongs to.
    #[must_use]
    pub fn po_key(&self) -> PoKey {
        PoKey::new(self.project_number, self.po_number)
    }

    /// Key of the ledger bill this line rolls up into.
    #[must_use]
    pub fn bill_key(&self) -> BillKey {
        BillKey::new(self.project_number, self.po_number, self.detail_number)
    }

    /// Parse a reference number back into a key.
    ///
    /// Accepts both the 3-segment bill form (`2417_05_01`, line defaults to 1)
    /// and the 4-segment line form (`2417_05_01_02`). Zero padding is not
    /// required on input.
    pub fn parse_reference(reference: &str) -> Result<Self, ReferenceError> {
        let segments: Vec<&str> = reference.split('_').collect();
        if segments.len() != 3 && segments.len() != 4 {
            return Err(ReferenceError::SegmentCount {
                reference: reference.to_string(),
                segments: segments.len(),
            });
        }

        let mut numbers = Vec::with_capacity(segments.len());
        for segment in &segments {
            let number: i32 =
                segment
                    .parse()
                    .map_err(|_| ReferenceError::NonNumericSegment {
                        reference: reference.to_string(),
                        segment: (*segment).to_string(),
                    })?;
            numbers.push(number);
        }

        Ok(Self {
            project_number: numbers[0],
            po_number: numbers[1],
            detail_number: numbers[2],
            line_number: if numbers.len() == 4 { numbers[3] } else { 1 },
        })
    }
}

impl fmt::Display for DetailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}_{:02}_{:02}_{:02}",
            self.project_number, self.po_number, self.detail_number, self.line_number
        )
    }
}

/// Grouping key of a ledger bill: every detail line sharing
/// (project, po, detail) rolls up into one bill.
///
/// `Display` renders the 3-segment reference number, e.g. `0241_05_02`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillKey {
    pub project_number: i32,
    pub po_number: i32,
    pub detail_number: i32,
}

impl BillKey {
    pub fn new(project_number: i32, po_number: i32, detail_number: i32) -> Self {
        Self {
            project_number,
            po_number,
            detail_number,
        }
    }

    /// Key of the purchase order this bill belongs to.
    #[must_use]
    pub fn po_key(&self) -> PoKey {
        PoKey::new(self.project_number, self.po_number)
    }

    /// Key of one line under this bill.
    #[must_use]
    pub fn line_key(&self, line_number: i32) -> DetailKey {
        DetailKey::new(
            self.project_number,
            self.po_number,
            self.detail_number,
            line_number,
        )
    }
}

impl From<DetailKey> for BillKey {
    fn from(key: DetailKey) -> Self {
        key.bill_key()
    }
}

impl fmt::Display for BillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}_{:02}_{:02}",
            self.project_number, self.po_number, self.detail_number
        )
    }
}
