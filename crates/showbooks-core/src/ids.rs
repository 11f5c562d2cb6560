//! Identifier assigned by an external service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the board or ledger service on first successful
/// creation of a record.
///
/// The value is opaque to this system and stored verbatim. Once a row carries
/// an external id it is never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Create an external id from the value returned by the service.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ExternalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ExternalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<ExternalId> for String {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_raw_value() {
        let id = ExternalId::new("8764213509");
        assert_eq!(id.to_string(), "8764213509");
        assert_eq!(id.as_str(), "8764213509");
    }

    #[test]
    fn serializes_transparently() {
        let id = ExternalId::new("inv-001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"inv-001\"");

        let back: ExternalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn converts_from_and_into_string() {
        let id = ExternalId::from("abc");
        let s: String = id.clone().into();
        assert_eq!(s, "abc");
        assert_eq!(id.into_string(), "abc");
    }
}
