//! Content fingerprints for idempotent external sync.
//!
//! A record's outward-facing fields are serialized as canonical JSON (keys
//! sorted recursively, no whitespace) and hashed. The fingerprint is stored
//! next to the external id after each successful sync; a record whose current
//! fingerprint equals the stored one needs no external call at all.

use sha2::{Digest, Sha256};

/// Fingerprint a sync payload: SHA-256 over its canonical JSON form, as a
/// 64-character hex string.
#[must_use]
pub fn fingerprint(payload: &serde_json::Value) -> String {
    let canonical = canonicalize(payload).to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recursively sort object keys so serialization is order-independent.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: serde_json::Map<String, serde_json::Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn is_deterministic() {
        let payload = json!({"vendor": "Acme Films", "rate": "100.00"});
        assert_eq!(fingerprint(&payload), fingerprint(&payload));
    }

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn content_changes_the_fingerprint() {
        let a = json!({"quantity": "2.00"});
        let b = json!({"quantity": "3.00"});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn is_hex_encoded_sha256() {
        let fp = fingerprint(&json!({}));
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
