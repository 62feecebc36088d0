//! # Canonical Hashing
//!
//! Deterministic content fingerprints for record payloads.
//!
//! Canonical form is JSON with stable key ordering: `serde_json` object
//! maps iterate in sorted key order (the `preserve_order` feature is not
//! enabled), so equal payloads serialize to identical bytes regardless of
//! how the caller assembled them.

use crate::domain::entities::RecordHash;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialize a payload to its canonical byte form.
pub fn canonical_bytes(data: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(data)
}

/// SHA-256 over the canonical serialization of `data`.
pub fn content_hash(data: &Value) -> Result<RecordHash, serde_json::Error> {
    let bytes = canonical_bytes(data)?;
    let digest = Sha256::digest(&bytes);
    Ok(RecordHash(digest.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_deterministic() {
        let a = json!({"name": "wheat", "quantity": 100});
        let b = json!({"quantity": 100, "name": "wheat"});

        // Key insertion order must not matter.
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_changes_with_payload() {
        let a = json!({"quantity": 100});
        let b = json!({"quantity": 101});
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_canonical_bytes_sorted_keys() {
        let v = json!({"zeta": 1, "alpha": 2});
        let bytes = canonical_bytes(&v).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"alpha":2,"zeta":1}"#);
    }
}
