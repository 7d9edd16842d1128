// hasher.rs — SHA-256 helpers for the audit chain.
//
// Hashes are lowercase hex SHA-256. Records hash the raw JSON line they were
// written as, and payloads (evaluation requests, decisions) are hashed from
// their compact JSON serialization.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Hash the compact JSON form of any serializable value.
pub fn hash_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(hash_bytes(&serde_json::to_vec(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_str("PT-AUTH-2026-001"), hash_str("PT-AUTH-2026-001"));
        assert_ne!(hash_str("allow"), hash_str("block"));
    }

    #[test]
    fn hash_known_value() {
        // SHA-256("") = e3b0c442...b855
        assert_eq!(
            hash_str(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash_json_matches_compact_serialization() {
        let value = serde_json::json!({"verdict": "block", "reasons": ["x"]});
        let compact = serde_json::to_string(&value).unwrap();
        assert_eq!(hash_json(&value).unwrap(), hash_str(&compact));
    }
}
