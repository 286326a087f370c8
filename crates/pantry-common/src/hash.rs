//! Content hashing for document deduplication
//!
//! Raw catalog payloads arrive as semi-structured JSON whose key order is not
//! stable across fetches. The fingerprint here serializes objects with
//! recursively sorted keys before hashing, so two payloads with the same
//! logical content always collide regardless of insertion order.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute a stable SHA-256 fingerprint for a JSON payload.
///
/// Deterministic and independent of object key order at every nesting level.
/// Array order is significant. Returns a 64-character lowercase hex digest.
pub fn content_hash(payload: &Value) -> String {
    let canonical = canonicalize(payload).to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Rebuild a value with all object keys in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut sorted = serde_json::Map::new();
            for (key, val) in entries {
                sorted.insert(key.clone(), canonicalize(val));
            }
            Value::Object(sorted)
        },
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_hex_digest() {
        let hash = content_hash(&json!({"code": "123", "name": "Test"}));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_independent_of_key_order() {
        let a: Value =
            serde_json::from_str(r#"{"code": "123", "name": "Test", "nova_group": 3}"#).unwrap();
        let b: Value =
            serde_json::from_str(r#"{"nova_group": 3, "code": "123", "name": "Test"}"#).unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_hash_independent_of_nested_key_order() {
        let a: Value = serde_json::from_str(
            r#"{"code": "1", "nutriments": {"fat_100g": 2.5, "salt_100g": 0.1}}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{"nutriments": {"salt_100g": 0.1, "fat_100g": 2.5}, "code": "1"}"#,
        )
        .unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_hash_differs_for_different_content() {
        let a = json!({"code": "123", "name": "Test"});
        let b = json!({"code": "123", "name": "Test 2"});
        let c = json!({"code": "124", "name": "Test"});
        assert_ne!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&c));
        assert_ne!(content_hash(&b), content_hash(&c));
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = json!({"categories_tags": ["en:snacks", "en:dairy"]});
        let b = json!({"categories_tags": ["en:dairy", "en:snacks"]});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let payload = json!({"code": "1234567890123", "completeness": 0.8});
        assert_eq!(content_hash(&payload), content_hash(&payload));
    }

    proptest! {
        #[test]
        fn prop_hash_ignores_insertion_order(entries in proptest::collection::vec(("[a-z]{1,8}", any::<i64>()), 1..8)) {
            let mut forward = serde_json::Map::new();
            for (key, val) in &entries {
                forward.insert(key.clone(), json!(val));
            }
            let mut reversed = serde_json::Map::new();
            for (key, val) in entries.iter().rev() {
                reversed.insert(key.clone(), json!(val));
            }
            prop_assert_eq!(
                content_hash(&Value::Object(forward)),
                content_hash(&Value::Object(reversed))
            );
        }
    }
}
