use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a JSON document with object keys in sorted order.
///
/// Advisory only: nothing verifies it later.
pub fn content_hash(data: &serde_json::Value) -> String {
    // `serde_json::Map` is a BTreeMap unless `preserve_order` is enabled.
    let canonical = data.to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_hash() {
        let a = json!({"site": "Sundarbans", "plots": 12});
        let b: serde_json::Value = serde_json::from_str(r#"{"plots":12,"site":"Sundarbans"}"#).unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
        assert_eq!(content_hash(&a).len(), 64);
        assert_ne!(content_hash(&a), content_hash(&json!({})));
    }
}
