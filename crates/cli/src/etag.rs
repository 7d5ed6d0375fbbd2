use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 over the compact JSON of a committed store dump.
///
/// The dump is a `BTreeMap`, so keys serialize in sorted order and equal
/// ledger states always hash the same.
pub fn compute_etag(state: &BTreeMap<String, Value>) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_string(state)?;
    let hash = Sha256::digest(canonical.as_bytes());
    Ok(format!("{:x}", hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn etag_ignores_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("token/0".to_string(), json!({"owner": "b"}));
        a.insert("animal/0".to_string(), json!({"id": 0}));
        let mut b = BTreeMap::new();
        b.insert("animal/0".to_string(), json!({"id": 0}));
        b.insert("token/0".to_string(), json!({"owner": "b"}));
        assert_eq!(compute_etag(&a).unwrap(), compute_etag(&b).unwrap());
        assert_eq!(compute_etag(&a).unwrap().len(), 64);
    }

    #[test]
    fn etag_tracks_values() {
        let mut a = BTreeMap::new();
        a.insert("k".to_string(), json!(1));
        let before = compute_etag(&a).unwrap();
        a.insert("k".to_string(), json!(2));
        assert_ne!(before, compute_etag(&a).unwrap());
    }
}
