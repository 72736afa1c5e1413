//! Content-addressed identifiers for desired resources.
//!
//! Two logically identical resources always hash to the same id, and any
//! field change yields a new one. Remote properties that cannot be updated in
//! place rely on this: a new id means the old remote resource must be replaced.
//!
//! Persisted ids are compared across controller restarts, so the derivation
//! must never change: `"id-" + lowercase-hex(SHA-256(canonical-json(obj)))`.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const ID_PREFIX: &str = "id-";

/// Hashes `obj` into a stable identifier.
///
/// Object keys are sorted recursively before encoding, so the id does not
/// depend on field declaration order or on how `serde_json` maps are backed.
pub fn id_from_hash<T>(obj: &T) -> Result<String, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let canonical = canonicalize(serde_json::to_value(obj)?);
    let bytes = serde_json::to_vec(&canonical)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{ID_PREFIX}{}", hex::encode(digest)))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries = map.into_iter().collect::<Vec<_>>();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        value => value,
    }
}
