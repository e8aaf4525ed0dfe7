//! Cache key derivation.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::Result;

/// Compute a cache key from an operation name and its logical input.
///
/// The key has the form `"{operation}:{sha256-hex}"`. The input is first
/// converted to a [`serde_json::Value`], whose object map keeps keys sorted,
/// so two logically equal inputs hash identically regardless of the order
/// their fields were built in. The hash is stable across processes.
///
/// Fails only when `input` cannot be represented as JSON (e.g. a map with
/// non-string keys).
///
/// ```rust
/// # use muninn::cache_key;
/// # use serde_json::json;
/// let a = cache_key("lead_summary", &json!({"a": 1, "b": 2})).unwrap();
/// let b = cache_key("lead_summary", &json!({"b": 2, "a": 1})).unwrap();
/// assert_eq!(a, b);
/// assert!(a.starts_with("lead_summary:"));
/// ```
pub fn cache_key<T>(operation: &str, input: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let canonical = serde_json::to_value(input)?;
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    Ok(format!("{operation}:{digest:x}"))
}

/// Operation prefix of a key produced by [`cache_key`], used as a metric label.
pub(crate) fn operation_of(key: &str) -> &str {
    key.split_once(':').map_or(key, |(op, _)| op)
}
