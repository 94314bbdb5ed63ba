//! Cache key derivation.
//!
//! A key is the codec encoding of `{"func", "args", "kwargs"}`. Keyword
//! arguments live in a `BTreeMap`, so their insertion order never changes
//! the key. Keys longer than the store allows are cut and suffixed with a
//! SHA-256 digest of the full encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::codec;
use crate::error::CodecError;

/// Separator between a truncated key prefix and its digest.
const DIGEST_SEPARATOR: char = '~';

/// Length of the `~<sha256 hex>` suffix appended to truncated keys.
pub const DIGEST_SUFFIX_LEN: usize = 1 + 64;

/// Arguments of a memoized call, split the way callers think of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Build call arguments from any serializable value.
    ///
    /// Sequences (tuples, vectors) become positional arguments, maps and
    /// structs become keyword arguments, anything else is a single
    /// positional argument.
    pub fn from_serialize<A: Serialize + ?Sized>(args: &A) -> Result<Self, CodecError> {
        let value = serde_json::to_value(args).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(match value {
            Value::Array(items) => Self {
                positional: items,
                keyword: BTreeMap::new(),
            },
            Value::Object(map) => Self {
                positional: Vec::new(),
                keyword: map.into_iter().collect(),
            },
            other => Self {
                positional: vec![other],
                keyword: BTreeMap::new(),
            },
        })
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }
}

#[derive(Serialize)]
struct KeyEnvelope<'a> {
    func: &'a str,
    args: &'a [Value],
    kwargs: &'a BTreeMap<String, Value>,
}

/// Deterministic, size-bounded identifier of one memoized call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    operation: String,
    key: String,
}

impl CacheKey {
    /// Derive the key for `operation` called with `args`.
    ///
    /// The result never exceeds `max_key_bytes` bytes.
    pub fn derive(
        operation: &str,
        args: &CallArgs,
        max_key_bytes: usize,
    ) -> Result<Self, CodecError> {
        let envelope = KeyEnvelope {
            func: operation,
            args: &args.positional,
            kwargs: &args.keyword,
        };
        let full = codec::encode(&envelope)?;
        Ok(Self {
            operation: operation.to_string(),
            key: bound_key(full, max_key_bytes),
        })
    }

    /// The operation identifier embedded in this key.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Cut an encoded key down to `max_key_bytes`.
///
/// The encoding is base64, so any byte offset is a char boundary.
fn bound_key(full: String, max_key_bytes: usize) -> String {
    if full.len() <= max_key_bytes {
        return full;
    }

    let digest = hex::encode(Sha256::digest(full.as_bytes()));
    if max_key_bytes < DIGEST_SUFFIX_LEN {
        return digest[..max_key_bytes.min(digest.len())].to_string();
    }

    let keep = max_key_bytes - DIGEST_SUFFIX_LEN;
    let mut key = String::with_capacity(max_key_bytes);
    key.push_str(&full[..keep]);
    key.push(DIGEST_SEPARATOR);
    key.push_str(&digest);
    key
}
