//! Serialization codec for cached values.
//!
//! Values are rendered as JSON and wrapped in padded base64, so the stored
//! payload is pure ASCII and can be split into chunks at any byte offset.
//! Types with a natural string form (timestamps, identifiers) go through
//! their serde string representation; decoding such a payload into a loose
//! type like `serde_json::Value` yields the string, not the original type.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

/// Encode a value into its storable text form.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let json = serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

/// Decode a payload previously produced by [`encode`].
///
/// Fails when the payload is not valid base64 (a corrupted or truncated
/// chunk concatenation) or when the JSON does not fit `T`.
pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, CodecError> {
    let json = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| CodecError::Decode(format!("invalid base64: {}", e)))?;
    serde_json::from_slice(&json).map_err(|e| CodecError::Decode(format!("invalid json: {}", e)))
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            (-1_000_000i64..1_000_000i64).prop_map(|n| Value::from(n as f64 / 8.0)),
            ".{0,24}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// decode(encode(v)) == v for every JSON-representable value
        #[test]
        fn prop_codec_roundtrip(value in arb_json()) {
            let encoded = encode(&value).unwrap();
            let decoded: Value = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, value);
        }

        /// Encoding is deterministic
        #[test]
        fn prop_encode_deterministic(value in arb_json()) {
            prop_assert_eq!(encode(&value).unwrap(), encode(&value).unwrap());
        }
    }
}
