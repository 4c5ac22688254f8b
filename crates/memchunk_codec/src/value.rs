//! CBOR serialization of cached values.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value's `Serialize` implementation fails.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value from CBOR bytes.
///
/// The whole input must be consumed by exactly one value.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR, do not match `T`, or
/// carry trailing data.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let mut reader = bytes;
    let value = ciborium::de::from_reader(&mut reader)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: reader.len(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        roles: Vec<String>,
        visits: u64,
    }

    #[test]
    fn roundtrip_struct() {
        let session = Session {
            user: "alice".into(),
            roles: vec!["admin".into(), "ops".into()],
            visits: 42,
        };
        let bytes = to_bytes(&session).unwrap();
        let decoded: Session = from_bytes(&bytes).unwrap();
        assert_eq!(session, decoded);
    }

    #[test]
    fn roundtrip_map() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1i64);
        map.insert("b".to_string(), -2i64);
        let bytes = to_bytes(&map).unwrap();
        let decoded: BTreeMap<String, i64> = from_bytes(&bytes).unwrap();
        assert_eq!(map, decoded);
    }

    #[test]
    fn empty_value_is_not_empty_bytes() {
        let bytes = to_bytes("").unwrap();
        assert!(!bytes.is_empty());
        let decoded: String = from_bytes(&bytes).unwrap();
        assert_eq!(decoded, "");
    }

    #[test]
    fn empty_input_fails() {
        let result: CodecResult<String> = from_bytes(&[]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    #[test]
    fn garbage_fails() {
        let result: CodecResult<Session> = from_bytes(&[0xff, 0x00, 0x13]);
        assert!(result.is_err());
    }

    #[test]
    fn type_mismatch_fails() {
        let bytes = to_bytes(&"not a number").unwrap();
        let result: CodecResult<u64> = from_bytes(&bytes);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    #[test]
    fn trailing_bytes_fail() {
        let mut bytes = to_bytes(&7u8).unwrap();
        bytes.push(0x01);
        let result: CodecResult<u8> = from_bytes(&bytes);
        assert_eq!(result, Err(CodecError::TrailingBytes { remaining: 1 }));
    }
}
