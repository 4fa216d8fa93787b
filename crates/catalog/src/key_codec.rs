//! Encode/decode row keys to and from the textual term form stored in the
//! on-disk index (spec §4.1).

use fts_errors::{FtsError, Result};

use crate::model::{KeyKind, KeyValue};

/// Encode a key value to the string stored in the index's key field.
///
/// - `DbKey`/`Uuid` -> lowercase hex, exactly `2 * len(bytes)` characters.
/// - `IntId` -> base-10 decimal, optional leading `-`.
pub fn encode(value: &KeyValue) -> String {
    match value {
        KeyValue::DbKey(bytes) => hex::encode(bytes),
        KeyValue::Uuid(bytes) => hex::encode(bytes),
        KeyValue::IntId(n) => n.to_string(),
    }
}

/// Decode a string previously produced by [`encode`] back into a key value
/// of the given kind. Rejects odd-length hex, non-hex digits (aside from
/// case), and non-numeric integer strings with `malformed-key`.
pub fn decode(kind: KeyKind, text: &str) -> Result<KeyValue> {
    match kind {
        KeyKind::DbKey => Ok(KeyValue::DbKey(decode_hex(kind, text)?)),
        KeyKind::Uuid => {
            let bytes = decode_hex(kind, text)?;
            let arr: [u8; 16] = bytes
                .try_into()
                .map_err(|_| FtsError::malformed_key(kind.as_str(), text))?;
            Ok(KeyValue::Uuid(arr))
        },
        KeyKind::IntId => {
            let n: i64 = text
                .parse()
                .map_err(|_| FtsError::malformed_key(kind.as_str(), text))?;
            Ok(KeyValue::IntId(n))
        },
    }
}

fn decode_hex(kind: KeyKind, text: &str) -> Result<Vec<u8>> {
    if text.is_empty() || text.len() % 2 != 0 {
        return Err(FtsError::malformed_key(kind.as_str(), text));
    }
    hex::decode(text).map_err(|_| FtsError::malformed_key(kind.as_str(), text))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dbkey_round_trips() {
        let value = KeyValue::DbKey(vec![0x00, 0xAB, 0xFF, 0x10, 0x20, 0x30, 0x40, 0x50]);
        let encoded = encode(&value);
        assert_eq!(encoded.len(), 16);
        assert_eq!(encoded, encoded.to_lowercase());
        assert_eq!(decode(KeyKind::DbKey, &encoded).unwrap(), value);
    }

    #[test]
    fn uuid_round_trips() {
        let value = KeyValue::Uuid([1; 16]);
        let encoded = encode(&value);
        assert_eq!(encoded.len(), 32);
        assert_eq!(decode(KeyKind::Uuid, &encoded).unwrap(), value);
    }

    #[test]
    fn int_id_round_trips_including_negative() {
        for n in [0_i64, 42, -1, i64::MIN, i64::MAX] {
            let value = KeyValue::IntId(n);
            let encoded = encode(&value);
            assert_eq!(decode(KeyKind::IntId, &encoded).unwrap(), value);
        }
    }

    #[test]
    fn rejects_odd_length_hex() {
        assert!(decode(KeyKind::DbKey, "abc").is_err());
    }

    #[test]
    fn rejects_non_hex_digits() {
        assert!(decode(KeyKind::DbKey, "zz00").is_err());
    }

    #[test]
    fn rejects_empty_hex() {
        assert!(decode(KeyKind::DbKey, "").is_err());
    }

    #[test]
    fn uuid_rejects_wrong_length() {
        assert!(decode(KeyKind::Uuid, "aabb").is_err());
    }

    #[test]
    fn rejects_non_numeric_int() {
        assert!(decode(KeyKind::IntId, "12abc").is_err());
        assert!(decode(KeyKind::IntId, "").is_err());
    }

    #[test]
    fn hex_output_is_lowercase() {
        let value = KeyValue::Uuid([0xDE; 16]);
        assert_eq!(encode(&value), "de".repeat(16));
    }
}
