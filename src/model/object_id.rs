use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use crate::error::AppError;

/// A 12-byte document identifier, rendered externally as 24 lowercase hex characters.
///
/// Layout of generated ids: 4 bytes of big-endian unix seconds, 5 process-unique
/// random bytes, 3 bytes of a big-endian wrapping counter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

struct Generator {
    process_unique: [u8; 5],
    counter: AtomicU32,
}

fn generator() -> &'static Generator {
    static GENERATOR: OnceLock<Generator> = OnceLock::new();
    GENERATOR.get_or_init(|| {
        let seed = *uuid::Uuid::new_v4().as_bytes();
        let mut process_unique = [0u8; 5];
        process_unique.copy_from_slice(&seed[..5]);
        let start = u32::from_be_bytes([0, seed[5], seed[6], seed[7]]);
        Generator {
            process_unique,
            counter: AtomicU32::new(start),
        }
    })
}

impl ObjectId {
    pub const LEN: usize = 12;

    pub fn new() -> Self {
        let gen = generator();
        let seconds = chrono::Utc::now().timestamp() as u32;
        let count = gen.counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&gen.process_unique);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Build from a raw byte slice read back from the store.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AppError> {
        let array: [u8; 12] = bytes
            .try_into()
            .map_err(|_| AppError::InvalidIdentifier(hex::encode(bytes)))?;
        Ok(Self(array))
    }

    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Decode 24 hex characters, either case.
    pub fn parse_hex(text: &str) -> Result<Self, AppError> {
        if text.len() != Self::LEN * 2 {
            return Err(AppError::InvalidIdentifier(text.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|_| AppError::InvalidIdentifier(text.to_string()))?;
        Ok(Self(bytes))
    }

    /// Decode a list of identifiers, failing on the first malformed element.
    pub fn parse_list<S: AsRef<str>>(texts: &[S]) -> Result<Vec<Self>, AppError> {
        texts.iter().map(|t| Self::parse_hex(t.as_ref())).collect()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Seconds since the unix epoch encoded in the first four bytes.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse_hex(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_then_encode_is_lowercase_identity() {
        let samples = [
            "5f1d7a3b9c2e4d6f8a0b1c2d",
            "000000000000000000000000",
            "ffffffffffffffffffffffff",
            "ABCDEF0123456789abcdef01",
        ];
        for text in samples {
            let id = ObjectId::parse_hex(text).unwrap();
            assert_eq!(id.to_hex(), text.to_lowercase());
        }
    }

    #[test]
    fn test_rejects_wrong_length_and_non_hex() {
        let bad = [
            "",
            "5f1d7a3b9c2e4d6f8a0b1c2",
            "5f1d7a3b9c2e4d6f8a0b1c2d0",
            "5f1d7a3b9c2e4d6f8a0b1c2g",
            "zzzzzzzzzzzzzzzzzzzzzzzz",
            " 5f1d7a3b9c2e4d6f8a0b1c2d",
            "5f1d7a3b9c2e4d6f8a0b1c\u{e9}",
        ];
        for text in bad {
            assert!(
                matches!(ObjectId::parse_hex(text), Err(AppError::InvalidIdentifier(_))),
                "{:?} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_generated_ids_are_unique_and_valid() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_hex().len(), 24);
        assert_eq!(ObjectId::parse_hex(&a.to_hex()).unwrap(), a);

        let now = chrono::Utc::now().timestamp() as u32;
        assert!(now.abs_diff(a.timestamp()) <= 1);
    }

    #[test]
    fn test_parse_list_stops_at_first_bad_element() {
        let ok = ObjectId::parse_list(&["5f1d7a3b9c2e4d6f8a0b1c2d", "5f1d7a3b9c2e4d6f8a0b1c2e"]).unwrap();
        assert_eq!(ok.len(), 2);

        let err = ObjectId::parse_list(&["5f1d7a3b9c2e4d6f8a0b1c2d", "nope"]).unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(ref t) if t == "nope"));
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let id = ObjectId::parse_hex("5f1d7a3b9c2e4d6f8a0b1c2d").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"5f1d7a3b9c2e4d6f8a0b1c2d\"");
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ObjectId>("\"short\"").is_err());
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(ObjectId::from_slice(&[1u8; 12]).is_ok());
        assert!(ObjectId::from_slice(&[1u8; 11]).is_err());
    }
}
