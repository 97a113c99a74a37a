use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length of a binary object key in bytes.
pub const KEY_LEN: usize = 20;

/// Length of a hex-encoded object key in characters.
pub const HEX_KEY_LEN: usize = 40;

/// Content-addressed key of a git object (commit, tree, blob or tag).
///
/// An `ObjectKey` is the SHA-1 of an object's git encoding. The archive
/// stores keys in binary form, while callers usually pass and expect the
/// 40-character lowercase hex form; both are always derivable from each
/// other. Equality, ordering and hashing are by raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey([u8; KEY_LEN]);

impl ObjectKey {
    /// Create a key from a pre-computed hash.
    pub const fn from_hash(hash: [u8; KEY_LEN]) -> Self {
        Self(hash)
    }

    /// Accept either 20 raw bytes or 40 hex characters.
    ///
    /// Any other length is rejected, as is a 40-byte input that is not valid
    /// hex.
    pub fn from_input(input: &[u8]) -> Result<Self, TypeError> {
        match input.len() {
            KEY_LEN => Self::from_slice(input),
            HEX_KEY_LEN => {
                let text = std::str::from_utf8(input)
                    .map_err(|e| TypeError::InvalidHex(e.to_string()))?;
                Self::from_hex(text)
            }
            actual => Err(TypeError::InvalidLength { actual }),
        }
    }

    /// Create a key from exactly 20 raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| TypeError::InvalidLength { actual: bytes.len() })?;
        Ok(Self(arr))
    }

    /// Parse from a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != HEX_KEY_LEN {
            return Err(TypeError::InvalidLength { actual: s.len() });
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// The raw 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 7 characters, as git prints them).
    pub fn short_hex(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(7);
        s
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.short_hex())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; KEY_LEN]> for ObjectKey {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectKey> for [u8; KEY_LEN] {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

impl AsRef<[u8]> for ObjectKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SHA: &str = "05cf84081b63cda822ee407e688269b494a642de";

    #[test]
    fn hex_input_normalizes_to_binary() {
        let key = ObjectKey::from_input(SHA.as_bytes()).unwrap();
        assert_eq!(key.to_hex(), SHA);
        assert_eq!(key.as_bytes()[0], 0x05);
    }

    #[test]
    fn binary_input_normalizes_to_hex() {
        let raw = hex::decode(SHA).unwrap();
        let key = ObjectKey::from_input(&raw).unwrap();
        assert_eq!(key.to_hex(), SHA);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = ObjectKey::from_input(b"abc").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { actual: 3 });
    }

    #[test]
    fn non_hex_forty_bytes_is_rejected() {
        let input = "z".repeat(40);
        let err = ObjectKey::from_input(input.as_bytes()).unwrap_err();
        assert!(matches!(err, TypeError::InvalidHex(_)));
    }

    #[test]
    fn display_is_full_hex() {
        let key: ObjectKey = SHA.parse().unwrap();
        assert_eq!(format!("{key}"), SHA);
        assert_eq!(key.short_hex(), "05cf840");
    }

    #[test]
    fn serde_roundtrip() {
        let key: ObjectKey = SHA.parse().unwrap();
        let json = serde_json::to_string(&key).unwrap();
        let parsed: ObjectKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn ordering_follows_bytes() {
        let a = ObjectKey::from_hash([0; 20]);
        let b = ObjectKey::from_hash([1; 20]);
        assert!(a < b);
    }

    proptest! {
        #[test]
        fn hex_and_binary_forms_agree(bytes in proptest::array::uniform20(any::<u8>())) {
            let key = ObjectKey::from_hash(bytes);
            let from_hex = ObjectKey::from_input(key.to_hex().as_bytes()).unwrap();
            let from_raw = ObjectKey::from_input(&bytes).unwrap();
            prop_assert_eq!(from_hex, key);
            prop_assert_eq!(from_raw, key);
        }
    }
}
