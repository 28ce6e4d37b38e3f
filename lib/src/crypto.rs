//! Hash and address primitives for the verification core.
//!
//! Every tree node, leaf commitment, and account address is a plain 32-byte
//! value. Tree hashing uses Keccak-256 throughout, and values travel as
//! fixed-length hex strings in JSON payloads.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

/// Hash length in bytes (Keccak-256 output).
pub const HASH_LENGTH: usize = 32;

/// Account address length in bytes.
pub const PUBKEY_LENGTH: usize = 32;

/// Failed to parse a 32-byte value from its hex representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected a 32-byte hex string, got {0:?}")]
pub struct ParseHexError(pub String);

fn decode_32(s: &str) -> Result<[u8; 32], ParseHexError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|_| ParseHexError(s.to_string()))?;
    bytes.try_into().map_err(|_| ParseHexError(s.to_string()))
}

/// A 32-byte Keccak-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; HASH_LENGTH]);

impl Hash {
    pub fn to_bytes(self) -> [u8; HASH_LENGTH] {
        self.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_LENGTH]> for Hash {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Hash(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_32(s).map(Hash)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A 32-byte account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pubkey(pub [u8; PUBKEY_LENGTH]);

impl Pubkey {
    pub fn to_bytes(self) -> [u8; PUBKEY_LENGTH] {
        self.0
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; PUBKEY_LENGTH]> for Pubkey {
    fn from(bytes: [u8; PUBKEY_LENGTH]) -> Self {
        Pubkey(bytes)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Pubkey {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_32(s).map(Pubkey)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Compute the Keccak-256 hash of input data.
///
/// # Arguments
/// * `input` - Input data to hash
///
/// # Returns
/// * Keccak-256 digest as a [`Hash`]
pub fn keccak256<T: AsRef<[u8]>>(input: T) -> Hash {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; HASH_LENGTH];

    hasher.update(input.as_ref());
    hasher.finalize(&mut output);

    Hash(output)
}

/// Compute the Keccak-256 hash of several byte slices, fed in order.
///
/// Equivalent to hashing the concatenation of all slices, without building
/// the intermediate buffer.
pub fn keccakv(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; HASH_LENGTH];

    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize(&mut output);

    Hash(output)
}

/// Combine two sibling nodes into their parent node hash.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    keccakv(&[&left.0, &right.0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_basic() {
        let hash = keccak256(b"test data");
        assert_ne!(hash, Hash::default());
    }

    #[test]
    fn test_keccak256_deterministic() {
        assert_eq!(keccak256(b"abc"), keccak256(b"abc"));
        assert_ne!(keccak256(b"abc"), keccak256(b"abd"));
    }

    #[test]
    fn test_keccakv_matches_concatenation() {
        let combined = keccak256(b"hello world");
        let split = keccakv(&[b"hello", b" ", b"world"]);
        assert_eq!(combined, split);
    }

    #[test]
    fn test_hash_pair_order_sensitive() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn test_hash_hex_round_trip() {
        let hash = keccak256(b"round trip");
        let parsed: Hash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn test_pubkey_accepts_0x_prefix() {
        let key = Pubkey([0x11; 32]);
        let with_prefix = format!("0x{}", key);
        assert_eq!(with_prefix.parse::<Pubkey>().unwrap(), key);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!("deadbeef".parse::<Hash>().is_err());
        assert!("".parse::<Pubkey>().is_err());
        assert!("zz".repeat(32).parse::<Hash>().is_err());
    }
}
