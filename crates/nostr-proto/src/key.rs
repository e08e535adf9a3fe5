// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Public key

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Public key error
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Hex decode error
    Hex(hex::FromHexError),
    /// Secp256k1 error
    Secp256k1(secp256k1::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(e) => write!(f, "{e}"),
            Self::Secp256k1(e) => write!(f, "{e}"),
        }
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Self::Hex(e)
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self {
        Self::Secp256k1(e)
    }
}

/// Public key
///
/// x-only secp256k1 key, serialized as 32 bytes of lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(XOnlyPublicKey);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl PublicKey {
    /// Parse from hex
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let mut bytes: [u8; 32] = [0u8; 32];
        hex::decode_to_slice(hex, &mut bytes)?;
        Self::from_slice(&bytes)
    }

    /// Parse from bytes
    #[inline]
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        Ok(Self(XOnlyPublicKey::from_slice(slice)?))
    }

    /// Serialize to bytes
    #[inline]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.serialize()
    }

    /// Serialize to lowercase hex
    #[inline]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Get the inner x-only key
    #[inline]
    pub fn xonly(&self) -> &XOnlyPublicKey {
        &self.0
    }
}

impl From<XOnlyPublicKey> for PublicKey {
    fn from(inner: XOnlyPublicKey) -> Self {
        Self(inner)
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    #[inline]
    fn from_str(hex: &str) -> Result<Self, Self::Err> {
        Self::from_hex(hex)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex: String = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_hex_roundtrip() {
        let pk = PublicKey::from_hex(HEX).unwrap();
        assert_eq!(pk.to_string(), HEX);
        assert_eq!(serde_json::to_string(&pk).unwrap(), format!("\"{HEX}\""));
    }

    #[test]
    fn test_invalid_hex() {
        assert!(PublicKey::from_hex("abc").is_err());
        assert_eq!(
            PublicKey::from_hex(&"zz".repeat(32)).unwrap_err(),
            Error::Hex(hex::FromHexError::InvalidHexCharacter { c: 'z', index: 0 })
        );
    }

    #[test]
    fn test_invalid_key() {
        let res = PublicKey::from_slice(&[1u8; 31]);
        assert!(matches!(res.unwrap_err(), Error::Secp256k1(..)));
    }
}
