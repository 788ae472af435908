//! Fixed-width hex identifiers.
//!
//! Commitments, salts, token ids, and zkp keys are 32-byte values rendered as
//! 66-character `0x`-prefixed hex strings; chain addresses are 20 bytes (42
//! characters). Parsing is the validation boundary: a value of one of these
//! types is always well-formed.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Rejection of a malformed identifier string.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("{field} must be a 0x-prefixed hex string")]
    MissingPrefix { field: &'static str },

    #[error("{field} must be {expected} characters long including 0x, got {actual}")]
    BadLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} contains non-hex characters")]
    BadHex { field: &'static str },
}

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $bytes:literal, $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name([u8; $bytes]);

        impl $name {
            pub const BYTE_LEN: usize = $bytes;
            /// Rendered length including the `0x` prefix.
            pub const STR_LEN: usize = 2 + $bytes * 2;

            pub fn from_bytes(bytes: [u8; $bytes]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $bytes] {
                &self.0
            }

            /// Draw a fresh random value.
            pub fn random() -> Self {
                let mut bytes = [0u8; $bytes];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            pub fn parse(input: &str) -> Result<Self, IdentifierError> {
                let body = input
                    .strip_prefix("0x")
                    .ok_or(IdentifierError::MissingPrefix { field: $field })?;
                if input.len() != Self::STR_LEN {
                    return Err(IdentifierError::BadLength {
                        field: $field,
                        expected: Self::STR_LEN,
                        actual: input.len(),
                    });
                }
                let mut bytes = [0u8; $bytes];
                hex::decode_to_slice(body, &mut bytes)
                    .map_err(|_| IdentifierError::BadHex { field: $field })?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl FromStr for $name {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

hex_id!(
    /// Cryptographic commitment hash, assigned by the proof engine. Immutable
    /// once minted; never reused.
    CommitmentId, 32, "commitment"
);

hex_id!(
    /// Random blinding factor; required later to open or spend a commitment.
    Salt, 32, "salt"
);

hex_id!(
    /// Unique identifier of a non-fungible asset.
    TokenId, 32, "tokenId"
);

hex_id!(
    /// Public half of a zkp ownership key pair.
    ZkpPublicKey, 32, "publicKey"
);

hex_id!(
    /// Secret half of a zkp ownership key pair.
    ZkpSecretKey, 32, "secretKey"
);

hex_id!(
    /// Execution-layer account or contract address.
    Address, 20, "address"
);

impl ZkpSecretKey {
    /// Derive the owning public key as the one-way SHA-256 image of the
    /// secret key bytes.
    pub fn public_key(&self) -> ZkpPublicKey {
        let digest = Sha256::digest(self.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        ZkpPublicKey::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        let salt = Salt::random();
        let rendered = salt.to_string();
        assert_eq!(rendered.len(), Salt::STR_LEN);
        assert_eq!(Salt::parse(&rendered).unwrap(), salt);
    }

    #[test]
    fn rejects_missing_prefix() {
        let raw = "ab".repeat(32);
        assert_eq!(
            CommitmentId::parse(&raw),
            Err(IdentifierError::MissingPrefix {
                field: "commitment"
            })
        );
    }

    #[test]
    fn rejects_bad_length() {
        assert!(matches!(
            TokenId::parse("0x1234"),
            Err(IdentifierError::BadLength {
                field: "tokenId",
                expected: 66,
                actual: 6,
            })
        ));
        // Address is 20 bytes, not 32.
        let raw = format!("0x{}", "ab".repeat(32));
        assert!(matches!(
            Address::parse(&raw),
            Err(IdentifierError::BadLength { .. })
        ));
    }

    #[test]
    fn rejects_non_hex() {
        let raw = format!("0x{}", "zz".repeat(32));
        assert_eq!(
            Salt::parse(&raw),
            Err(IdentifierError::BadHex { field: "salt" })
        );
    }

    #[test]
    fn public_key_derivation_is_deterministic() {
        let secret = ZkpSecretKey::from_bytes([7u8; 32]);
        assert_eq!(secret.public_key(), secret.public_key());
        let other = ZkpSecretKey::from_bytes([8u8; 32]);
        assert_ne!(secret.public_key(), other.public_key());
    }

    #[test]
    fn serde_as_hex_string() {
        let id = CommitmentId::from_bytes([1u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "01".repeat(32)));
        let back: CommitmentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<CommitmentId>("\"0x12\"").is_err());
    }
}
