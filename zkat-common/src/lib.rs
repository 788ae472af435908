//! Shared types for the zkat confidential asset coordinator.
//!
//! Everything that crosses a crate boundary lives here: fixed-width hex
//! identifiers (commitments, salts, token ids, zkp keys, chain addresses),
//! fixed-precision amount scaling, and the runtime configuration that selects
//! the proof backend and retry behavior.

pub mod config;
pub mod ids;
pub mod precision;

pub use config::{CoreConfig, ProofBackendKind, RetryPolicy};
pub use ids::{Address, CommitmentId, IdentifierError, Salt, TokenId, ZkpPublicKey, ZkpSecretKey};
pub use precision::{from_precision, to_precision, PrecisionError};
