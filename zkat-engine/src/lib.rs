//! Proof engine boundary.
//!
//! The coordinators drive every mint/transfer/burn through the
//! [`ProofEngine`] capability and never learn which backend answered. Two
//! backends are behaviorally substitutable:
//!
//! - [`ShieldProofEngine`] submits proof transactions to the shield contracts
//!   through a freshly resolved chain connection and reads the resulting
//!   commitments out of the receipt.
//! - [`SimulatedProofEngine`] settles everything in-process with
//!   protocol-identical commitment hashes and deterministic receipts.
//!
//! The backend is chosen once, at construction, from configuration.

pub mod commitment;
pub mod error;
pub mod shield;
pub mod simulated;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use zkat_chain::{ChainResolver, TxReceipt};
use zkat_common::{Address, CommitmentId, ProofBackendKind, Salt, TokenId, ZkpPublicKey, ZkpSecretKey};

pub use error::EngineError;
pub use shield::ShieldProofEngine;
pub use simulated::SimulatedProofEngine;
pub use types::{
    BurnOutcome, ContractRefs, FungibleInput, FungibleMintOutcome, FungibleOutput,
    FungibleTransferOutcome, NonFungibleMintOutcome, NonFungibleTransferOutcome,
};

/// Zero-knowledge proof engine capability.
///
/// Each operation generates (or simulates) a proof and settles it, returning
/// the engine-assigned commitments and the transaction receipt. A failed call
/// must not be assumed side-effect free: the transaction may have landed
/// before the failure surfaced, and recognizing an already-settled request on
/// retry is this boundary's responsibility.
#[async_trait]
pub trait ProofEngine: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn mint_fungible(
        &self,
        raw_value: u64,
        owner: &ZkpPublicKey,
        salt: &Salt,
        refs: &ContractRefs,
    ) -> Result<FungibleMintOutcome, EngineError>;

    /// Fixed 2-in/2-out confidential transfer: output 0 goes to the receiver,
    /// output 1 is the sender's change.
    async fn transfer_fungible(
        &self,
        inputs: &[FungibleInput; 2],
        outputs: &[FungibleOutput; 2],
        receiver: &ZkpPublicKey,
        sender: &ZkpSecretKey,
        refs: &ContractRefs,
    ) -> Result<FungibleTransferOutcome, EngineError>;

    async fn burn_fungible(
        &self,
        raw_value: u64,
        owner: &ZkpSecretKey,
        salt: &Salt,
        commitment: &CommitmentId,
        commitment_index: u64,
        refs: &ContractRefs,
        token_receiver: &Address,
    ) -> Result<BurnOutcome, EngineError>;

    /// Public (non-shielded) registration of the asset metadata; phase one of
    /// the two-phase non-fungible mint.
    async fn register_non_fungible(
        &self,
        token_id: &TokenId,
        uri: &str,
        refs: &ContractRefs,
    ) -> Result<TxReceipt, EngineError>;

    async fn mint_non_fungible(
        &self,
        token_id: &TokenId,
        owner: &ZkpPublicKey,
        salt: &Salt,
        refs: &ContractRefs,
    ) -> Result<NonFungibleMintOutcome, EngineError>;

    async fn transfer_non_fungible(
        &self,
        token_id: &TokenId,
        receiver: &ZkpPublicKey,
        input_salt: &Salt,
        output_salt: &Salt,
        sender: &ZkpSecretKey,
        commitment: &CommitmentId,
        commitment_index: u64,
        refs: &ContractRefs,
    ) -> Result<NonFungibleTransferOutcome, EngineError>;

    async fn burn_non_fungible(
        &self,
        token_id: &TokenId,
        owner: &ZkpSecretKey,
        salt: &Salt,
        commitment: &CommitmentId,
        commitment_index: u64,
        refs: &ContractRefs,
        token_receiver: &Address,
    ) -> Result<BurnOutcome, EngineError>;
}

/// Construct the engine selected by configuration. Call sites hold only the
/// trait object; the backend choice is invisible past this point.
pub fn engine_from_config(
    backend: ProofBackendKind,
    resolver: Arc<ChainResolver>,
) -> Arc<dyn ProofEngine> {
    match backend {
        ProofBackendKind::Live => Arc::new(ShieldProofEngine::new(resolver)),
        ProofBackendKind::Simulated => Arc::new(SimulatedProofEngine::new()),
    }
}
