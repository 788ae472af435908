//! Connection and transport capabilities, plus the receipt shapes the shield
//! contracts produce.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zkat_common::{Address, CommitmentId};

use crate::error::ChainError;

/// New-leaf announcement emitted by a shield contract when it appends a
/// commitment to the Merkle accumulator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentEvent {
    pub commitment: CommitmentId,
    pub leaf_index: u64,
}

/// Receipt of a settled transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    #[serde(default)]
    pub commitment_events: Vec<CommitmentEvent>,
}

/// Read-only contract invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    pub contract: Address,
    pub method: String,
    pub calldata: Vec<u8>,
}

/// State-changing shield-contract transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldTransaction {
    pub contract: Address,
    pub sender: Address,
    pub calldata: Vec<u8>,
}

/// A live handle to the execution layer. Handles are cheap to clone through
/// `Arc` but must not be cached across suspension points — the resolver may
/// swap the underlying handle at any probe failure, so every operation
/// re-resolves.
#[async_trait]
pub trait ChainConnection: Send + Sync + std::fmt::Debug {
    /// Liveness probe; returns the current block number.
    async fn probe(&self) -> Result<u64, ChainError>;

    async fn call(&self, call: &ContractCall) -> Result<Vec<u8>, ChainError>;

    async fn submit(&self, tx: &ShieldTransaction) -> Result<TxReceipt, ChainError>;
}

/// Factory for fresh connection handles.
#[async_trait]
pub trait ChainTransport: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ChainConnection>, ChainError>;
}
