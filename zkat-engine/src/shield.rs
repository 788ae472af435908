//! Live shield-contract proof engine.
//!
//! Builds the proof request for each operation, submits it as a shield
//! transaction through a freshly resolved chain connection, and reads the
//! engine-assigned leaf positions back out of the receipt's commitment
//! events. Witness encoding and proof attachment are the transport
//! collaborator's concern; this adapter owns request construction and
//! receipt interpretation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zkat_chain::{ChainResolver, ShieldTransaction, TxReceipt};
use zkat_common::{Address, CommitmentId, Salt, TokenId, ZkpPublicKey, ZkpSecretKey};

use crate::commitment::{fungible_commitment, non_fungible_commitment};
use crate::error::EngineError;
use crate::types::{
    BurnOutcome, ContractRefs, FungibleInput, FungibleMintOutcome, FungibleOutput,
    FungibleTransferOutcome, NonFungibleMintOutcome, NonFungibleTransferOutcome,
};
use crate::ProofEngine;

/// Nullifier published on-chain when a commitment is spent; binds the owner
/// secret to the commitment without revealing either.
fn nullifier(secret: &ZkpSecretKey, commitment: &CommitmentId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"zkat.nullifier");
    hasher.update(secret.as_bytes());
    hasher.update(commitment.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Public side of a proof request, carried as shield-transaction calldata.
/// The private witness never leaves the prover.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub(crate) enum ProofRequest {
    #[serde(rename = "ft-mint")]
    FungibleMint {
        raw_value: u64,
        new_commitments: Vec<CommitmentId>,
    },
    #[serde(rename = "ft-transfer")]
    FungibleTransfer {
        nullifiers: Vec<String>,
        new_commitments: Vec<CommitmentId>,
    },
    #[serde(rename = "ft-burn")]
    FungibleBurn {
        raw_value: u64,
        nullifiers: Vec<String>,
        token_receiver: Address,
    },
    #[serde(rename = "nft-register")]
    NonFungibleRegister { token_id: TokenId, uri: String },
    #[serde(rename = "nft-mint")]
    NonFungibleMint {
        token_id: TokenId,
        new_commitments: Vec<CommitmentId>,
    },
    #[serde(rename = "nft-transfer")]
    NonFungibleTransfer {
        nullifiers: Vec<String>,
        new_commitments: Vec<CommitmentId>,
    },
    #[serde(rename = "nft-burn")]
    NonFungibleBurn {
        token_id: TokenId,
        nullifiers: Vec<String>,
        token_receiver: Address,
    },
}

pub struct ShieldProofEngine {
    resolver: Arc<ChainResolver>,
}

impl ShieldProofEngine {
    pub fn new(resolver: Arc<ChainResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve a fresh connection and submit; the handle is never cached
    /// across operations because the resolver may swap it on any probe
    /// failure.
    async fn submit(
        &self,
        contract: Address,
        sender: Address,
        request: &ProofRequest,
    ) -> Result<TxReceipt, EngineError> {
        let connection = self.resolver.resolve().await?;
        let tx = ShieldTransaction {
            contract,
            sender,
            calldata: serde_json::to_vec(request)?,
        };
        let receipt = connection.submit(&tx).await?;
        info!(tx_hash = %receipt.tx_hash, block = receipt.block_number, "shield transaction settled");
        Ok(receipt)
    }

    /// Find the leaf index the contract assigned to `commitment`.
    fn leaf_index(receipt: &TxReceipt, commitment: &CommitmentId) -> Result<u64, EngineError> {
        receipt
            .commitment_events
            .iter()
            .find(|event| event.commitment == *commitment)
            .map(|event| event.leaf_index)
            .ok_or_else(|| {
                EngineError::MalformedReceipt(format!(
                    "receipt {} carries no event for commitment {}",
                    receipt.tx_hash, commitment
                ))
            })
    }
}

#[async_trait]
impl ProofEngine for ShieldProofEngine {
    fn backend_name(&self) -> &'static str {
        "shield"
    }

    async fn mint_fungible(
        &self,
        raw_value: u64,
        owner: &ZkpPublicKey,
        salt: &Salt,
        refs: &ContractRefs,
    ) -> Result<FungibleMintOutcome, EngineError> {
        let commitment = fungible_commitment(raw_value, owner, salt);
        let request = ProofRequest::FungibleMint {
            raw_value,
            new_commitments: vec![commitment],
        };
        let receipt = self
            .submit(refs.shield_contract, refs.account, &request)
            .await?;
        let commitment_index = Self::leaf_index(&receipt, &commitment)?;
        debug!(commitment = %commitment, commitment_index, "fungible commitment minted");
        Ok(FungibleMintOutcome {
            commitment,
            commitment_index,
            receipt,
        })
    }

    async fn transfer_fungible(
        &self,
        inputs: &[FungibleInput; 2],
        outputs: &[FungibleOutput; 2],
        receiver: &ZkpPublicKey,
        sender: &ZkpSecretKey,
        refs: &ContractRefs,
    ) -> Result<FungibleTransferOutcome, EngineError> {
        let sender_pk = sender.public_key();
        let send = fungible_commitment(outputs[0].raw_value, receiver, &outputs[0].salt);
        let change = fungible_commitment(outputs[1].raw_value, &sender_pk, &outputs[1].salt);
        let request = ProofRequest::FungibleTransfer {
            nullifiers: inputs
                .iter()
                .map(|input| nullifier(sender, &input.commitment))
                .collect(),
            new_commitments: vec![send, change],
        };
        let receipt = self
            .submit(refs.shield_contract, refs.account, &request)
            .await?;
        let send_index = Self::leaf_index(&receipt, &send)?;
        let change_index = Self::leaf_index(&receipt, &change)?;
        Ok(FungibleTransferOutcome {
            output_commitments: [send, change],
            output_indices: [send_index, change_index],
            receipt,
        })
    }

    async fn burn_fungible(
        &self,
        raw_value: u64,
        owner: &ZkpSecretKey,
        _salt: &Salt,
        commitment: &CommitmentId,
        _commitment_index: u64,
        refs: &ContractRefs,
        token_receiver: &Address,
    ) -> Result<BurnOutcome, EngineError> {
        let request = ProofRequest::FungibleBurn {
            raw_value,
            nullifiers: vec![nullifier(owner, commitment)],
            token_receiver: *token_receiver,
        };
        let receipt = self
            .submit(refs.shield_contract, refs.account, &request)
            .await?;
        Ok(BurnOutcome { receipt })
    }

    async fn register_non_fungible(
        &self,
        token_id: &TokenId,
        uri: &str,
        refs: &ContractRefs,
    ) -> Result<TxReceipt, EngineError> {
        let request = ProofRequest::NonFungibleRegister {
            token_id: *token_id,
            uri: uri.to_string(),
        };
        // Registration is a plain token-contract call, not a shielded one.
        self.submit(refs.token_contract, refs.account, &request).await
    }

    async fn mint_non_fungible(
        &self,
        token_id: &TokenId,
        owner: &ZkpPublicKey,
        salt: &Salt,
        refs: &ContractRefs,
    ) -> Result<NonFungibleMintOutcome, EngineError> {
        let commitment = non_fungible_commitment(token_id, owner, salt);
        let request = ProofRequest::NonFungibleMint {
            token_id: *token_id,
            new_commitments: vec![commitment],
        };
        let receipt = self
            .submit(refs.shield_contract, refs.account, &request)
            .await?;
        let commitment_index = Self::leaf_index(&receipt, &commitment)?;
        Ok(NonFungibleMintOutcome {
            commitment,
            commitment_index,
            receipt,
        })
    }

    async fn transfer_non_fungible(
        &self,
        token_id: &TokenId,
        receiver: &ZkpPublicKey,
        _input_salt: &Salt,
        output_salt: &Salt,
        sender: &ZkpSecretKey,
        commitment: &CommitmentId,
        _commitment_index: u64,
        refs: &ContractRefs,
    ) -> Result<NonFungibleTransferOutcome, EngineError> {
        let output = non_fungible_commitment(token_id, receiver, output_salt);
        let request = ProofRequest::NonFungibleTransfer {
            nullifiers: vec![nullifier(sender, commitment)],
            new_commitments: vec![output],
        };
        let receipt = self
            .submit(refs.shield_contract, refs.account, &request)
            .await?;
        let output_index = Self::leaf_index(&receipt, &output)?;
        Ok(NonFungibleTransferOutcome {
            output_commitment: output,
            output_index,
            receipt,
        })
    }

    async fn burn_non_fungible(
        &self,
        token_id: &TokenId,
        owner: &ZkpSecretKey,
        _salt: &Salt,
        commitment: &CommitmentId,
        _commitment_index: u64,
        refs: &ContractRefs,
        token_receiver: &Address,
    ) -> Result<BurnOutcome, EngineError> {
        let request = ProofRequest::NonFungibleBurn {
            token_id: *token_id,
            nullifiers: vec![nullifier(owner, commitment)],
            token_receiver: *token_receiver,
        };
        let receipt = self
            .submit(refs.shield_contract, refs.account, &request)
            .await?;
        Ok(BurnOutcome { receipt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use zkat_chain::{ChainConnection, ChainError, ChainTransport, CommitmentEvent, ContractCall};
    use zkat_common::RetryPolicy;

    /// Chain stub that behaves like a shield contract: decodes the proof
    /// request and appends every declared commitment as a leaf.
    #[derive(Debug)]
    struct ShieldStub {
        next_leaf: AtomicU64,
        drop_events: bool,
    }

    #[async_trait]
    impl ChainConnection for ShieldStub {
        async fn probe(&self) -> Result<u64, ChainError> {
            Ok(1)
        }

        async fn call(&self, _call: &ContractCall) -> Result<Vec<u8>, ChainError> {
            Ok(vec![])
        }

        async fn submit(&self, tx: &ShieldTransaction) -> Result<TxReceipt, ChainError> {
            let request: ProofRequest = serde_json::from_slice(&tx.calldata)
                .map_err(|err| ChainError::Rejected(err.to_string()))?;
            let commitments = match &request {
                ProofRequest::FungibleMint { new_commitments, .. }
                | ProofRequest::FungibleTransfer { new_commitments, .. }
                | ProofRequest::NonFungibleMint { new_commitments, .. }
                | ProofRequest::NonFungibleTransfer { new_commitments, .. } => {
                    new_commitments.clone()
                }
                _ => vec![],
            };
            let commitment_events = if self.drop_events {
                vec![]
            } else {
                commitments
                    .into_iter()
                    .map(|commitment| CommitmentEvent {
                        commitment,
                        leaf_index: self.next_leaf.fetch_add(1, Ordering::SeqCst),
                    })
                    .collect()
            };
            Ok(TxReceipt {
                tx_hash: "0xfeed".into(),
                block_number: 7,
                commitment_events,
            })
        }
    }

    struct StubTransport {
        drop_events: bool,
    }

    #[async_trait]
    impl ChainTransport for StubTransport {
        async fn connect(&self) -> Result<Arc<dyn ChainConnection>, ChainError> {
            Ok(Arc::new(ShieldStub {
                next_leaf: AtomicU64::new(0),
                drop_events: self.drop_events,
            }))
        }
    }

    fn engine(drop_events: bool) -> ShieldProofEngine {
        let resolver = Arc::new(ChainResolver::new(
            Arc::new(StubTransport { drop_events }),
            RetryPolicy::default(),
        ));
        ShieldProofEngine::new(resolver)
    }

    fn refs() -> ContractRefs {
        ContractRefs {
            shield_contract: Address::from_bytes([1u8; 20]),
            token_contract: Address::from_bytes([2u8; 20]),
            account: Address::from_bytes([3u8; 20]),
        }
    }

    #[tokio::test]
    async fn mint_reads_the_leaf_index_from_the_receipt() {
        let engine = engine(false);
        let owner = ZkpSecretKey::from_bytes([9u8; 32]).public_key();
        let outcome = engine
            .mint_fungible(1_000, &owner, &Salt::from_bytes([1u8; 32]), &refs())
            .await
            .unwrap();
        assert_eq!(outcome.commitment_index, 0);
        assert_eq!(
            outcome.commitment,
            fungible_commitment(1_000, &owner, &Salt::from_bytes([1u8; 32]))
        );
    }

    #[tokio::test]
    async fn transfer_maps_both_outputs() {
        let engine = engine(false);
        let sender = ZkpSecretKey::from_bytes([9u8; 32]);
        let sender_pk = sender.public_key();
        let receiver = ZkpSecretKey::from_bytes([5u8; 32]).public_key();
        let inputs = [
            FungibleInput {
                raw_value: 500,
                salt: Salt::from_bytes([1u8; 32]),
                commitment: fungible_commitment(500, &sender_pk, &Salt::from_bytes([1u8; 32])),
                commitment_index: 0,
            },
            FungibleInput {
                raw_value: 900,
                salt: Salt::from_bytes([2u8; 32]),
                commitment: fungible_commitment(900, &sender_pk, &Salt::from_bytes([2u8; 32])),
                commitment_index: 1,
            },
        ];
        let outputs = [
            FungibleOutput {
                raw_value: 600,
                salt: Salt::from_bytes([3u8; 32]),
            },
            FungibleOutput {
                raw_value: 800,
                salt: Salt::from_bytes([4u8; 32]),
            },
        ];
        let outcome = engine
            .transfer_fungible(&inputs, &outputs, &receiver, &sender, &refs())
            .await
            .unwrap();
        assert_eq!(outcome.output_indices, [0, 1]);
        assert_ne!(outcome.output_commitments[0], outcome.output_commitments[1]);
    }

    #[tokio::test]
    async fn missing_commitment_events_are_a_malformed_receipt() {
        let engine = engine(true);
        let owner = ZkpSecretKey::from_bytes([9u8; 32]).public_key();
        let err = engine
            .mint_fungible(1_000, &owner, &Salt::from_bytes([1u8; 32]), &refs())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedReceipt(_)));
        assert_eq!(err.error_code(), "RECEIPT_MALFORMED");
    }
}
