//! Deterministic in-process proof engine.
//!
//! Settles every operation against local state: protocol commitment hashes,
//! monotonic leaf indices, and a nullifier set guarding double spends.
//! Operations are keyed by their deterministic outcome, so re-invoking a
//! request that already settled replays the recorded outcome instead of
//! minting twice — the duplicate detection the retry layer relies on.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;
use zkat_chain::{CommitmentEvent, TxReceipt};
use zkat_common::{Address, CommitmentId, Salt, TokenId, ZkpPublicKey, ZkpSecretKey};

use crate::commitment::{fungible_commitment, non_fungible_commitment};
use crate::error::EngineError;
use crate::types::{
    BurnOutcome, ContractRefs, FungibleInput, FungibleMintOutcome, FungibleOutput,
    FungibleTransferOutcome, NonFungibleMintOutcome, NonFungibleTransferOutcome,
};
use crate::ProofEngine;

#[derive(Clone)]
enum Settled {
    FungibleMint(FungibleMintOutcome),
    FungibleTransfer(FungibleTransferOutcome),
    NonFungibleMint(NonFungibleMintOutcome),
    NonFungibleTransfer(NonFungibleTransferOutcome),
    Burn(BurnOutcome),
    Registration(TxReceipt),
}

#[derive(Default)]
struct SimState {
    next_leaf: u64,
    next_block: u64,
    nullified: HashSet<CommitmentId>,
    settled: HashMap<[u8; 32], Settled>,
}

impl SimState {
    fn leaf(&mut self) -> u64 {
        let index = self.next_leaf;
        self.next_leaf += 1;
        index
    }

    fn receipt(&mut self, key: &[u8; 32], events: Vec<CommitmentEvent>) -> TxReceipt {
        self.next_block += 1;
        TxReceipt {
            tx_hash: format!("0x{}", hex::encode(Sha256::digest(key))),
            block_number: self.next_block,
            commitment_events: events,
        }
    }
}

/// Operation key: domain tag plus the operation's distinguishing bytes.
fn op_key(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"zkat.sim.op");
    hasher.update(tag.as_bytes());
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

pub struct SimulatedProofEngine {
    state: Mutex<SimState>,
}

impl SimulatedProofEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
        }
    }
}

impl Default for SimulatedProofEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProofEngine for SimulatedProofEngine {
    fn backend_name(&self) -> &'static str {
        "simulated"
    }

    async fn mint_fungible(
        &self,
        raw_value: u64,
        owner: &ZkpPublicKey,
        salt: &Salt,
        _refs: &ContractRefs,
    ) -> Result<FungibleMintOutcome, EngineError> {
        let commitment = fungible_commitment(raw_value, owner, salt);
        let key = op_key("ft-mint", &[commitment.as_bytes()]);
        let mut state = self.state.lock().expect("simulated engine poisoned");
        if let Some(Settled::FungibleMint(outcome)) = state.settled.get(&key) {
            debug!(commitment = %commitment, "mint already settled, replaying outcome");
            return Ok(outcome.clone());
        }
        let commitment_index = state.leaf();
        let receipt = state.receipt(
            &key,
            vec![CommitmentEvent {
                commitment,
                leaf_index: commitment_index,
            }],
        );
        let outcome = FungibleMintOutcome {
            commitment,
            commitment_index,
            receipt,
        };
        state.settled.insert(key, Settled::FungibleMint(outcome.clone()));
        Ok(outcome)
    }

    async fn transfer_fungible(
        &self,
        inputs: &[FungibleInput; 2],
        outputs: &[FungibleOutput; 2],
        receiver: &ZkpPublicKey,
        sender: &ZkpSecretKey,
        _refs: &ContractRefs,
    ) -> Result<FungibleTransferOutcome, EngineError> {
        let sender_pk = sender.public_key();
        for input in inputs {
            let expected = fungible_commitment(input.raw_value, &sender_pk, &input.salt);
            if expected != input.commitment {
                return Err(EngineError::Rejected(format!(
                    "input opening does not match commitment {}",
                    input.commitment
                )));
            }
        }
        let in_sum = u128::from(inputs[0].raw_value) + u128::from(inputs[1].raw_value);
        let out_sum = u128::from(outputs[0].raw_value) + u128::from(outputs[1].raw_value);
        if in_sum != out_sum {
            return Err(EngineError::Rejected(format!(
                "value not conserved: inputs {in_sum}, outputs {out_sum}"
            )));
        }

        let send = fungible_commitment(outputs[0].raw_value, receiver, &outputs[0].salt);
        let change = fungible_commitment(outputs[1].raw_value, &sender_pk, &outputs[1].salt);
        let key = op_key("ft-transfer", &[send.as_bytes(), change.as_bytes()]);

        let mut state = self.state.lock().expect("simulated engine poisoned");
        if let Some(Settled::FungibleTransfer(outcome)) = state.settled.get(&key) {
            debug!(send = %send, "transfer already settled, replaying outcome");
            return Ok(outcome.clone());
        }
        for input in inputs {
            if state.nullified.contains(&input.commitment) {
                return Err(EngineError::Rejected(format!(
                    "input commitment {} already nullified",
                    input.commitment
                )));
            }
        }
        for input in inputs {
            state.nullified.insert(input.commitment);
        }
        let send_index = state.leaf();
        let change_index = state.leaf();
        let receipt = state.receipt(
            &key,
            vec![
                CommitmentEvent {
                    commitment: send,
                    leaf_index: send_index,
                },
                CommitmentEvent {
                    commitment: change,
                    leaf_index: change_index,
                },
            ],
        );
        let outcome = FungibleTransferOutcome {
            output_commitments: [send, change],
            output_indices: [send_index, change_index],
            receipt,
        };
        state
            .settled
            .insert(key, Settled::FungibleTransfer(outcome.clone()));
        Ok(outcome)
    }

    async fn burn_fungible(
        &self,
        raw_value: u64,
        owner: &ZkpSecretKey,
        salt: &Salt,
        commitment: &CommitmentId,
        _commitment_index: u64,
        _refs: &ContractRefs,
        _token_receiver: &Address,
    ) -> Result<BurnOutcome, EngineError> {
        let owner_pk = owner.public_key();
        let expected = fungible_commitment(raw_value, &owner_pk, salt);
        if expected != *commitment {
            return Err(EngineError::Rejected(format!(
                "burn opening does not match commitment {commitment}"
            )));
        }
        let key = op_key("ft-burn", &[commitment.as_bytes()]);
        let mut state = self.state.lock().expect("simulated engine poisoned");
        if let Some(Settled::Burn(outcome)) = state.settled.get(&key) {
            return Ok(outcome.clone());
        }
        if state.nullified.contains(commitment) {
            return Err(EngineError::Rejected(format!(
                "commitment {commitment} already nullified"
            )));
        }
        state.nullified.insert(*commitment);
        let receipt = state.receipt(&key, vec![]);
        let outcome = BurnOutcome { receipt };
        state.settled.insert(key, Settled::Burn(outcome.clone()));
        Ok(outcome)
    }

    async fn register_non_fungible(
        &self,
        token_id: &TokenId,
        uri: &str,
        _refs: &ContractRefs,
    ) -> Result<TxReceipt, EngineError> {
        let key = op_key("nft-register", &[token_id.as_bytes(), uri.as_bytes()]);
        let mut state = self.state.lock().expect("simulated engine poisoned");
        if let Some(Settled::Registration(receipt)) = state.settled.get(&key) {
            return Ok(receipt.clone());
        }
        let receipt = state.receipt(&key, vec![]);
        state
            .settled
            .insert(key, Settled::Registration(receipt.clone()));
        Ok(receipt)
    }

    async fn mint_non_fungible(
        &self,
        token_id: &TokenId,
        owner: &ZkpPublicKey,
        salt: &Salt,
        _refs: &ContractRefs,
    ) -> Result<NonFungibleMintOutcome, EngineError> {
        let commitment = non_fungible_commitment(token_id, owner, salt);
        let key = op_key("nft-mint", &[commitment.as_bytes()]);
        let mut state = self.state.lock().expect("simulated engine poisoned");
        if let Some(Settled::NonFungibleMint(outcome)) = state.settled.get(&key) {
            debug!(commitment = %commitment, "mint already settled, replaying outcome");
            return Ok(outcome.clone());
        }
        let commitment_index = state.leaf();
        let receipt = state.receipt(
            &key,
            vec![CommitmentEvent {
                commitment,
                leaf_index: commitment_index,
            }],
        );
        let outcome = NonFungibleMintOutcome {
            commitment,
            commitment_index,
            receipt,
        };
        state
            .settled
            .insert(key, Settled::NonFungibleMint(outcome.clone()));
        Ok(outcome)
    }

    async fn transfer_non_fungible(
        &self,
        token_id: &TokenId,
        receiver: &ZkpPublicKey,
        input_salt: &Salt,
        output_salt: &Salt,
        sender: &ZkpSecretKey,
        commitment: &CommitmentId,
        _commitment_index: u64,
        _refs: &ContractRefs,
    ) -> Result<NonFungibleTransferOutcome, EngineError> {
        let sender_pk = sender.public_key();
        let expected = non_fungible_commitment(token_id, &sender_pk, input_salt);
        if expected != *commitment {
            return Err(EngineError::Rejected(format!(
                "input opening does not match commitment {commitment}"
            )));
        }
        let output = non_fungible_commitment(token_id, receiver, output_salt);
        let key = op_key("nft-transfer", &[output.as_bytes()]);
        let mut state = self.state.lock().expect("simulated engine poisoned");
        if let Some(Settled::NonFungibleTransfer(outcome)) = state.settled.get(&key) {
            return Ok(outcome.clone());
        }
        if state.nullified.contains(commitment) {
            return Err(EngineError::Rejected(format!(
                "input commitment {commitment} already nullified"
            )));
        }
        state.nullified.insert(*commitment);
        let output_index = state.leaf();
        let receipt = state.receipt(
            &key,
            vec![CommitmentEvent {
                commitment: output,
                leaf_index: output_index,
            }],
        );
        let outcome = NonFungibleTransferOutcome {
            output_commitment: output,
            output_index,
            receipt,
        };
        state
            .settled
            .insert(key, Settled::NonFungibleTransfer(outcome.clone()));
        Ok(outcome)
    }

    async fn burn_non_fungible(
        &self,
        token_id: &TokenId,
        owner: &ZkpSecretKey,
        salt: &Salt,
        commitment: &CommitmentId,
        _commitment_index: u64,
        _refs: &ContractRefs,
        _token_receiver: &Address,
    ) -> Result<BurnOutcome, EngineError> {
        let owner_pk = owner.public_key();
        let expected = non_fungible_commitment(token_id, &owner_pk, salt);
        if expected != *commitment {
            return Err(EngineError::Rejected(format!(
                "burn opening does not match commitment {commitment}"
            )));
        }
        let key = op_key("nft-burn", &[commitment.as_bytes()]);
        let mut state = self.state.lock().expect("simulated engine poisoned");
        if let Some(Settled::Burn(outcome)) = state.settled.get(&key) {
            return Ok(outcome.clone());
        }
        if state.nullified.contains(commitment) {
            return Err(EngineError::Rejected(format!(
                "commitment {commitment} already nullified"
            )));
        }
        state.nullified.insert(*commitment);
        let receipt = state.receipt(&key, vec![]);
        let outcome = BurnOutcome { receipt };
        state.settled.insert(key, Settled::Burn(outcome.clone()));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs() -> ContractRefs {
        ContractRefs {
            shield_contract: Address::from_bytes([1u8; 20]),
            token_contract: Address::from_bytes([2u8; 20]),
            account: Address::from_bytes([3u8; 20]),
        }
    }

    fn keys() -> (ZkpSecretKey, ZkpPublicKey) {
        let secret = ZkpSecretKey::from_bytes([9u8; 32]);
        let public = secret.public_key();
        (secret, public)
    }

    #[tokio::test]
    async fn mint_assigns_monotonic_leaf_indices() {
        let engine = SimulatedProofEngine::new();
        let (_, owner) = keys();
        let a = engine
            .mint_fungible(100, &owner, &Salt::from_bytes([1u8; 32]), &refs())
            .await
            .unwrap();
        let b = engine
            .mint_fungible(200, &owner, &Salt::from_bytes([2u8; 32]), &refs())
            .await
            .unwrap();
        assert_eq!(a.commitment_index, 0);
        assert_eq!(b.commitment_index, 1);
        assert_ne!(a.commitment, b.commitment);
        assert_eq!(a.receipt.commitment_events.len(), 1);
    }

    #[tokio::test]
    async fn repeated_mint_replays_the_settled_outcome() {
        let engine = SimulatedProofEngine::new();
        let (_, owner) = keys();
        let salt = Salt::from_bytes([7u8; 32]);
        let first = engine.mint_fungible(100, &owner, &salt, &refs()).await.unwrap();
        let second = engine.mint_fungible(100, &owner, &salt, &refs()).await.unwrap();
        assert_eq!(first.commitment, second.commitment);
        assert_eq!(first.commitment_index, second.commitment_index);
        assert_eq!(first.receipt.tx_hash, second.receipt.tx_hash);
    }

    #[tokio::test]
    async fn transfer_nullifies_inputs_and_rejects_double_spend() {
        let engine = SimulatedProofEngine::new();
        let (secret, owner) = keys();
        let salt_a = Salt::from_bytes([1u8; 32]);
        let salt_b = Salt::from_bytes([2u8; 32]);
        let a = engine.mint_fungible(500, &owner, &salt_a, &refs()).await.unwrap();
        let b = engine.mint_fungible(900, &owner, &salt_b, &refs()).await.unwrap();

        let inputs = [
            FungibleInput {
                raw_value: 500,
                salt: salt_a,
                commitment: a.commitment,
                commitment_index: a.commitment_index,
            },
            FungibleInput {
                raw_value: 900,
                salt: salt_b,
                commitment: b.commitment,
                commitment_index: b.commitment_index,
            },
        ];
        let receiver = ZkpSecretKey::from_bytes([5u8; 32]).public_key();
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
            .transfer_fungible(&inputs, &outputs, &receiver, &secret, &refs())
            .await
            .unwrap();
        assert_eq!(outcome.receipt.commitment_events.len(), 2);

        // Spending the same inputs towards different outputs must fail.
        let outputs2 = [
            FungibleOutput {
                raw_value: 700,
                salt: Salt::from_bytes([5u8; 32]),
            },
            FungibleOutput {
                raw_value: 700,
                salt: Salt::from_bytes([6u8; 32]),
            },
        ];
        let err = engine
            .transfer_fungible(&inputs, &outputs2, &receiver, &secret, &refs())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Rejected(_)));
    }

    #[tokio::test]
    async fn transfer_replay_returns_one_logical_outcome() {
        let engine = SimulatedProofEngine::new();
        let (secret, owner) = keys();
        let salt_a = Salt::from_bytes([1u8; 32]);
        let salt_b = Salt::from_bytes([2u8; 32]);
        let a = engine.mint_fungible(500, &owner, &salt_a, &refs()).await.unwrap();
        let b = engine.mint_fungible(900, &owner, &salt_b, &refs()).await.unwrap();
        let inputs = [
            FungibleInput {
                raw_value: 500,
                salt: salt_a,
                commitment: a.commitment,
                commitment_index: a.commitment_index,
            },
            FungibleInput {
                raw_value: 900,
                salt: salt_b,
                commitment: b.commitment,
                commitment_index: b.commitment_index,
            },
        ];
        let receiver = ZkpSecretKey::from_bytes([5u8; 32]).public_key();
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
        let first = engine
            .transfer_fungible(&inputs, &outputs, &receiver, &secret, &refs())
            .await
            .unwrap();
        let second = engine
            .transfer_fungible(&inputs, &outputs, &receiver, &secret, &refs())
            .await
            .unwrap();
        assert_eq!(first.output_commitments, second.output_commitments);
        assert_eq!(first.output_indices, second.output_indices);
        assert_eq!(first.receipt.tx_hash, second.receipt.tx_hash);
    }

    #[tokio::test]
    async fn transfer_enforces_conservation_and_openings() {
        let engine = SimulatedProofEngine::new();
        let (secret, owner) = keys();
        let salt = Salt::from_bytes([1u8; 32]);
        let minted = engine.mint_fungible(500, &owner, &salt, &refs()).await.unwrap();
        let good_input = FungibleInput {
            raw_value: 500,
            salt,
            commitment: minted.commitment,
            commitment_index: minted.commitment_index,
        };
        let receiver = ZkpSecretKey::from_bytes([5u8; 32]).public_key();

        // Wrong opening value.
        let bad_inputs = [
            FungibleInput {
                raw_value: 400,
                ..good_input.clone()
            },
            good_input.clone(),
        ];
        let outputs = [
            FungibleOutput {
                raw_value: 450,
                salt: Salt::from_bytes([3u8; 32]),
            },
            FungibleOutput {
                raw_value: 450,
                salt: Salt::from_bytes([4u8; 32]),
            },
        ];
        assert!(matches!(
            engine
                .transfer_fungible(&bad_inputs, &outputs, &receiver, &secret, &refs())
                .await,
            Err(EngineError::Rejected(_))
        ));

        // Unbalanced outputs.
        let salt_b = Salt::from_bytes([2u8; 32]);
        let second = engine.mint_fungible(500, &owner, &salt_b, &refs()).await.unwrap();
        let inputs = [
            good_input,
            FungibleInput {
                raw_value: 500,
                salt: salt_b,
                commitment: second.commitment,
                commitment_index: second.commitment_index,
            },
        ];
        let unbalanced = [
            FungibleOutput {
                raw_value: 100,
                salt: Salt::from_bytes([3u8; 32]),
            },
            FungibleOutput {
                raw_value: 100,
                salt: Salt::from_bytes([4u8; 32]),
            },
        ];
        assert!(matches!(
            engine
                .transfer_fungible(&inputs, &unbalanced, &receiver, &secret, &refs())
                .await,
            Err(EngineError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn non_fungible_lifecycle() {
        let engine = SimulatedProofEngine::new();
        let (secret, owner) = keys();
        let token = TokenId::from_bytes([11u8; 32]);
        let salt = Salt::from_bytes([1u8; 32]);

        engine
            .register_non_fungible(&token, "ipfs://asset", &refs())
            .await
            .unwrap();
        let minted = engine
            .mint_non_fungible(&token, &owner, &salt, &refs())
            .await
            .unwrap();

        let out_salt = Salt::from_bytes([2u8; 32]);
        let receiver = ZkpSecretKey::from_bytes([5u8; 32]).public_key();
        let transferred = engine
            .transfer_non_fungible(
                &token,
                &receiver,
                &salt,
                &out_salt,
                &secret,
                &minted.commitment,
                minted.commitment_index,
                &refs(),
            )
            .await
            .unwrap();
        assert_ne!(transferred.output_commitment, minted.commitment);

        // The spent input cannot be transferred again.
        assert!(matches!(
            engine
                .transfer_non_fungible(
                    &token,
                    &receiver,
                    &salt,
                    &Salt::from_bytes([3u8; 32]),
                    &secret,
                    &minted.commitment,
                    minted.commitment_index,
                    &refs(),
                )
                .await,
            Err(EngineError::Rejected(_))
        ));
    }
}
