//! Request and outcome shapes crossing the engine boundary.

use serde::{Deserialize, Serialize};
use zkat_chain::TxReceipt;
use zkat_common::{Address, CommitmentId, Salt};

/// Contract references every operation needs: the shield contract verifying
/// proofs, the public token contract it escrows, and the submitting account.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRefs {
    pub shield_contract: Address,
    pub token_contract: Address,
    pub account: Address,
}

/// Opening of an existing commitment consumed as a transfer input.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FungibleInput {
    pub raw_value: u64,
    pub salt: Salt,
    pub commitment: CommitmentId,
    pub commitment_index: u64,
}

/// Value and blinding factor of a commitment to be created.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FungibleOutput {
    pub raw_value: u64,
    pub salt: Salt,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FungibleMintOutcome {
    pub commitment: CommitmentId,
    pub commitment_index: u64,
    pub receipt: TxReceipt,
}

/// Outcome of a 2-in/2-out transfer; index 0 is the receiver output, index 1
/// the sender change.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FungibleTransferOutcome {
    pub output_commitments: [CommitmentId; 2],
    pub output_indices: [u64; 2],
    pub receipt: TxReceipt,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonFungibleMintOutcome {
    pub commitment: CommitmentId,
    pub commitment_index: u64,
    pub receipt: TxReceipt,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonFungibleTransferOutcome {
    pub output_commitment: CommitmentId,
    pub output_index: u64,
    pub receipt: TxReceipt,
}

/// Burn produces no output commitment, only the settlement receipt.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnOutcome {
    pub receipt: TxReceipt,
}
