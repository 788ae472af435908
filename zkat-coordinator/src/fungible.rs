//! Value-commitment coordinator: selection, mint, 2-in/2-out transfer with
//! change, whole-value burn.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zkat_chain::TxReceipt;
use zkat_common::{
    from_precision, to_precision, CommitmentId, CoreConfig, Salt, ZkpPublicKey, ZkpSecretKey,
};
use zkat_engine::{ContractRefs, FungibleInput, FungibleOutput, ProofEngine};
use zkat_store::{
    CommitmentStore, FungibleCommitment, FungibleFilter, FungiblePatch, Sort, StoreError,
    StoredCommitment,
};

use crate::error::CoordinatorError;
use crate::locks::SpendGuard;
use crate::retry::{persist_settled, RetryExecutor};

pub struct FungibleMintResult {
    pub record: FungibleCommitment,
    pub receipt: TxReceipt,
}

/// Send-side output descriptor, returned for external delivery to the
/// receiver; the value is decoded back from fixed precision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferredCommitment {
    pub commitment: CommitmentId,
    pub commitment_index: u64,
    pub value: u64,
    pub salt: Salt,
}

#[derive(Debug)]
pub struct FungibleTransferResult {
    pub transferred: TransferredCommitment,
    pub change: FungibleCommitment,
    pub nullified: [CommitmentId; 2],
    pub receipt: TxReceipt,
}

#[derive(Debug)]
pub struct FungibleBurnResult {
    pub record: FungibleCommitment,
    pub receipt: TxReceipt,
}

pub struct FungibleCommitmentCoordinator {
    store: Arc<dyn CommitmentStore<FungibleCommitment>>,
    engine: Arc<dyn ProofEngine>,
    retry: RetryExecutor,
    locks: Arc<SpendGuard>,
    decimal_precision: u64,
    entity_code: String,
}

impl FungibleCommitmentCoordinator {
    pub fn new(
        store: Arc<dyn CommitmentStore<FungibleCommitment>>,
        engine: Arc<dyn ProofEngine>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            store,
            engine,
            retry: RetryExecutor::new(config.retry),
            locks: SpendGuard::new(),
            decimal_precision: config.decimal_precision,
            entity_code: config.entity_code.clone(),
        }
    }

    /// Share a spend-lock registry with another coordinator instance.
    pub fn with_locks(mut self, locks: Arc<SpendGuard>) -> Self {
        self.locks = locks;
        self
    }

    /// Mint a new commitment for `amount` owned by the key holder.
    pub async fn mint(
        &self,
        amount: u64,
        secret_key: &ZkpSecretKey,
        refs: &ContractRefs,
    ) -> Result<FungibleMintResult, CoordinatorError> {
        let owner = secret_key.public_key();
        let salt = Salt::random();
        let raw_value = to_precision(amount, self.decimal_precision)?;
        let outcome = self
            .retry
            .execute("fungible mint", || {
                self.engine.mint_fungible(raw_value, &owner, &salt, refs)
            })
            .await?;
        let record = FungibleCommitment::minted(
            outcome.commitment,
            amount,
            salt,
            outcome.commitment_index,
        );
        let stored = persist_settled(&self.retry, "fungible mint", &outcome.receipt.tx_hash, || {
            self.store.insert(record.clone())
        })
        .await?;
        info!(commitment = %stored.id, amount, "fungible commitment minted");
        Ok(FungibleMintResult {
            record: stored,
            receipt: outcome.receipt,
        })
    }

    /// Pick two active, non-investor commitments covering `amount`.
    ///
    /// Candidates are ordered ascending by value and scanned pairwise; the
    /// scan keeps the *last* adjacent pair whose sum covers the amount. This
    /// adjacent-pair heuristic can skip a tighter non-adjacent fit — callers
    /// depend on its exact tie-breaking, so it stays as is.
    pub async fn select_pair_for_amount(
        &self,
        amount: u64,
    ) -> Result<(FungibleCommitment, FungibleCommitment), CoordinatorError> {
        let candidates = self
            .store
            .list(&FungibleFilter::active_spendable(), Sort::ValueAscending)
            .await?;
        if candidates.len() < 2 {
            return Err(CoordinatorError::InsufficientCommitments);
        }
        let mut selected = None;
        for position in 1..candidates.len() {
            let sum = u128::from(candidates[position - 1].value)
                + u128::from(candidates[position].value);
            if sum >= u128::from(amount) {
                selected = Some(position - 1);
            }
        }
        match selected {
            Some(position) => Ok((
                candidates[position].clone(),
                candidates[position + 1].clone(),
            )),
            None => Err(CoordinatorError::NoCombinationSatisfiesAmount { amount }),
        }
    }

    /// Confidentially transfer `amount` to the holder of
    /// `receiver_public_key`. Fixed 2-input/2-output: two inputs are consumed
    /// whole, the receiver output carries `amount`, and the remainder comes
    /// back to the sender as a change commitment.
    pub async fn transfer(
        &self,
        amount: u64,
        sender_secret_key: &ZkpSecretKey,
        receiver_public_key: &ZkpPublicKey,
        refs: &ContractRefs,
        to_entity: &str,
    ) -> Result<FungibleTransferResult, CoordinatorError> {
        let raw_amount = to_precision(amount, self.decimal_precision)?;
        let (first, second) = self.select_pair_for_amount(amount).await?;
        let _lock = self.locks.acquire(&[first.id, second.id])?;
        // The selection snapshot may predate a concurrent spend; re-read
        // both inputs under the lock.
        let first = self.refresh_active(first.id).await?;
        let second = self.refresh_active(second.id).await?;

        let raw_first = to_precision(first.value, self.decimal_precision)?;
        let raw_second = to_precision(second.value, self.decimal_precision)?;
        let change_raw = compute_change(raw_first, raw_second, raw_amount).ok_or(
            CoordinatorError::InsufficientBalance {
                amount,
                available: first.value.saturating_add(second.value),
            },
        )?;

        let inputs = [
            FungibleInput {
                raw_value: raw_first,
                salt: first.salt,
                commitment: first.id,
                commitment_index: first.commitment_index,
            },
            FungibleInput {
                raw_value: raw_second,
                salt: second.salt,
                commitment: second.id,
                commitment_index: second.commitment_index,
            },
        ];
        let outputs = [
            FungibleOutput {
                raw_value: raw_amount,
                salt: Salt::random(),
            },
            FungibleOutput {
                raw_value: change_raw,
                salt: Salt::random(),
            },
        ];
        debug!(
            input_a = %first.id,
            input_b = %second.id,
            amount,
            change = change_raw,
            "submitting fungible transfer"
        );
        let outcome = self
            .retry
            .execute("fungible transfer", || {
                self.engine.transfer_fungible(
                    &inputs,
                    &outputs,
                    receiver_public_key,
                    sender_secret_key,
                    refs,
                )
            })
            .await?;

        let tx_hash = outcome.receipt.tx_hash.clone();
        let audit = format!(
            "Transfer and nullified by {} to {}",
            self.entity_code, to_entity
        );
        let patch = FungiblePatch::transferred(audit);
        persist_settled(&self.retry, "fungible transfer", &tx_hash, || {
            self.store.update(&first.id, &patch)
        })
        .await?;
        persist_settled(&self.retry, "fungible transfer", &tx_hash, || {
            self.store.update(&second.id, &patch)
        })
        .await?;

        let change_record = FungibleCommitment::change(
            outcome.output_commitments[1],
            from_precision(change_raw, self.decimal_precision)?,
            outputs[1].salt,
            outcome.output_indices[1],
        );
        let change = persist_settled(&self.retry, "fungible transfer", &tx_hash, || {
            self.store.insert(change_record.clone())
        })
        .await?;

        let transferred = TransferredCommitment {
            commitment: outcome.output_commitments[0],
            commitment_index: outcome.output_indices[0],
            value: from_precision(raw_amount, self.decimal_precision)?,
            salt: outputs[0].salt,
        };
        info!(
            send = %transferred.commitment,
            change = %change.id,
            %tx_hash,
            "fungible transfer settled"
        );
        Ok(FungibleTransferResult {
            transferred,
            change,
            nullified: [first.id, second.id],
            receipt: outcome.receipt,
        })
    }

    /// Burn the named commitment. The commitment's entire value is consumed —
    /// there is no partial burn; callers needing an exact amount first
    /// isolate it via transfer.
    pub async fn burn(
        &self,
        id: &CommitmentId,
        owner_secret_key: &ZkpSecretKey,
        refs: &ContractRefs,
    ) -> Result<FungibleBurnResult, CoordinatorError> {
        let _lock = self.locks.acquire(&[*id])?;
        let record = self.refresh_active(*id).await?;
        let raw_value = to_precision(record.value, self.decimal_precision)?;
        let outcome = self
            .retry
            .execute("fungible burn", || {
                self.engine.burn_fungible(
                    raw_value,
                    owner_secret_key,
                    &record.salt,
                    &record.id,
                    record.commitment_index,
                    refs,
                    &refs.account,
                )
            })
            .await?;
        let patch = FungiblePatch::burned(format!("Burn and nullified by {}", self.entity_code));
        persist_settled(&self.retry, "fungible burn", &outcome.receipt.tx_hash, || {
            self.store.update(&record.id, &patch)
        })
        .await?;
        let mut burned = record;
        burned.apply(&patch);
        info!(commitment = %burned.id, value = burned.value, "fungible commitment burned");
        Ok(FungibleBurnResult {
            record: burned,
            receipt: outcome.receipt,
        })
    }

    pub async fn active_count(&self) -> Result<u64, CoordinatorError> {
        Ok(self.store.count(&FungibleFilter::active()).await?)
    }

    pub async fn list_active(&self) -> Result<Vec<FungibleCommitment>, CoordinatorError> {
        Ok(self
            .store
            .list(&FungibleFilter::active(), Sort::Unsorted)
            .await?)
    }

    pub async fn list_active_investor(&self) -> Result<Vec<FungibleCommitment>, CoordinatorError> {
        Ok(self
            .store
            .list(&FungibleFilter::active_investor(), Sort::Unsorted)
            .await?)
    }

    async fn refresh_active(
        &self,
        id: CommitmentId,
    ) -> Result<FungibleCommitment, CoordinatorError> {
        let record = self.store.find_by_id(&id).await.map_err(|err| match err {
            StoreError::NotFound(missing) => CoordinatorError::NotFound(missing),
            other => CoordinatorError::Store(other),
        })?;
        if !record.is_active() {
            return Err(CoordinatorError::SpentInput(id));
        }
        Ok(record)
    }
}

/// `inputs - amount`, or `None` when the inputs cannot cover the amount.
fn compute_change(raw_first: u64, raw_second: u64, raw_amount: u64) -> Option<u64> {
    let total = u128::from(raw_first) + u128::from(raw_second);
    let change = total.checked_sub(u128::from(raw_amount))?;
    u64::try_from(change).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_is_inputs_minus_amount() {
        assert_eq!(compute_change(500, 900, 600), Some(800));
        assert_eq!(compute_change(500, 900, 1_400), Some(0));
    }

    #[test]
    fn negative_change_is_rejected() {
        assert_eq!(compute_change(500, 900, 1_401), None);
        assert_eq!(compute_change(0, 0, 1), None);
    }
}
