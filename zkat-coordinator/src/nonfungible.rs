//! Unique-asset commitment coordinator.
//!
//! Same shape as the fungible coordinator with `token_id` in place of a
//! value and no change output: transfer has exactly one input and one
//! output. Minting is two-phase — public metadata registration, then the
//! private shield mint — and a phase-two failure after a settled phase one
//! surfaces as a recoverable partial state, never a silent total failure.
//!
//! Identifier, key, and address arguments arrive as raw strings and are
//! validated for fixed-width hex shape before the engine is contacted; a
//! malformed argument fails fast with `InvalidArgument`.

use std::sync::Arc;

use tracing::{debug, error, info};
use zkat_chain::TxReceipt;
use zkat_common::{Address, CommitmentId, CoreConfig, Salt, TokenId, ZkpPublicKey, ZkpSecretKey};
use zkat_engine::{ContractRefs, ProofEngine};
use zkat_store::{
    NonFungibleCommitment, NonFungibleFilter, NonFungiblePatch, NonFungibleStore, Sort, StoreError,
};

use crate::error::CoordinatorError;
use crate::locks::SpendGuard;
use crate::notify::{dispatch, CommitmentDelivery, Notifier};
use crate::retry::{persist_settled, RetryExecutor};

#[derive(Debug)]
pub struct NonFungibleMintResult {
    pub record: NonFungibleCommitment,
    pub registration: TxReceipt,
    pub receipt: TxReceipt,
}

#[derive(Debug)]
pub struct NonFungibleTransferResult {
    /// Descriptor of the receiver's new commitment; also pushed through the
    /// notifier when a route was supplied.
    pub delivery: CommitmentDelivery,
    pub receipt: TxReceipt,
}

#[derive(Debug)]
pub struct NonFungibleBurnResult {
    pub record: NonFungibleCommitment,
    pub receipt: TxReceipt,
}

pub struct NonFungibleCommitmentCoordinator {
    store: Arc<dyn NonFungibleStore>,
    engine: Arc<dyn ProofEngine>,
    retry: RetryExecutor,
    locks: Arc<SpendGuard>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl NonFungibleCommitmentCoordinator {
    pub fn new(
        store: Arc<dyn NonFungibleStore>,
        engine: Arc<dyn ProofEngine>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            store,
            engine,
            retry: RetryExecutor::new(config.retry),
            locks: SpendGuard::new(),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Share a spend-lock registry with another coordinator instance.
    pub fn with_locks(mut self, locks: Arc<SpendGuard>) -> Self {
        self.locks = locks;
        self
    }

    /// Mint a commitment for a unique asset. Two-phase: the asset metadata is
    /// first registered on the public (non-shielded) token contract, then
    /// shielded by the private mint. A fresh token id is drawn when none is
    /// supplied.
    pub async fn mint(
        &self,
        token_id: Option<&str>,
        uri: &str,
        secret_key: &str,
        refs: &ContractRefs,
    ) -> Result<NonFungibleMintResult, CoordinatorError> {
        let secret = ZkpSecretKey::parse(secret_key)?;
        let owner = secret.public_key();
        let token_id = match token_id {
            Some(raw) => TokenId::parse(raw)?,
            None => TokenId::random(),
        };
        let salt = Salt::random();

        let registration = self
            .retry
            .execute("public token registration", || {
                self.engine.register_non_fungible(&token_id, uri, refs)
            })
            .await?;
        debug!(token = %token_id, tx_hash = %registration.tx_hash, "public token registered");

        let outcome = match self
            .retry
            .execute("non-fungible shield mint", || {
                self.engine.mint_non_fungible(&token_id, &owner, &salt, refs)
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(source) => {
                error!(
                    token = %token_id,
                    registration_tx = %registration.tx_hash,
                    "shield mint failed after settled public registration"
                );
                return Err(CoordinatorError::ShieldingIncomplete {
                    token_id,
                    registration_tx: registration.tx_hash,
                    source,
                });
            }
        };

        let record = NonFungibleCommitment::minted(
            outcome.commitment,
            token_id,
            salt,
            outcome.commitment_index,
        );
        let stored = persist_settled(
            &self.retry,
            "non-fungible mint",
            &outcome.receipt.tx_hash,
            || self.store.insert(record.clone()),
        )
        .await?;
        info!(commitment = %stored.id, token = %token_id, "non-fungible commitment minted");
        Ok(NonFungibleMintResult {
            record: stored,
            registration,
            receipt: outcome.receipt,
        })
    }

    /// Privately transfer the asset to the holder of `receiver_public_key`.
    /// One input, one output; the old commitment is nullified and the new
    /// descriptor is delivered through the notifier when a route is given.
    pub async fn transfer(
        &self,
        token_id: &str,
        receiver_public_key: &str,
        sender_secret_key: &str,
        refs: &ContractRefs,
        receiver_route: Option<&str>,
    ) -> Result<NonFungibleTransferResult, CoordinatorError> {
        let token = TokenId::parse(token_id)?;
        let receiver = ZkpPublicKey::parse(receiver_public_key)?;
        let sender = ZkpSecretKey::parse(sender_secret_key)?;
        let output_salt = Salt::random();

        let existing = self.find_token(&token).await?;
        let _lock = self.locks.acquire(&[existing.id])?;
        let existing = self.refresh_active(existing.id).await?;

        let outcome = self
            .retry
            .execute("non-fungible transfer", || {
                self.engine.transfer_non_fungible(
                    &token,
                    &receiver,
                    &existing.salt,
                    &output_salt,
                    &sender,
                    &existing.id,
                    existing.commitment_index,
                    refs,
                )
            })
            .await?;

        let patch = NonFungiblePatch::transferred();
        persist_settled(
            &self.retry,
            "non-fungible transfer",
            &outcome.receipt.tx_hash,
            || self.store.update(&existing.id, &patch),
        )
        .await?;

        let delivery = CommitmentDelivery {
            commitment: outcome.output_commitment,
            commitment_index: outcome.output_index,
            salt: output_salt,
            value: None,
            token_id: Some(token),
        };
        match (receiver_route, &self.notifier) {
            (Some(route), Some(notifier)) => {
                dispatch(notifier, route, delivery.clone());
            }
            (Some(route), None) => {
                info!(route, "no notifier configured; returning descriptor only");
            }
            (None, _) => {
                info!(commitment = %delivery.commitment, "no receiver route; returning descriptor only");
            }
        }
        info!(token = %token, nullified = %existing.id, "non-fungible transfer settled");
        Ok(NonFungibleTransferResult {
            delivery,
            receipt: outcome.receipt,
        })
    }

    /// Burn the asset's commitment, releasing the public token to
    /// `token_receiver` (the submitting account when absent).
    pub async fn burn(
        &self,
        token_id: &str,
        owner_secret_key: &str,
        token_receiver: Option<&str>,
        refs: &ContractRefs,
    ) -> Result<NonFungibleBurnResult, CoordinatorError> {
        let token = TokenId::parse(token_id)?;
        let owner = ZkpSecretKey::parse(owner_secret_key)?;
        let token_receiver = match token_receiver {
            Some(raw) => Address::parse(raw)?,
            None => refs.account,
        };

        let existing = self.find_token(&token).await?;
        let _lock = self.locks.acquire(&[existing.id])?;
        let existing = self.refresh_active(existing.id).await?;

        let outcome = self
            .retry
            .execute("non-fungible burn", || {
                self.engine.burn_non_fungible(
                    &token,
                    &owner,
                    &existing.salt,
                    &existing.id,
                    existing.commitment_index,
                    refs,
                    &token_receiver,
                )
            })
            .await?;

        let patch = NonFungiblePatch::burned();
        persist_settled(
            &self.retry,
            "non-fungible burn",
            &outcome.receipt.tx_hash,
            || self.store.update(&existing.id, &patch),
        )
        .await?;
        let mut burned = existing;
        zkat_store::StoredCommitment::apply(&mut burned, &patch);
        info!(token = %token, commitment = %burned.id, "non-fungible commitment burned");
        Ok(NonFungibleBurnResult {
            record: burned,
            receipt: outcome.receipt,
        })
    }

    /// Persist a commitment delivered by a counterparty's transfer.
    pub async fn register_received(
        &self,
        delivery: &CommitmentDelivery,
    ) -> Result<NonFungibleCommitment, CoordinatorError> {
        let token_id = delivery.token_id.ok_or_else(|| {
            CoordinatorError::InvalidArgument("received delivery carries no token id".into())
        })?;
        let record = NonFungibleCommitment::received(
            delivery.commitment,
            token_id,
            delivery.salt,
            delivery.commitment_index,
        );
        let stored = self.store.insert(record).await?;
        info!(commitment = %stored.id, token = %token_id, "received commitment registered");
        Ok(stored)
    }

    pub async fn list(&self) -> Result<Vec<NonFungibleCommitment>, CoordinatorError> {
        Ok(self
            .store
            .list(&NonFungibleFilter::default(), Sort::IndexAscending)
            .await?)
    }

    async fn find_token(&self, token: &TokenId) -> Result<NonFungibleCommitment, CoordinatorError> {
        self.store.find_by_token_id(token).await.map_err(|err| match err {
            StoreError::NotFound(missing) => CoordinatorError::NotFound(missing),
            other => CoordinatorError::Store(other),
        })
    }

    async fn refresh_active(
        &self,
        id: CommitmentId,
    ) -> Result<NonFungibleCommitment, CoordinatorError> {
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
