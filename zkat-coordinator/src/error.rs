//! Coordinator error taxonomy.
//!
//! Selection and validation errors surface immediately with no side effect.
//! Engine errors arrive here only after the retry executor exhausted its
//! budget. [`CoordinatorError::StateUpdate`] and
//! [`CoordinatorError::ShieldingIncomplete`] mark recoverable partial
//! completion: the chain moved, local state has not caught up.

use thiserror::Error;
use zkat_common::{CommitmentId, IdentifierError, PrecisionError, TokenId};
use zkat_engine::EngineError;
use zkat_store::StoreError;

use crate::locks::LockConflict;
use crate::retry::RetryError;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("commitment not found: {0}")]
    NotFound(String),

    #[error("at least two active commitments are required")]
    InsufficientCommitments,

    #[error("no two adjacent commitments cover amount {amount}")]
    NoCombinationSatisfiesAmount { amount: u64 },

    #[error("selected commitments hold {available}, not enough to send {amount}")]
    InsufficientBalance { amount: u64, available: u64 },

    #[error(transparent)]
    Locked(#[from] LockConflict),

    /// A selected input was nullified by a concurrent operation between the
    /// selection snapshot and the spend lock.
    #[error("commitment {0} was spent by a concurrent operation")]
    SpentInput(CommitmentId),

    #[error(transparent)]
    Engine(#[from] RetryError<EngineError>),

    /// The engine call settled on-chain but the follow-up store writes
    /// exhausted their retries; reconciliation has to close the gap.
    #[error("{operation} settled on-chain (tx {tx_hash}) but the state update failed: {source}")]
    StateUpdate {
        operation: &'static str,
        tx_hash: String,
        #[source]
        source: RetryError<StoreError>,
    },

    /// Public token registration landed but the private shield mint failed;
    /// the token exists unshielded and the mint can be resumed.
    #[error("token {token_id} registered publicly (tx {registration_tx}) but shielding failed: {source}")]
    ShieldingIncomplete {
        token_id: TokenId,
        registration_tx: String,
        #[source]
        source: RetryError<EngineError>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Precision(#[from] PrecisionError),
}

impl From<IdentifierError> for CoordinatorError {
    fn from(err: IdentifierError) -> Self {
        CoordinatorError::InvalidArgument(err.to_string())
    }
}

impl CoordinatorError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoordinatorError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CoordinatorError::NotFound(_) => "NOT_FOUND",
            CoordinatorError::InsufficientCommitments => "INSUFFICIENT_COMMITMENTS",
            CoordinatorError::NoCombinationSatisfiesAmount { .. } => "NO_PAIR_FOR_AMOUNT",
            CoordinatorError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            CoordinatorError::Locked(_) => "COMMITMENT_LOCKED",
            CoordinatorError::SpentInput(_) => "INPUT_SPENT",
            CoordinatorError::Engine(_) => "ENGINE_ERROR",
            CoordinatorError::StateUpdate { .. } => "STATE_UPDATE_FAILED",
            CoordinatorError::ShieldingIncomplete { .. } => "SHIELDING_INCOMPLETE",
            CoordinatorError::Store(err) => err.error_code(),
            CoordinatorError::Precision(_) => "PRECISION",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CoordinatorError::Locked(_) => true,
            CoordinatorError::Engine(err) => {
                err.inner().map_or(true, EngineError::is_retryable)
            }
            // Local state lags the chain; the patch sequence is idempotent
            // and can be re-driven.
            CoordinatorError::StateUpdate { .. } => true,
            CoordinatorError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}
