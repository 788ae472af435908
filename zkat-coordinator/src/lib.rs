//! Commitment lifecycle coordinators.
//!
//! A coordinator receives a request, selects and validates commitments from
//! the store, builds the proof-engine input, drives the engine through the
//! retry executor over a freshly resolved chain connection, and then updates
//! store records — inputs nullified, outputs persisted. Per-commitment spend
//! locks make concurrent operations on the same commitment mutually
//! exclusive; everything after a settled engine call is an idempotent,
//! independently retried single-record patch, because the store offers no
//! cross-record transactions.

pub mod error;
pub mod fungible;
pub mod locks;
pub mod nonfungible;
pub mod notify;
pub mod retry;

pub use error::CoordinatorError;
pub use fungible::{
    FungibleBurnResult, FungibleCommitmentCoordinator, FungibleMintResult, FungibleTransferResult,
    TransferredCommitment,
};
pub use locks::{LockConflict, SpendGuard, SpendLock};
pub use nonfungible::{
    NonFungibleBurnResult, NonFungibleCommitmentCoordinator, NonFungibleMintResult,
    NonFungibleTransferResult,
};
pub use notify::{CommitmentDelivery, Notifier, NotifyError};
pub use retry::{RetryError, RetryExecutor, RetryFailure, Retryable};
