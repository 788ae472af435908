//! Store error types.

use thiserror::Error;
use zkat_common::CommitmentId;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert collided with an existing commitment id. The engine is the sole
    /// id authority, so a collision signals an idempotence bug upstream and
    /// is always fatal to the operation.
    #[error("commitment {0} already exists")]
    DuplicateId(CommitmentId),

    #[error("commitment {0} not found")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::DuplicateId(_) => "DUPLICATE_ID",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::Backend(_) => "STORE_BACKEND",
            StoreError::Codec(_) => "STORE_CODEC",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
