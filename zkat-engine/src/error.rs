//! Engine error types.

use thiserror::Error;
use zkat_chain::ChainError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("proof request encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The transaction settled but its receipt did not carry the expected
    /// commitment events.
    #[error("shield receipt malformed: {0}")]
    MalformedReceipt(String),

    /// The engine refused the request outright (bad witness, spent input).
    #[error("proof request rejected: {0}")]
    Rejected(String),
}

impl EngineError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Encoding(_) => "PROOF_ENCODING",
            EngineError::Chain(err) => err.error_code(),
            EngineError::MalformedReceipt(_) => "RECEIPT_MALFORMED",
            EngineError::Rejected(_) => "PROOF_REJECTED",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Chain(err) => err.is_retryable(),
            EngineError::Encoding(_) | EngineError::MalformedReceipt(_) | EngineError::Rejected(_) => {
                false
            }
        }
    }
}
