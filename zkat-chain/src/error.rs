//! Chain connectivity errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// The reconnect budget is exhausted; carries the final failure.
    #[error("chain connection unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("liveness probe failed: {0}")]
    Probe(String),

    /// The node accepted the request but rejected the transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

impl ChainError {
    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ChainError::Unavailable { .. } => "CONNECTION_UNAVAILABLE",
            ChainError::Transport(_) => "CHAIN_TRANSPORT",
            ChainError::Probe(_) => "CHAIN_PROBE",
            ChainError::Rejected(_) => "TX_REJECTED",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::Transport(_) | ChainError::Probe(_))
    }
}
