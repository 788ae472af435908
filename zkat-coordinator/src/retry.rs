//! At-least-once retry for fallible, possibly slow operations.
//!
//! Cancelling (dropping) an in-flight execution only stops further attempts;
//! it cannot retract a transaction an earlier attempt already dispatched.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};
use zkat_common::RetryPolicy;
use zkat_engine::EngineError;
use zkat_store::StoreError;

use crate::error::CoordinatorError;

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Whether an error is worth another attempt. Implemented for every boundary
/// error the coordinators retry through.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for EngineError {
    fn is_retryable(&self) -> bool {
        EngineError::is_retryable(self)
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        StoreError::is_retryable(self)
    }
}

impl Retryable for zkat_chain::ChainError {
    fn is_retryable(&self) -> bool {
        zkat_chain::ChainError::is_retryable(self)
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug)]
pub enum RetryFailure<E> {
    Inner(E),
    TimedOut(Duration),
}

impl<E: fmt::Display> fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryFailure::Inner(err) => err.fmt(f),
            RetryFailure::TimedOut(limit) => write!(f, "attempt timed out after {limit:?}"),
        }
    }
}

/// Final failure of a retried operation, tagged with its label for
/// diagnostics.
#[derive(Debug, Error)]
#[error("{label} failed after {attempts} attempt(s): {failure}")]
pub struct RetryError<E: fmt::Debug + fmt::Display> {
    pub label: &'static str,
    pub attempts: u32,
    pub failure: RetryFailure<E>,
}

impl<E: fmt::Debug + fmt::Display> RetryError<E> {
    /// The underlying error, if the final attempt did not time out.
    pub fn inner(&self) -> Option<&E> {
        match &self.failure {
            RetryFailure::Inner(err) => Some(err),
            RetryFailure::TimedOut(_) => None,
        }
    }
}

/// Bounded retry with exponential backoff and a per-attempt timeout.
///
/// The executor does not interpret whether a failed attempt's side effects
/// were applied — recognizing an already-settled request belongs to the
/// proof-engine boundary. Non-retryable errors short-circuit immediately.
#[derive(Clone, Debug)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub async fn execute<T, E, F, Fut>(&self, label: &'static str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Debug + fmt::Display,
    {
        let attempts = self.policy.attempts.max(1);
        let mut failure = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                sleep(self.policy.delay_for(attempt - 1)).await;
            }
            match timeout(self.attempt_timeout, op()).await {
                Ok(Ok(value)) => {
                    if attempt > 0 {
                        debug!(label, attempt, "operation recovered after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(err)) => {
                    if !err.is_retryable() {
                        warn!(label, attempt, error = %err, "non-retryable failure");
                        return Err(RetryError {
                            label,
                            attempts: attempt + 1,
                            failure: RetryFailure::Inner(err),
                        });
                    }
                    warn!(label, attempt, error = %err, "attempt failed");
                    failure = Some(RetryFailure::Inner(err));
                }
                Err(_) => {
                    warn!(label, attempt, timeout = ?self.attempt_timeout, "attempt timed out");
                    failure = Some(RetryFailure::TimedOut(self.attempt_timeout));
                }
            }
        }
        let failure = failure.unwrap_or(RetryFailure::TimedOut(self.attempt_timeout));
        Err(RetryError {
            label,
            attempts,
            failure,
        })
    }
}

/// Retry a store write that follows a settled engine call. The engine is
/// never re-invoked from here: the transaction already landed, so exhaustion
/// surfaces a recoverable partial-completion error instead.
pub(crate) async fn persist_settled<T, F, Fut>(
    retry: &RetryExecutor,
    operation: &'static str,
    tx_hash: &str,
    op: F,
) -> Result<T, CoordinatorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    retry.execute(operation, op).await.map_err(|source| {
        error!(
            operation,
            tx_hash,
            error = %source,
            "store update failed after settled engine call; local state lags the chain"
        );
        CoordinatorError::StateUpdate {
            operation,
            tx_hash: tx_hash.to_string(),
            source,
        }
    })
}
