//! Process-wide connection handle with probe-and-reconnect.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use zkat_common::RetryPolicy;

use crate::connection::{ChainConnection, ChainTransport};
use crate::error::ChainError;

/// Owns the single shared connection handle. The handle is created lazily,
/// verified by a liveness probe on every [`ChainResolver::resolve`], and
/// replaced wholesale when the probe fails. Callers never see the slot, only
/// a probed `Arc<dyn ChainConnection>` valid for one operation.
pub struct ChainResolver {
    transport: Arc<dyn ChainTransport>,
    policy: RetryPolicy,
    handle: RwLock<Option<Arc<dyn ChainConnection>>>,
}

impl ChainResolver {
    pub fn new(transport: Arc<dyn ChainTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            handle: RwLock::new(None),
        }
    }

    /// Return a live connection, reconnecting under the backoff policy if the
    /// current handle is missing or fails its probe. Exhausting the budget
    /// fails with [`ChainError::Unavailable`].
    pub async fn resolve(&self) -> Result<Arc<dyn ChainConnection>, ChainError> {
        if let Some(connection) = self.current().await {
            match connection.probe().await {
                Ok(block_number) => {
                    debug!(block_number, "chain connection live");
                    return Ok(connection);
                }
                Err(err) => {
                    warn!(error = %err, "liveness probe failed, reconnecting");
                }
            }
        }

        let attempts = self.policy.attempts.max(1);
        let mut last = String::new();
        for attempt in 0..attempts {
            if attempt > 0 {
                sleep(self.policy.delay_for(attempt - 1)).await;
            }
            match self.reconnect().await {
                Ok(connection) => {
                    info!(attempt, "chain connection established");
                    return Ok(connection);
                }
                Err(err) => {
                    warn!(attempt, error = %err, "chain reconnect failed");
                    last = err.to_string();
                }
            }
        }
        Err(ChainError::Unavailable { attempts, last })
    }

    /// Drop the current handle and reconnect in the background. Intended for
    /// asynchronous transport error events; fire-and-forget, independent of
    /// any in-flight `resolve()`.
    pub fn invalidate(self: &Arc<Self>) {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            resolver.handle.write().await.take();
            match resolver.reconnect().await {
                Ok(_) => info!("chain connection re-established after invalidation"),
                Err(err) => warn!(error = %err, "background reconnect failed"),
            }
        });
    }

    async fn current(&self) -> Option<Arc<dyn ChainConnection>> {
        self.handle.read().await.clone()
    }

    /// Connect, probe, and publish the new handle.
    async fn reconnect(&self) -> Result<Arc<dyn ChainConnection>, ChainError> {
        let connection = self.transport.connect().await?;
        connection.probe().await?;
        *self.handle.write().await = Some(Arc::clone(&connection));
        Ok(connection)
    }
}
