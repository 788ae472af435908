//! Out-of-band delivery of new-commitment descriptors.
//!
//! Side-channel collaborator invoked after the authoritative state
//! transition. Delivery never gates the outcome of the operation that
//! produced the commitment; failures are logged and left to the sender to
//! re-send out of band.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use zkat_common::{CommitmentId, Salt, TokenId};

/// Everything a receiving party needs to take ownership of a commitment
/// created for them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentDelivery {
    pub commitment: CommitmentId,
    pub commitment_index: u64,
    pub salt: Salt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
}

#[derive(Debug, Error)]
#[error("delivery to {route} failed: {reason}")]
pub struct NotifyError {
    pub route: String,
    pub reason: String,
}

/// Message-delivery capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, route: &str, delivery: CommitmentDelivery) -> Result<(), NotifyError>;
}

/// Fire-and-forget dispatch; never awaited on the operation path.
pub(crate) fn dispatch(notifier: &Arc<dyn Notifier>, route: &str, delivery: CommitmentDelivery) {
    let notifier = Arc::clone(notifier);
    let route = route.to_string();
    tokio::spawn(async move {
        match notifier.deliver(&route, delivery).await {
            Ok(()) => debug!(%route, "commitment descriptor delivered"),
            Err(err) => warn!(%route, error = %err, "commitment delivery failed"),
        }
    });
}
