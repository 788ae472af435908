//! Execution-layer connectivity.
//!
//! The transport itself (RPC encoding, sockets, signing) is an external
//! collaborator consumed through the [`ChainTransport`] and
//! [`ChainConnection`] capability traits. This crate owns the part that is
//! easy to get wrong: a process-wide connection handle that is lazily
//! created, probed before reuse, and replaced wholesale under a bounded
//! backoff policy when the probe fails.

pub mod connection;
pub mod error;
pub mod resolver;

pub use connection::{
    ChainConnection, ChainTransport, CommitmentEvent, ContractCall, ShieldTransaction, TxReceipt,
};
pub use error::ChainError;
pub use resolver::ChainResolver;
