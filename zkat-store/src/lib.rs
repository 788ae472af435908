//! Commitment record store.
//!
//! Typed CRUD plus filtered queries over commitment documents. Two backends
//! sit behind the same capability trait: a mutexed in-memory map and a sled
//! tree holding JSON documents. The store offers no cross-record
//! transactions; callers express multi-record mutations as idempotent
//! single-record patches and recover from partial completion themselves.

pub mod error;
pub mod record;
pub mod store;

pub use error::StoreError;
pub use record::{
    FungibleCommitment, FungibleFilter, FungiblePatch, NonFungibleCommitment, NonFungibleFilter,
    NonFungiblePatch, Sort, StoredCommitment,
};
pub use store::{
    CommitmentStore, MemoryCommitmentStore, NonFungibleStore, SledCommitmentStore, TokenLookup,
};
