//! Store capability and its two backends.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use zkat_common::{CommitmentId, TokenId};

use crate::error::StoreError;
use crate::record::{NonFungibleCommitment, Sort, StoredCommitment};

/// Typed CRUD over one commitment record family. Reads are point-in-time
/// snapshots; there are no cross-record transactions.
#[async_trait]
pub trait CommitmentStore<R: StoredCommitment>: Send + Sync {
    /// Persist a new record; fails with [`StoreError::DuplicateId`] on id
    /// collision.
    async fn insert(&self, record: R) -> Result<R, StoreError>;

    async fn find_by_id(&self, id: &CommitmentId) -> Result<R, StoreError>;

    async fn list(&self, filter: &R::Filter, sort: Sort) -> Result<Vec<R>, StoreError>;

    async fn count(&self, filter: &R::Filter) -> Result<u64, StoreError>;

    /// Partial-field merge into an existing record; fails with
    /// [`StoreError::NotFound`] if absent.
    async fn update(&self, id: &CommitmentId, patch: &R::Patch) -> Result<(), StoreError>;
}

/// Secondary lookup by token id for the non-fungible record family.
#[async_trait]
pub trait TokenLookup: Send + Sync {
    async fn find_by_token_id(&self, token_id: &TokenId)
        -> Result<NonFungibleCommitment, StoreError>;
}

/// The full non-fungible store capability.
pub trait NonFungibleStore: CommitmentStore<NonFungibleCommitment> + TokenLookup {}

impl<T: CommitmentStore<NonFungibleCommitment> + TokenLookup> NonFungibleStore for T {}

fn sorted<R: StoredCommitment>(mut records: Vec<R>, sort: Sort) -> Vec<R> {
    if sort != Sort::Unsorted {
        records.sort_by_key(|record| record.sort_key(sort));
    }
    records
}

/// In-memory backend, for tests and the simulated deployment profile.
pub struct MemoryCommitmentStore<R> {
    records: Mutex<BTreeMap<CommitmentId, R>>,
}

impl<R> MemoryCommitmentStore<R> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<R> Default for MemoryCommitmentStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: StoredCommitment> CommitmentStore<R> for MemoryCommitmentStore<R> {
    async fn insert(&self, record: R) -> Result<R, StoreError> {
        let mut records = self.records.lock().expect("commitment store poisoned");
        let id = *record.id();
        if records.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: &CommitmentId) -> Result<R, StoreError> {
        let records = self.records.lock().expect("commitment store poisoned");
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self, filter: &R::Filter, sort: Sort) -> Result<Vec<R>, StoreError> {
        let records = self.records.lock().expect("commitment store poisoned");
        let matching = records
            .values()
            .filter(|record| record.matches(filter))
            .cloned()
            .collect();
        Ok(sorted(matching, sort))
    }

    async fn count(&self, filter: &R::Filter) -> Result<u64, StoreError> {
        let records = self.records.lock().expect("commitment store poisoned");
        Ok(records.values().filter(|record| record.matches(filter)).count() as u64)
    }

    async fn update(&self, id: &CommitmentId, patch: &R::Patch) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("commitment store poisoned");
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.apply(patch);
        Ok(())
    }
}

#[async_trait]
impl TokenLookup for MemoryCommitmentStore<NonFungibleCommitment> {
    async fn find_by_token_id(
        &self,
        token_id: &TokenId,
    ) -> Result<NonFungibleCommitment, StoreError> {
        let records = self.records.lock().expect("commitment store poisoned");
        records
            .values()
            .find(|record| record.token_id == *token_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(token_id.to_string()))
    }
}

/// Sled-backed persistent store; one tree per record family, JSON documents
/// keyed by the rendered commitment id.
pub struct SledCommitmentStore<R> {
    tree: sled::Tree,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoredCommitment> SledCommitmentStore<R> {
    /// Open this record family's tree inside an existing database.
    pub fn open(db: &sled::Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(R::TREE)?;
        Ok(Self {
            tree,
            _record: PhantomData,
        })
    }

    /// Open (creating if needed) a database at `path` and this record
    /// family's tree inside it.
    pub fn persistent(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        Self::open(&db)
    }

    fn decode(bytes: &[u8]) -> Result<R, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn scan(&self) -> Result<Vec<R>, StoreError> {
        let mut records = Vec::new();
        for entry in self.tree.iter() {
            let (_, bytes) = entry?;
            records.push(Self::decode(&bytes)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl<R: StoredCommitment> CommitmentStore<R> for SledCommitmentStore<R> {
    async fn insert(&self, record: R) -> Result<R, StoreError> {
        let id = *record.id();
        let key = id.to_string();
        let bytes = serde_json::to_vec(&record)?;
        let swap = self
            .tree
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes))?;
        if swap.is_err() {
            return Err(StoreError::DuplicateId(id));
        }
        debug!(commitment = %id, tree = R::TREE, "record inserted");
        Ok(record)
    }

    async fn find_by_id(&self, id: &CommitmentId) -> Result<R, StoreError> {
        let bytes = self
            .tree
            .get(id.to_string().as_bytes())?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Self::decode(&bytes)
    }

    async fn list(&self, filter: &R::Filter, sort: Sort) -> Result<Vec<R>, StoreError> {
        let matching = self
            .scan()?
            .into_iter()
            .filter(|record| record.matches(filter))
            .collect();
        Ok(sorted(matching, sort))
    }

    async fn count(&self, filter: &R::Filter) -> Result<u64, StoreError> {
        let mut total = 0u64;
        for record in self.scan()? {
            if record.matches(filter) {
                total += 1;
            }
        }
        Ok(total)
    }

    async fn update(&self, id: &CommitmentId, patch: &R::Patch) -> Result<(), StoreError> {
        let key = id.to_string();
        // Merge under compare-and-swap; concurrent patches to the same record
        // each re-read and re-apply.
        loop {
            let current = self
                .tree
                .get(key.as_bytes())?
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let mut record = Self::decode(&current)?;
            record.apply(patch);
            let next = serde_json::to_vec(&record)?;
            let swap = self.tree.compare_and_swap(
                key.as_bytes(),
                Some(current.as_ref()),
                Some(next),
            )?;
            if swap.is_ok() {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl TokenLookup for SledCommitmentStore<NonFungibleCommitment> {
    async fn find_by_token_id(
        &self,
        token_id: &TokenId,
    ) -> Result<NonFungibleCommitment, StoreError> {
        self.scan()?
            .into_iter()
            .find(|record| record.token_id == *token_id)
            .ok_or_else(|| StoreError::NotFound(token_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        FungibleCommitment, FungibleFilter, FungiblePatch, NonFungibleFilter, NonFungiblePatch,
    };
    use zkat_common::Salt;

    fn commitment(value: u64) -> FungibleCommitment {
        FungibleCommitment::minted(CommitmentId::random(), value, Salt::random(), value)
    }

    #[tokio::test]
    async fn memory_insert_rejects_duplicate_ids() {
        let store = MemoryCommitmentStore::new();
        let record = commitment(10);
        store.insert(record.clone()).await.unwrap();
        let err = store.insert(record).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(_)));
        assert_eq!(err.error_code(), "DUPLICATE_ID");
    }

    #[tokio::test]
    async fn memory_update_merges_and_reports_missing() {
        let store = MemoryCommitmentStore::new();
        let record = store.insert(commitment(10)).await.unwrap();
        store
            .update(&record.id, &FungiblePatch::transferred("to ACME".into()))
            .await
            .unwrap();
        let updated = store.find_by_id(&record.id).await.unwrap();
        assert!(updated.is_nullified && updated.is_transferred);
        assert_eq!(updated.transfer_audit.as_deref(), Some("to ACME"));
        assert_eq!(updated.value, 10);

        let missing = CommitmentId::random();
        assert!(matches!(
            store.update(&missing, &FungiblePatch::default()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn memory_list_filters_and_sorts_by_value() {
        let store = MemoryCommitmentStore::new();
        for value in [9u64, 2, 5] {
            store.insert(commitment(value)).await.unwrap();
        }
        let mut spent = commitment(1);
        spent.is_nullified = true;
        store.insert(spent).await.unwrap();

        let active = store
            .list(&FungibleFilter::active_spendable(), Sort::ValueAscending)
            .await
            .unwrap();
        let values: Vec<u64> = active.iter().map(|record| record.value).collect();
        assert_eq!(values, vec![2, 5, 9]);
        assert_eq!(
            store.count(&FungibleFilter::active_spendable()).await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn sled_roundtrip_and_duplicate_detection() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store: SledCommitmentStore<FungibleCommitment> =
            SledCommitmentStore::open(&db).unwrap();

        let record = store.insert(commitment(42)).await.unwrap();
        assert!(matches!(
            store.insert(record.clone()).await,
            Err(StoreError::DuplicateId(_))
        ));

        store
            .update(&record.id, &FungiblePatch::burned("by local".into()))
            .await
            .unwrap();
        let reloaded = store.find_by_id(&record.id).await.unwrap();
        assert!(reloaded.is_burned && reloaded.is_nullified);
        assert!(!reloaded.is_active());

        let active = store
            .list(&FungibleFilter::active(), Sort::ValueAscending)
            .await
            .unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn sled_token_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store: SledCommitmentStore<NonFungibleCommitment> =
            SledCommitmentStore::open(&db).unwrap();

        let token_id = TokenId::random();
        let record = NonFungibleCommitment::minted(
            CommitmentId::random(),
            token_id,
            Salt::random(),
            0,
        );
        store.insert(record.clone()).await.unwrap();

        let found = store.find_by_token_id(&token_id).await.unwrap();
        assert_eq!(found, record);
        assert!(matches!(
            store.find_by_token_id(&TokenId::random()).await,
            Err(StoreError::NotFound(_))
        ));

        store
            .update(&record.id, &NonFungiblePatch::transferred())
            .await
            .unwrap();
        let active = store
            .list(&NonFungibleFilter::active(), Sort::IndexAscending)
            .await
            .unwrap();
        assert!(active.is_empty());
    }
}
