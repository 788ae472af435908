//! Per-commitment spend locks.
//!
//! A commitment selected as a transfer or burn input is locked for the
//! duration of the engine call. The lock releases with no state change if the
//! call fails, and is converted into terminal nullification if it succeeds.
//! Without this, two concurrent transfers can select the same active
//! commitment and double-spend it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use zkat_common::CommitmentId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("commitment {0} is locked by a concurrent operation")]
pub struct LockConflict(pub CommitmentId);

/// Registry of commitments currently held as operation inputs.
#[derive(Debug, Default)]
pub struct SpendGuard {
    held: Mutex<HashSet<CommitmentId>>,
}

impl SpendGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acquire all of `ids` or none of them.
    pub fn acquire(self: &Arc<Self>, ids: &[CommitmentId]) -> Result<SpendLock, LockConflict> {
        let mut held = self.held.lock().expect("spend guard poisoned");
        for (position, id) in ids.iter().enumerate() {
            if held.contains(id) || ids[..position].contains(id) {
                return Err(LockConflict(*id));
            }
        }
        for id in ids {
            held.insert(*id);
        }
        Ok(SpendLock {
            guard: Arc::clone(self),
            ids: ids.to_vec(),
        })
    }
}

/// Held input set; releases on drop.
#[derive(Debug)]
pub struct SpendLock {
    guard: Arc<SpendGuard>,
    ids: Vec<CommitmentId>,
}

impl Drop for SpendLock {
    fn drop(&mut self) {
        if let Ok(mut held) = self.guard.held.lock() {
            for id in &self.ids {
                held.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicting_acquisitions_fail_whole() {
        let guard = SpendGuard::new();
        let a = CommitmentId::from_bytes([1u8; 32]);
        let b = CommitmentId::from_bytes([2u8; 32]);
        let c = CommitmentId::from_bytes([3u8; 32]);

        let _lock = guard.acquire(&[a, b]).unwrap();
        let err = guard.acquire(&[b, c]).unwrap_err();
        assert_eq!(err, LockConflict(b));
        // `c` was not left behind by the failed acquisition.
        assert!(guard.acquire(&[c]).is_ok());
    }

    #[test]
    fn release_on_drop() {
        let guard = SpendGuard::new();
        let a = CommitmentId::from_bytes([1u8; 32]);
        {
            let _lock = guard.acquire(&[a]).unwrap();
            assert!(guard.acquire(&[a]).is_err());
        }
        assert!(guard.acquire(&[a]).is_ok());
    }

    #[test]
    fn duplicate_ids_in_one_request_conflict() {
        let guard = SpendGuard::new();
        let a = CommitmentId::from_bytes([1u8; 32]);
        assert!(guard.acquire(&[a, a]).is_err());
        // The failed acquisition must not leave residue.
        assert!(guard.acquire(&[a]).is_ok());
    }
}
