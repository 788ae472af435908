//! Commitment documents, patches, and query predicates.
//!
//! The flag set encodes a small monotonic state machine:
//! `Minted → {Transferred, Burned} → Nullified`. Nullification is terminal
//! and doubles as the deletion signal — records are never removed, so the
//! audit trail survives the commitment.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zkat_common::{CommitmentId, Salt, TokenId};

/// Ordering applied to `list` results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sort {
    Unsorted,
    /// Ascending commitment value; non-fungible records fall back to leaf
    /// index, which is the only order they carry.
    ValueAscending,
    /// Ascending Merkle leaf index.
    IndexAscending,
}

/// Document shape stored by a [`crate::CommitmentStore`].
pub trait StoredCommitment:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Filter: Clone + Send + Sync;
    type Patch: Clone + Send + Sync + 'static;

    /// Sled tree name for this record family.
    const TREE: &'static str;

    fn id(&self) -> &CommitmentId;
    fn matches(&self, filter: &Self::Filter) -> bool;
    fn sort_key(&self, sort: Sort) -> u64;
    /// Partial-field merge; `None` fields are left untouched.
    fn apply(&mut self, patch: &Self::Patch);
}

/// A value-bearing commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FungibleCommitment {
    pub id: CommitmentId,
    /// Display units; scaled to raw precision only at the engine boundary.
    pub value: u64,
    pub salt: Salt,
    /// Leaf position in the on-chain Merkle accumulator; needed to rebuild a
    /// membership proof when this commitment is later spent.
    pub commitment_index: u64,
    #[serde(default)]
    pub is_minted: bool,
    #[serde(default)]
    pub is_transferred: bool,
    #[serde(default)]
    pub is_nullified: bool,
    #[serde(default)]
    pub is_burned: bool,
    #[serde(default)]
    pub is_change: bool,
    /// Investor-class commitments are excluded from transfer selection.
    #[serde(default)]
    pub is_investor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_audit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burn_audit: Option<String>,
}

impl FungibleCommitment {
    /// A freshly minted, active record.
    pub fn minted(id: CommitmentId, value: u64, salt: Salt, commitment_index: u64) -> Self {
        Self {
            id,
            value,
            salt,
            commitment_index,
            is_minted: true,
            is_transferred: false,
            is_nullified: false,
            is_burned: false,
            is_change: false,
            is_investor: false,
            transfer_audit: None,
            burn_audit: None,
        }
    }

    /// A change output persisted after a transfer.
    pub fn change(id: CommitmentId, value: u64, salt: Salt, commitment_index: u64) -> Self {
        let mut record = Self::minted(id, value, salt, commitment_index);
        record.is_change = true;
        record
    }

    /// Spendable: minted and not yet nullified.
    pub fn is_active(&self) -> bool {
        self.is_minted && !self.is_nullified
    }
}

/// Query predicate over fungible commitments; `None` fields match anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct FungibleFilter {
    pub minted: Option<bool>,
    pub nullified: Option<bool>,
    pub transferred: Option<bool>,
    pub investor: Option<bool>,
}

impl FungibleFilter {
    /// Active commitments: minted, not nullified, not transferred.
    pub fn active() -> Self {
        Self {
            minted: Some(true),
            nullified: Some(false),
            transferred: Some(false),
            investor: None,
        }
    }

    /// Commitments eligible as transfer inputs: active and outside the
    /// investor class.
    pub fn active_spendable() -> Self {
        Self {
            minted: Some(true),
            nullified: Some(false),
            transferred: None,
            investor: Some(false),
        }
    }

    pub fn active_investor() -> Self {
        Self {
            minted: Some(true),
            nullified: Some(false),
            transferred: None,
            investor: Some(true),
        }
    }
}

/// Partial update of a fungible record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FungiblePatch {
    pub is_nullified: Option<bool>,
    pub is_transferred: Option<bool>,
    pub is_burned: Option<bool>,
    pub transfer_audit: Option<String>,
    pub burn_audit: Option<String>,
}

impl FungiblePatch {
    /// Mark a transfer input spent, with its provenance note.
    pub fn transferred(audit: String) -> Self {
        Self {
            is_nullified: Some(true),
            is_transferred: Some(true),
            transfer_audit: Some(audit),
            ..Self::default()
        }
    }

    /// Mark a commitment burned, with its provenance note.
    pub fn burned(audit: String) -> Self {
        Self {
            is_nullified: Some(true),
            is_burned: Some(true),
            burn_audit: Some(audit),
            ..Self::default()
        }
    }
}

impl StoredCommitment for FungibleCommitment {
    type Filter = FungibleFilter;
    type Patch = FungiblePatch;

    const TREE: &'static str = "fungible_commitments";

    fn id(&self) -> &CommitmentId {
        &self.id
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        filter.minted.map_or(true, |want| self.is_minted == want)
            && filter
                .nullified
                .map_or(true, |want| self.is_nullified == want)
            && filter
                .transferred
                .map_or(true, |want| self.is_transferred == want)
            && filter
                .investor
                .map_or(true, |want| self.is_investor == want)
    }

    fn sort_key(&self, sort: Sort) -> u64 {
        match sort {
            Sort::Unsorted => 0,
            Sort::ValueAscending => self.value,
            Sort::IndexAscending => self.commitment_index,
        }
    }

    fn apply(&mut self, patch: &Self::Patch) {
        if let Some(value) = patch.is_nullified {
            self.is_nullified = value;
        }
        if let Some(value) = patch.is_transferred {
            self.is_transferred = value;
        }
        if let Some(value) = patch.is_burned {
            self.is_burned = value;
        }
        if let Some(audit) = &patch.transfer_audit {
            self.transfer_audit = Some(audit.clone());
        }
        if let Some(audit) = &patch.burn_audit {
            self.burn_audit = Some(audit.clone());
        }
    }
}

/// A unique-asset commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonFungibleCommitment {
    pub id: CommitmentId,
    pub token_id: TokenId,
    pub salt: Salt,
    pub commitment_index: u64,
    #[serde(default)]
    pub is_minted: bool,
    #[serde(default)]
    pub is_transferred: bool,
    #[serde(default)]
    pub is_nullified: bool,
    #[serde(default)]
    pub is_burned: bool,
    /// Set on commitments registered from an incoming transfer rather than
    /// minted locally.
    #[serde(default)]
    pub is_received: bool,
}

impl NonFungibleCommitment {
    pub fn minted(id: CommitmentId, token_id: TokenId, salt: Salt, commitment_index: u64) -> Self {
        Self {
            id,
            token_id,
            salt,
            commitment_index,
            is_minted: true,
            is_transferred: false,
            is_nullified: false,
            is_burned: false,
            is_received: false,
        }
    }

    pub fn received(id: CommitmentId, token_id: TokenId, salt: Salt, commitment_index: u64) -> Self {
        let mut record = Self::minted(id, token_id, salt, commitment_index);
        record.is_received = true;
        record
    }

    pub fn is_active(&self) -> bool {
        self.is_minted && !self.is_nullified
    }
}

/// Query predicate over non-fungible commitments.
#[derive(Clone, Copy, Debug, Default)]
pub struct NonFungibleFilter {
    pub minted: Option<bool>,
    pub nullified: Option<bool>,
    pub transferred: Option<bool>,
    pub received: Option<bool>,
}

impl NonFungibleFilter {
    pub fn active() -> Self {
        Self {
            minted: Some(true),
            nullified: Some(false),
            transferred: None,
            received: None,
        }
    }
}

/// Partial update of a non-fungible record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NonFungiblePatch {
    pub is_nullified: Option<bool>,
    pub is_transferred: Option<bool>,
    pub is_burned: Option<bool>,
}

impl NonFungiblePatch {
    pub fn transferred() -> Self {
        Self {
            is_nullified: Some(true),
            is_transferred: Some(true),
            ..Self::default()
        }
    }

    pub fn burned() -> Self {
        Self {
            is_nullified: Some(true),
            is_burned: Some(true),
            ..Self::default()
        }
    }
}

impl StoredCommitment for NonFungibleCommitment {
    type Filter = NonFungibleFilter;
    type Patch = NonFungiblePatch;

    const TREE: &'static str = "non_fungible_commitments";

    fn id(&self) -> &CommitmentId {
        &self.id
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        filter.minted.map_or(true, |want| self.is_minted == want)
            && filter
                .nullified
                .map_or(true, |want| self.is_nullified == want)
            && filter
                .transferred
                .map_or(true, |want| self.is_transferred == want)
            && filter
                .received
                .map_or(true, |want| self.is_received == want)
    }

    fn sort_key(&self, sort: Sort) -> u64 {
        match sort {
            Sort::Unsorted => 0,
            // No value to order by; the leaf index is the natural order.
            Sort::ValueAscending | Sort::IndexAscending => self.commitment_index,
        }
    }

    fn apply(&mut self, patch: &Self::Patch) {
        if let Some(value) = patch.is_nullified {
            self.is_nullified = value;
        }
        if let Some(value) = patch.is_transferred {
            self.is_transferred = value;
        }
        if let Some(value) = patch.is_burned {
            self.is_burned = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(value: u64) -> FungibleCommitment {
        FungibleCommitment::minted(CommitmentId::random(), value, Salt::random(), 0)
    }

    #[test]
    fn lifecycle_flags_drive_activity() {
        let mut record = fixture(10);
        assert!(record.is_active());
        record.apply(&FungiblePatch::transferred("note".into()));
        assert!(!record.is_active());
        assert!(record.is_transferred);
        assert!(record.is_nullified);
        assert_eq!(record.transfer_audit.as_deref(), Some("note"));
    }

    #[test]
    fn patch_merge_leaves_unset_fields() {
        let mut record = fixture(10);
        record.transfer_audit = Some("earlier".into());
        record.apply(&FungiblePatch {
            is_burned: Some(true),
            ..FungiblePatch::default()
        });
        assert!(record.is_burned);
        assert!(!record.is_nullified);
        assert_eq!(record.transfer_audit.as_deref(), Some("earlier"));
    }

    #[test]
    fn active_filters_exclude_nullified_and_investor() {
        let mut nullified = fixture(5);
        nullified.apply(&FungiblePatch::burned("gone".into()));
        let mut investor = fixture(7);
        investor.is_investor = true;
        let plain = fixture(9);

        let spendable = FungibleFilter::active_spendable();
        assert!(!nullified.matches(&spendable));
        assert!(!investor.matches(&spendable));
        assert!(plain.matches(&spendable));
        assert!(investor.matches(&FungibleFilter::active_investor()));
    }

    #[test]
    fn received_records_are_marked() {
        let record = NonFungibleCommitment::received(
            CommitmentId::random(),
            TokenId::random(),
            Salt::random(),
            3,
        );
        assert!(record.is_received);
        assert!(record.is_active());
        assert!(record.matches(&NonFungibleFilter {
            received: Some(true),
            ..NonFungibleFilter::default()
        }));
    }
}
