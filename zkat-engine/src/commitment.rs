//! Protocol commitment hashes.
//!
//! The commitment formula is protocol-level, not backend-level: both engines
//! compute the same hashes, so the simulated backend produces the ids the
//! live backend would read back out of shield-contract events.

use sha2::{Digest, Sha256};
use zkat_common::{CommitmentId, Salt, TokenId, ZkpPublicKey};

const FUNGIBLE_TAG: &[u8] = b"zkat.ft.commitment";
const NON_FUNGIBLE_TAG: &[u8] = b"zkat.nft.commitment";

fn hash(tag: &[u8], parts: &[&[u8]]) -> CommitmentId {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    CommitmentId::from_bytes(bytes)
}

/// Commitment to `raw_value` owned by `owner`, blinded by `salt`.
pub fn fungible_commitment(raw_value: u64, owner: &ZkpPublicKey, salt: &Salt) -> CommitmentId {
    hash(
        FUNGIBLE_TAG,
        &[&raw_value.to_be_bytes(), owner.as_bytes(), salt.as_bytes()],
    )
}

/// Commitment to the unique asset `token_id` owned by `owner`.
pub fn non_fungible_commitment(
    token_id: &TokenId,
    owner: &ZkpPublicKey,
    salt: &Salt,
) -> CommitmentId {
    hash(
        NON_FUNGIBLE_TAG,
        &[token_id.as_bytes(), owner.as_bytes(), salt.as_bytes()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_input_sensitive() {
        let owner = ZkpPublicKey::from_bytes([1u8; 32]);
        let salt = Salt::from_bytes([2u8; 32]);
        let a = fungible_commitment(100, &owner, &salt);
        assert_eq!(a, fungible_commitment(100, &owner, &salt));
        assert_ne!(a, fungible_commitment(101, &owner, &salt));
        assert_ne!(a, fungible_commitment(100, &owner, &Salt::from_bytes([3u8; 32])));
    }

    #[test]
    fn families_are_domain_separated() {
        let owner = ZkpPublicKey::from_bytes([1u8; 32]);
        let salt = Salt::from_bytes([2u8; 32]);
        let token = TokenId::from_bytes([0u8; 32]);
        // A zero token id must not collide with a zero-value commitment.
        assert_ne!(
            fungible_commitment(0, &owner, &salt),
            non_fungible_commitment(&token, &owner, &salt)
        );
    }
}
