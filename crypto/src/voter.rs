//! One-way voter identity hashing.
//!
//! Voter ids are small sequential integers, so a plain hash could be reversed
//! by enumeration. The hash is therefore keyed (HMAC-SHA256) with a secret
//! held by the operator, and bound to the election id so the same voter is
//! unlinkable across elections.

use ballot_types::{ElectionId, VoterHash, VoterId};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Domain separation tag for voter hashes.
const VOTER_HASH_DOMAIN: &[u8] = b"ballot/voter/v1";

/// Keyed hasher turning `(election, voter)` into the identity seen by the ledger.
#[derive(Clone)]
pub struct VoterHasher {
    mac: HmacSha256,
}

impl VoterHasher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Hash a voter's identity for one election.
    pub fn hash(&self, election: ElectionId, voter: VoterId) -> VoterHash {
        let mut mac = self.mac.clone();
        mac.update(VOTER_HASH_DOMAIN);
        mac.update(&election.to_be_bytes());
        mac.update(&voter.to_be_bytes());
        let digest = mac.finalize().into_bytes();
        let mut output = [0u8; 32];
        output.copy_from_slice(&digest);
        VoterHash::new(output)
    }
}

impl std::fmt::Debug for VoterHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VoterHasher(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> VoterHasher {
        VoterHasher::new(b"test-key").unwrap()
    }

    #[test]
    fn deterministic_per_election() {
        let h = hasher();
        let a = h.hash(ElectionId::new(1), VoterId::new(42));
        let b = h.hash(ElectionId::new(1), VoterId::new(42));
        assert_eq!(a, b);
    }

    #[test]
    fn unlinkable_across_elections() {
        let h = hasher();
        let a = h.hash(ElectionId::new(1), VoterId::new(42));
        let b = h.hash(ElectionId::new(2), VoterId::new(42));
        assert_ne!(a, b);
    }

    #[test]
    fn depends_on_key() {
        let other = VoterHasher::new(b"other-key").unwrap();
        let a = hasher().hash(ElectionId::new(1), VoterId::new(42));
        let b = other.hash(ElectionId::new(1), VoterId::new(42));
        assert_ne!(a, b);
    }

    #[test]
    fn raw_id_does_not_appear_in_hash() {
        let hash = hasher().hash(ElectionId::new(1), VoterId::new(42));
        assert_ne!(&hash.as_bytes()[24..], &42u64.to_be_bytes());
    }

    #[test]
    fn empty_key_rejected() {
        assert!(matches!(VoterHasher::new(b""), Err(CryptoError::EmptyKey)));
    }
}
