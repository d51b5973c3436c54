//! Composite key encodings.
//!
//! All components are fixed-width big-endian, so prefix scans over the first
//! component return rows in numeric order of the second.

use ballot_types::{CandidateId, ElectionId, EventIndex, VoterHash, VoterId};

pub fn election_key(id: ElectionId) -> [u8; 8] {
    id.to_be_bytes()
}

/// `election ++ candidate`
pub fn candidate_key(election: ElectionId, candidate: CandidateId) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&election.to_be_bytes());
    key[8..].copy_from_slice(&candidate.to_be_bytes());
    key
}

/// `voter ++ election`: primary ballot key.
pub fn ballot_key(voter: VoterId, election: ElectionId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&voter.to_be_bytes());
    key[8..].copy_from_slice(&election.to_be_bytes());
    key
}

/// `election ++ voter`: fan-out index key.
pub fn ballot_index_key(election: ElectionId, voter: VoterId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&election.to_be_bytes());
    key[8..].copy_from_slice(&voter.to_be_bytes());
    key
}

/// `election ++ event index`
pub fn event_key(election: ElectionId, index: EventIndex) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&election.to_be_bytes());
    key[8..].copy_from_slice(&index.to_be_bytes());
    key
}

/// `election ++ voter hash`
pub fn dedup_key(election: ElectionId, voter_hash: &VoterHash) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..8].copy_from_slice(&election.to_be_bytes());
    key[8..].copy_from_slice(voter_hash.as_bytes());
    key
}

pub fn split_u64_pair(key: &[u8]) -> Option<(u64, u64)> {
    if key.len() != 16 {
        return None;
    }
    let mut a = [0u8; 8];
    let mut b = [0u8; 8];
    a.copy_from_slice(&key[..8]);
    b.copy_from_slice(&key[8..]);
    Some((u64::from_be_bytes(a), u64::from_be_bytes(b)))
}

pub fn read_u64(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}
