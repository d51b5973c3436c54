//! Blake2b hashing for the vote-log chain.

use ballot_types::{ChainHash, VoteEvent};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Extend the vote-log chain by one event.
///
/// Every field of the event is committed, so rewriting any stored event
/// breaks every later link.
pub fn chain_link(previous: &ChainHash, event: &VoteEvent) -> ChainHash {
    ChainHash::new(blake2b_256_multi(&[
        previous.as_bytes(),
        &event.election_id.to_be_bytes(),
        &event.candidate_id.to_be_bytes(),
        event.voter_hash.as_bytes(),
        &event.timestamp.as_secs().to_be_bytes(),
        &event.index.to_be_bytes(),
    ]))
}
