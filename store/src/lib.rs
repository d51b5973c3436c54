//! Abstract storage traits for the ballot ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The election engine depends only on the traits.
//!
//! Tables are keyed, not created per entity: candidates by
//! `(election, candidate)`, ballot rows by `(voter, election)` with a
//! secondary `(election, voter)` index for fan-out.

pub mod ballot;
pub mod candidate;
pub mod election;
pub mod error;
pub mod voter;

pub use ballot::BallotStore;
pub use candidate::CandidateStore;
pub use election::ElectionStore;
pub use error::StoreError;
pub use voter::VoterStore;

/// Everything the election engine needs from persistence.
pub trait VoteStore:
    ElectionStore + CandidateStore + BallotStore + VoterStore + Send + Sync
{
}

impl<T> VoteStore for T where
    T: ElectionStore + CandidateStore + BallotStore + VoterStore + Send + Sync
{
}
