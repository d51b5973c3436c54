//! Fundamental types for the ballot ledger.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, timestamps, voter hashes, election and candidate records, ballot
//! statuses and the vote events read back from the ledger.

pub mod ballot;
pub mod election;
pub mod error;
pub mod event;
pub mod hash;
pub mod ids;
pub mod time;
pub mod voter;

pub use ballot::BallotStatus;
pub use election::{Candidate, CandidateSpec, Election, ElectionStatus};
pub use error::TypeError;
pub use event::{VoteEvent, VoteSubmission};
pub use hash::{ChainHash, VoterHash};
pub use ids::{CandidateId, ElectionId, EventIndex, VoterId};
pub use time::{Clock, SystemClock, Timestamp};
pub use voter::{Voter, VoterRole};
