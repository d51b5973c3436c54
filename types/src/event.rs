//! Vote events as recorded by the ledger.

use crate::{CandidateId, ElectionId, EventIndex, Timestamp, VoterHash};
use serde::{Deserialize, Serialize};

/// A vote submitted to the ledger. Carries the hashed voter identity only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSubmission {
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    pub voter_hash: VoterHash,
}

/// An accepted vote event. Immutable once observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    pub voter_hash: VoterHash,
    pub timestamp: Timestamp,
    /// Assigned by the ledger's total order; unique within an election.
    pub index: EventIndex,
}
