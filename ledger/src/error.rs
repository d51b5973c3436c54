use ballot_types::{ElectionId, VoterHash};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger did not answer within {0:?}")]
    Timeout(Duration),

    #[error("duplicate vote for election {election} from voter hash {voter_hash:?}")]
    DuplicateVote {
        election: ElectionId,
        voter_hash: VoterHash,
    },

    #[error("ledger rejected submission: {0}")]
    Rejected(String),

    #[error("ledger data is corrupted: {0}")]
    Corrupt(String),
}

impl LedgerError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}
