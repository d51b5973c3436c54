use ballot_ledger::LedgerError;
use ballot_store::StoreError;
use thiserror::Error;

/// Why a vote was refused before or by the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    ElectionNotOpen,
    VotingWindowClosed,
    AlreadyCast,
    /// The voter has no ballot row for this election.
    NotEligible,
    /// The ledger already holds a vote for this voter hash.
    DuplicateOnLedger,
    /// The ledger refused the submission for another reason.
    LedgerRejected(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ElectionNotOpen => f.write_str("election is not open"),
            Self::VotingWindowClosed => f.write_str("voting window has closed"),
            Self::AlreadyCast => f.write_str("ballot already cast"),
            Self::NotEligible => f.write_str("voter has no ballot for this election"),
            Self::DuplicateOnLedger => f.write_str("ledger already holds a vote for this voter"),
            Self::LedgerRejected(msg) => write!(f, "ledger rejected the vote: {msg}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ElectionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("vote rejected: {0}")]
    VoteRejected(RejectReason),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("reconciliation conflict: {0}")]
    ReconciliationConflict(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl ElectionError {
    /// Only transient ledger failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LedgerUnavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StoreError> for ElectionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ElectionError::NotFound(what),
            other => ElectionError::Store(other),
        }
    }
}

impl From<LedgerError> for ElectionError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Unavailable(_) | LedgerError::Timeout(_) => {
                ElectionError::LedgerUnavailable(e.to_string())
            }
            LedgerError::DuplicateVote { .. } => {
                ElectionError::VoteRejected(RejectReason::DuplicateOnLedger)
            }
            LedgerError::Rejected(msg) => {
                ElectionError::VoteRejected(RejectReason::LedgerRejected(msg))
            }
            LedgerError::Corrupt(msg) => {
                ElectionError::ReconciliationConflict(format!("ledger data corrupt: {msg}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_types::{ElectionId, VoterHash};
    use std::time::Duration;

    #[test]
    fn only_ledger_outages_are_retryable() {
        assert!(ElectionError::from(LedgerError::Timeout(Duration::from_secs(1))).is_retryable());
        assert!(ElectionError::from(LedgerError::Unavailable("down".into())).is_retryable());
        assert!(!ElectionError::Validation("x".into()).is_retryable());
        assert!(!ElectionError::from(LedgerError::Corrupt("bad".into())).is_retryable());
    }

    #[test]
    fn duplicate_maps_to_rejection() {
        let err = ElectionError::from(LedgerError::DuplicateVote {
            election: ElectionId::new(1),
            voter_hash: VoterHash::new([0; 32]),
        });
        assert!(matches!(
            err,
            ElectionError::VoteRejected(RejectReason::DuplicateOnLedger)
        ));
    }

    #[test]
    fn store_not_found_stays_not_found() {
        let err = ElectionError::from(StoreError::NotFound("election 4".into()));
        assert!(err.is_not_found());
        let err = ElectionError::from(StoreError::Backend("disk".into()));
        assert!(matches!(err, ElectionError::Store(_)));
    }
}
