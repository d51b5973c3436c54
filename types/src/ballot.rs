//! Per-voter, per-election ballot status.

use crate::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Voting progress of one voter in one election.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BallotStatus {
    /// The voter may cast a vote.
    Available,
    /// The voter's vote has been accepted by the ledger.
    Cast,
    /// The election is completed and its results can be shown to this voter.
    ResultsVisible,
}

impl BallotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Cast => "cast",
            Self::ResultsVisible => "results-visible",
        }
    }

    /// Ballot statuses only move forward; a voter never gets a ballot back.
    pub fn can_advance_to(&self, next: BallotStatus) -> bool {
        matches!(
            (self, next),
            (Self::Available, Self::Cast)
                | (Self::Available, Self::ResultsVisible)
                | (Self::Cast, Self::ResultsVisible)
        )
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Available => 0,
            Self::Cast => 1,
            Self::ResultsVisible => 2,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Available),
            1 => Some(Self::Cast),
            2 => Some(Self::ResultsVisible),
            _ => None,
        }
    }
}

impl fmt::Display for BallotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BallotStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "cast" => Ok(Self::Cast),
            "results-visible" => Ok(Self::ResultsVisible),
            other => Err(TypeError::UnknownBallotStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_regresses() {
        use BallotStatus::*;
        assert!(Available.can_advance_to(Cast));
        assert!(Cast.can_advance_to(ResultsVisible));
        assert!(!Cast.can_advance_to(Available));
        assert!(!ResultsVisible.can_advance_to(Cast));
        assert!(!Cast.can_advance_to(Cast));
    }

    #[test]
    fn byte_encoding_is_stable() {
        for status in [BallotStatus::Available, BallotStatus::Cast, BallotStatus::ResultsVisible] {
            assert_eq!(BallotStatus::from_byte(status.to_byte()), Some(status));
        }
        assert_eq!(BallotStatus::from_byte(9), None);
    }
}
