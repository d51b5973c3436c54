//! Election and candidate records.

use crate::{CandidateId, ElectionId, Timestamp, TypeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of an election.
///
/// `Open → ClosedPendingFinalize → Completed`. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElectionStatus {
    /// Accepting votes.
    Open,
    /// No longer accepting votes; waiting for the final reconciliation pass.
    ClosedPendingFinalize,
    /// Final tally persisted and results visible. Terminal.
    Completed,
}

impl ElectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::ClosedPendingFinalize => "closed-pending-finalize",
            Self::Completed => "completed",
        }
    }

    /// Whether a transition from `self` to `next` is a legal forward step.
    pub fn can_transition_to(&self, next: ElectionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::ClosedPendingFinalize)
                | (Self::ClosedPendingFinalize, Self::Completed)
        )
    }

    pub fn accepts_votes(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::ClosedPendingFinalize => 1,
            Self::Completed => 2,
        }
    }
}

impl fmt::Display for ElectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElectionStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "active" => Ok(Self::Open),
            "closed" | "closed-pending-finalize" => Ok(Self::ClosedPendingFinalize),
            "completed" => Ok(Self::Completed),
            other => Err(TypeError::UnknownElectionStatus(other.to_string())),
        }
    }
}

/// An election record. Never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: ElectionId,
    pub name: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: ElectionStatus,
}

impl Election {
    /// Whether the voting window has elapsed at `now`.
    pub fn window_elapsed(&self, now: Timestamp) -> bool {
        self.end_time.has_passed(now)
    }
}

/// A candidate as submitted when creating an election.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub party: String,
}

impl CandidateSpec {
    pub fn new(name: impl Into<String>, party: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            party: party.into(),
        }
    }
}

/// A candidate belonging to exactly one election.
///
/// `votes` is a reconciliation cache; the ledger remains the source of truth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub election_id: ElectionId,
    pub id: CandidateId,
    pub name: String,
    pub party: String,
    pub votes: u64,
}
