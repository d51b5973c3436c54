//! Registered voters.

use crate::{TypeError, VoterId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoterRole {
    /// Receives a ballot row for every election.
    Voter,
    /// Administers elections; never receives ballots.
    Admin,
}

impl VoterRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voter => "voter",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for VoterRole {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "voter" => Ok(Self::Voter),
            "admin" => Ok(Self::Admin),
            other => Err(TypeError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: VoterId,
    pub name: String,
    pub role: VoterRole,
}

impl Voter {
    pub fn receives_ballots(&self) -> bool {
        self.role == VoterRole::Voter
    }
}
