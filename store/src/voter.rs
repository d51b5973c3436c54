//! Voter registry storage trait.

use crate::StoreError;
use ballot_types::{Voter, VoterId};

pub trait VoterStore {
    /// Insert a new voter. Fails with [`StoreError::Duplicate`] if the id exists.
    fn insert_voter(&self, voter: &Voter) -> Result<(), StoreError>;

    fn get_voter(&self, id: VoterId) -> Result<Voter, StoreError>;

    fn voter_exists(&self, id: VoterId) -> Result<bool, StoreError>;

    /// All voters, ordered by id.
    fn iter_voters(&self) -> Result<Vec<Voter>, StoreError>;

    /// Voters that receive a ballot row for each election.
    fn ballot_voter_ids(&self) -> Result<Vec<VoterId>, StoreError> {
        Ok(self
            .iter_voters()?
            .into_iter()
            .filter(|v| v.receives_ballots())
            .map(|v| v.id)
            .collect())
    }
}
