//! Ballot status storage trait.
//!
//! One row per `(voter, election)`. Rows are independent: writing one voter's
//! row never touches another's.

use crate::StoreError;
use ballot_types::{BallotStatus, ElectionId, VoterId};

pub trait BallotStore {
    /// Create the row with `status` if it does not exist yet.
    ///
    /// Returns `true` if a row was created. An existing row is left untouched.
    fn ensure_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
        status: BallotStatus,
    ) -> Result<bool, StoreError>;

    /// Ensure rows for many voters of one election. Returns how many were created.
    fn ensure_ballots(
        &self,
        election: ElectionId,
        voters: &[VoterId],
        status: BallotStatus,
    ) -> Result<usize, StoreError> {
        let mut created = 0;
        for voter in voters {
            if self.ensure_ballot(*voter, election, status)? {
                created += 1;
            }
        }
        Ok(created)
    }

    fn get_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
    ) -> Result<Option<BallotStatus>, StoreError>;

    /// Atomically replace `expected` with `new`.
    ///
    /// Returns `Ok(false)` if the row is missing or holds another status.
    fn compare_and_set_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
        expected: BallotStatus,
        new: BallotStatus,
    ) -> Result<bool, StoreError>;

    /// Move a row forward to `to`. Returns `Ok(false)` if it is already at
    /// or past `to`; fails with [`StoreError::NotFound`] if the row is missing.
    fn advance_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
        to: BallotStatus,
    ) -> Result<bool, StoreError>;

    /// Every row of one voter, ordered by election id.
    fn ballots_for_voter(&self, voter: VoterId)
        -> Result<Vec<(ElectionId, BallotStatus)>, StoreError>;

    /// Every row of one election, ordered by voter id.
    fn ballots_for_election(
        &self,
        election: ElectionId,
    ) -> Result<Vec<(VoterId, BallotStatus)>, StoreError>;
}
