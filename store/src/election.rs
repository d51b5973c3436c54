//! Election storage trait.

use crate::StoreError;
use ballot_types::{Candidate, Election, ElectionId, ElectionStatus};

pub trait ElectionStore {
    /// Reserve the next unused election id.
    fn allocate_election_id(&self) -> Result<ElectionId, StoreError>;

    /// Insert a new election together with its candidate set, atomically.
    ///
    /// Fails with [`StoreError::Duplicate`] if the id is already taken.
    fn insert_election(
        &self,
        election: &Election,
        candidates: &[Candidate],
    ) -> Result<(), StoreError>;

    fn get_election(&self, id: ElectionId) -> Result<Election, StoreError>;

    fn iter_elections(&self) -> Result<Vec<Election>, StoreError>;

    /// Compare-and-set the lifecycle status.
    ///
    /// Returns `Ok(false)` without writing when the stored status is not `from`,
    /// and [`StoreError::IllegalTransition`] when `from -> to` is not a forward
    /// lifecycle step.
    fn transition_status(
        &self,
        id: ElectionId,
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<bool, StoreError>;

    /// Elections in the given status, ordered by start time then id.
    fn elections_with_status(&self, status: ElectionStatus) -> Result<Vec<Election>, StoreError> {
        let mut elections: Vec<Election> = self
            .iter_elections()?
            .into_iter()
            .filter(|e| e.status == status)
            .collect();
        elections.sort_by_key(|e| (e.start_time, e.id));
        Ok(elections)
    }
}
