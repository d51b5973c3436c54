//! Candidate storage trait.

use crate::StoreError;
use ballot_types::{Candidate, CandidateId, ElectionId};
use std::collections::BTreeMap;

pub trait CandidateStore {
    /// All candidates of an election, ordered by candidate id.
    fn get_candidates(&self, election: ElectionId) -> Result<Vec<Candidate>, StoreError>;

    /// Overwrite the cached vote counts of an election in one atomic write.
    ///
    /// Every id in `counts` must belong to the election, otherwise nothing is
    /// written and [`StoreError::NotFound`] is returned. Candidates missing
    /// from `counts` keep their previous value.
    fn set_counts(
        &self,
        election: ElectionId,
        counts: &BTreeMap<CandidateId, u64>,
    ) -> Result<(), StoreError>;
}
