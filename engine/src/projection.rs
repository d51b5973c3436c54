//! Candidate ledger projection: cached per-candidate counts.
//!
//! Counts are only ever overwritten wholesale by the reconciler, never
//! incremented, so repeated passes cannot double count.

use std::collections::BTreeMap;
use std::sync::Arc;

use ballot_store::VoteStore;
use ballot_types::{Candidate, CandidateId, ElectionId};

use crate::ElectionError;

pub struct CandidateProjection<S> {
    store: Arc<S>,
}

impl<S: VoteStore> CandidateProjection<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Candidates with their last-reconciled counts, ordered by id.
    pub fn get_candidates(&self, election: ElectionId) -> Result<Vec<Candidate>, ElectionError> {
        Ok(self.store.get_candidates(election)?)
    }

    /// Overwrite every count of the election in one atomic write.
    pub fn set_counts(
        &self,
        election: ElectionId,
        counts: &BTreeMap<CandidateId, u64>,
    ) -> Result<(), ElectionError> {
        self.store.set_counts(election, counts)?;
        Ok(())
    }
}
