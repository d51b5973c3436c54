//! Election registry: creation, lookup and listing of election records.

use std::sync::Arc;

use ballot_store::VoteStore;
use ballot_types::{
    Candidate, CandidateId, CandidateSpec, Clock, Election, ElectionId, ElectionStatus, Timestamp,
};
use serde::Serialize;

use crate::ElectionError;

/// An election together with its candidates and their last-reconciled counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ElectionDetails {
    pub election: Election,
    pub candidates: Vec<Candidate>,
}

pub struct ElectionRegistry<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: VoteStore> ElectionRegistry<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a new open election starting now.
    ///
    /// Candidates get ids `1..=n` in submission order. Ballot rows are not
    /// created here.
    pub fn create(
        &self,
        name: &str,
        end_time: Timestamp,
        candidates: &[CandidateSpec],
    ) -> Result<ElectionDetails, ElectionError> {
        let now = self.clock.now();
        let name = name.trim();
        if name.is_empty() {
            return Err(ElectionError::Validation("election name is empty".into()));
        }
        if end_time <= now {
            return Err(ElectionError::Validation(format!(
                "end time {end_time} is not after now ({now})"
            )));
        }
        if candidates.is_empty() {
            return Err(ElectionError::Validation(
                "at least one candidate is required".into(),
            ));
        }
        if let Some(pos) = candidates.iter().position(|c| c.name.trim().is_empty()) {
            return Err(ElectionError::Validation(format!(
                "candidate #{} has an empty name",
                pos + 1
            )));
        }

        let id = self.store.allocate_election_id()?;
        let election = Election {
            id,
            name: name.to_string(),
            start_time: now,
            end_time,
            status: ElectionStatus::Open,
        };
        let candidates: Vec<Candidate> = candidates
            .iter()
            .zip(1u32..)
            .map(|(spec, n)| Candidate {
                election_id: id,
                id: CandidateId::new(n),
                name: spec.name.trim().to_string(),
                party: spec.party.trim().to_string(),
                votes: 0,
            })
            .collect();
        self.store.insert_election(&election, &candidates)?;

        tracing::info!(
            election_id = %id,
            candidates = candidates.len(),
            end_time = %end_time,
            "election created"
        );

        Ok(ElectionDetails {
            election,
            candidates,
        })
    }

    pub fn get(&self, id: ElectionId) -> Result<Election, ElectionError> {
        Ok(self.store.get_election(id)?)
    }

    /// Elections in `status`, ordered by start time then id.
    pub fn list_by_status(&self, status: ElectionStatus) -> Result<Vec<Election>, ElectionError> {
        Ok(self.store.elections_with_status(status)?)
    }

    /// Every election, ordered by start time then id.
    pub fn list_all(&self) -> Result<Vec<Election>, ElectionError> {
        let mut elections = self.store.iter_elections()?;
        elections.sort_by_key(|e| (e.start_time, e.id));
        Ok(elections)
    }

    pub fn details(&self, id: ElectionId) -> Result<ElectionDetails, ElectionError> {
        let election = self.get(id)?;
        let candidates = self.store.get_candidates(id)?;
        Ok(ElectionDetails {
            election,
            candidates,
        })
    }
}
