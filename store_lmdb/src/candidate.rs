//! LMDB implementation of CandidateStore.

use std::collections::BTreeMap;

use ballot_store::{CandidateStore, StoreError};
use ballot_types::{Candidate, CandidateId, ElectionId};

use crate::environment::LmdbStore;
use crate::keys::{candidate_key, election_key};
use crate::LmdbError;

impl CandidateStore for LmdbStore {
    fn get_candidates(&self, election: ElectionId) -> Result<Vec<Candidate>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let prefix = election_key(election);
        let mut candidates = Vec::new();
        for result in self
            .candidates_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (_key, val) = result.map_err(LmdbError::from)?;
            let candidate: Candidate = bincode::deserialize(val).map_err(LmdbError::from)?;
            candidates.push(candidate);
        }
        Ok(candidates)
    }

    fn set_counts(
        &self,
        election: ElectionId,
        counts: &BTreeMap<CandidateId, u64>,
    ) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        for (id, votes) in counts {
            let key = candidate_key(election, *id);
            let mut candidate: Candidate = {
                let raw = self
                    .candidates_db
                    .get(&wtxn, &key)
                    .map_err(LmdbError::from)?
                    .ok_or_else(|| {
                        LmdbError::NotFound(format!("candidate {id} in election {election}"))
                    })?;
                bincode::deserialize(raw).map_err(LmdbError::from)?
            };
            candidate.votes = *votes;
            let bytes = bincode::serialize(&candidate).map_err(LmdbError::from)?;
            self.candidates_db
                .put(&mut wtxn, &key, &bytes)
                .map_err(LmdbError::from)?;
        }
        // Dropping the transaction on any error above aborts every write.
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
