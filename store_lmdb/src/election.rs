//! LMDB implementation of ElectionStore.

use ballot_store::{ElectionStore, StoreError};
use ballot_types::{Candidate, Election, ElectionId, ElectionStatus};

use crate::environment::{LmdbStore, META_NEXT_ELECTION};
use crate::keys::{candidate_key, election_key, read_u64};
use crate::LmdbError;

impl ElectionStore for LmdbStore {
    fn allocate_election_id(&self) -> Result<ElectionId, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let next = match self
            .meta_db
            .get(&wtxn, META_NEXT_ELECTION)
            .map_err(LmdbError::from)?
        {
            Some(raw) => read_u64(raw)
                .ok_or_else(|| LmdbError::Corruption("next election id length".into()))?,
            None => 1,
        };
        self.meta_db
            .put(&mut wtxn, META_NEXT_ELECTION, &(next + 1).to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(ElectionId::new(next))
    }

    fn insert_election(
        &self,
        election: &Election,
        candidates: &[Candidate],
    ) -> Result<(), StoreError> {
        let key = election_key(election.id);
        let bytes = bincode::serialize(election).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .elections_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(LmdbError::Duplicate(format!("election {}", election.id)).into());
        }
        self.elections_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        for candidate in candidates {
            let ck = candidate_key(election.id, candidate.id);
            let cb = bincode::serialize(candidate).map_err(LmdbError::from)?;
            self.candidates_db
                .put(&mut wtxn, &ck, &cb)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_election(&self, id: ElectionId) -> Result<Election, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let raw = self
            .elections_db
            .get(&rtxn, &election_key(id))
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("election {id}")))?;
        let election: Election = bincode::deserialize(raw).map_err(LmdbError::from)?;
        Ok(election)
    }

    fn iter_elections(&self) -> Result<Vec<Election>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut elections = Vec::new();
        for result in self.elections_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = result.map_err(LmdbError::from)?;
            let election: Election = bincode::deserialize(val).map_err(LmdbError::from)?;
            elections.push(election);
        }
        Ok(elections)
    }

    fn transition_status(
        &self,
        id: ElectionId,
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<bool, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::IllegalTransition { from, to });
        }
        let key = election_key(id);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut election: Election = {
            let raw = self
                .elections_db
                .get(&wtxn, &key)
                .map_err(LmdbError::from)?
                .ok_or_else(|| LmdbError::NotFound(format!("election {id}")))?;
            bincode::deserialize(raw).map_err(LmdbError::from)?
        };
        if election.status != from {
            return Ok(false);
        }
        election.status = to;
        let bytes = bincode::serialize(&election).map_err(LmdbError::from)?;
        self.elections_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }
}
