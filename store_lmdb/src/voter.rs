//! LMDB implementation of VoterStore.

use ballot_store::{StoreError, VoterStore};
use ballot_types::{Voter, VoterId};

use crate::environment::LmdbStore;
use crate::LmdbError;

impl VoterStore for LmdbStore {
    fn insert_voter(&self, voter: &Voter) -> Result<(), StoreError> {
        let key = voter.id.to_be_bytes();
        let bytes = bincode::serialize(voter).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .voters_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(LmdbError::Duplicate(format!("voter {}", voter.id)).into());
        }
        self.voters_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_voter(&self, id: VoterId) -> Result<Voter, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let raw = self
            .voters_db
            .get(&rtxn, &id.to_be_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("voter {id}")))?;
        Ok(bincode::deserialize(raw).map_err(LmdbError::from)?)
    }

    fn voter_exists(&self, id: VoterId) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self
            .voters_db
            .get(&rtxn, &id.to_be_bytes())
            .map_err(LmdbError::from)?
            .is_some())
    }

    fn iter_voters(&self) -> Result<Vec<Voter>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut voters = Vec::new();
        for result in self.voters_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = result.map_err(LmdbError::from)?;
            voters.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(voters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_store::{BallotStore, CandidateStore, ElectionStore};
    use ballot_types::{BallotStatus, Candidate, CandidateId, Election, ElectionId, ElectionStatus, Timestamp, VoterRole};
    use std::collections::BTreeMap;

    fn open() -> (tempfile::TempDir, LmdbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbStore::open(dir.path(), 1 << 24).unwrap();
        (dir, store)
    }

    fn election(id: u64) -> (Election, Vec<Candidate>) {
        let eid = ElectionId::new(id);
        let election = Election {
            id: eid,
            name: format!("election {id}"),
            start_time: Timestamp::new(100),
            end_time: Timestamp::new(200),
            status: ElectionStatus::Open,
        };
        let candidates = (1..=3)
            .map(|c| Candidate {
                election_id: eid,
                id: CandidateId::new(c),
                name: format!("c{c}"),
                party: String::new(),
                votes: 0,
            })
            .collect();
        (election, candidates)
    }

    #[test]
    fn voters_round_trip_in_id_order() {
        let (_dir, store) = open();
        for id in [7, 2, 300] {
            store
                .insert_voter(&Voter { id: VoterId::new(id), name: format!("v{id}"), role: VoterRole::Voter })
                .unwrap();
        }
        store
            .insert_voter(&Voter { id: VoterId::new(1), name: "root".into(), role: VoterRole::Admin })
            .unwrap();

        let ids: Vec<u64> = store.iter_voters().unwrap().iter().map(|v| v.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 7, 300]);
        assert_eq!(
            store.ballot_voter_ids().unwrap(),
            vec![VoterId::new(2), VoterId::new(7), VoterId::new(300)]
        );
        assert!(store.voter_exists(VoterId::new(7)).unwrap());
        assert!(!store.voter_exists(VoterId::new(8)).unwrap());
        assert!(store.get_voter(VoterId::new(8)).unwrap_err().is_not_found());
    }

    #[test]
    fn duplicate_voter_is_rejected() {
        let (_dir, store) = open();
        let v = Voter { id: VoterId::new(1), name: "a".into(), role: VoterRole::Voter };
        store.insert_voter(&v).unwrap();
        assert!(matches!(store.insert_voter(&v), Err(StoreError::Duplicate(_))));
    }

    #[test]
    fn election_ids_are_allocated_monotonically() {
        let (_dir, store) = open();
        let a = store.allocate_election_id().unwrap();
        let b = store.allocate_election_id().unwrap();
        assert_eq!(a.get() + 1, b.get());
    }

    #[test]
    fn election_insert_and_status_cas() {
        let (_dir, store) = open();
        let (e, c) = election(1);
        store.insert_election(&e, &c).unwrap();
        assert!(matches!(store.insert_election(&e, &c), Err(StoreError::Duplicate(_))));

        assert_eq!(store.get_candidates(e.id).unwrap().len(), 3);
        assert!(!store
            .transition_status(e.id, ElectionStatus::ClosedPendingFinalize, ElectionStatus::Completed)
            .unwrap());
        assert!(store
            .transition_status(e.id, ElectionStatus::Open, ElectionStatus::ClosedPendingFinalize)
            .unwrap());
        assert_eq!(store.get_election(e.id).unwrap().status, ElectionStatus::ClosedPendingFinalize);
        assert!(store
            .elections_with_status(ElectionStatus::Open)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn completed_election_never_moves_back() {
        let (_dir, store) = open();
        let (e, c) = election(2);
        store.insert_election(&e, &c).unwrap();
        store
            .transition_status(e.id, ElectionStatus::Open, ElectionStatus::ClosedPendingFinalize)
            .unwrap();
        store
            .transition_status(e.id, ElectionStatus::ClosedPendingFinalize, ElectionStatus::Completed)
            .unwrap();

        for back in [ElectionStatus::Open, ElectionStatus::ClosedPendingFinalize] {
            let err = store
                .transition_status(e.id, ElectionStatus::Completed, back)
                .unwrap_err();
            assert!(matches!(err, StoreError::IllegalTransition { .. }));
        }
        assert!(matches!(
            store.transition_status(e.id, ElectionStatus::Open, ElectionStatus::Completed),
            Err(StoreError::IllegalTransition { .. })
        ));
        assert_eq!(store.get_election(e.id).unwrap().status, ElectionStatus::Completed);
    }

    #[test]
    fn set_counts_is_all_or_nothing() {
        let (_dir, store) = open();
        let (e, c) = election(4);
        store.insert_election(&e, &c).unwrap();

        let mut bad = BTreeMap::new();
        bad.insert(CandidateId::new(1), 5);
        bad.insert(CandidateId::new(9), 1);
        assert!(store.set_counts(e.id, &bad).unwrap_err().is_not_found());
        assert!(store.get_candidates(e.id).unwrap().iter().all(|c| c.votes == 0));

        let mut good = BTreeMap::new();
        good.insert(CandidateId::new(2), 3);
        store.set_counts(e.id, &good).unwrap();
        let votes: Vec<u64> = store.get_candidates(e.id).unwrap().iter().map(|c| c.votes).collect();
        assert_eq!(votes, vec![0, 3, 0]);
    }

    #[test]
    fn candidates_of_other_elections_are_not_mixed_in() {
        let (_dir, store) = open();
        let (a, ca) = election(1);
        let (b, cb) = election(2);
        store.insert_election(&a, &ca).unwrap();
        store.insert_election(&b, &cb).unwrap();
        assert!(store
            .get_candidates(a.id)
            .unwrap()
            .iter()
            .all(|c| c.election_id == a.id));
    }

    #[test]
    fn ballot_rows_are_indexed_both_ways() {
        let (_dir, store) = open();
        let e1 = ElectionId::new(1);
        let e2 = ElectionId::new(2);
        let voters: Vec<VoterId> = (1..=1100).map(VoterId::new).collect();

        assert_eq!(store.ensure_ballots(e1, &voters, BallotStatus::Available).unwrap(), 1100);
        assert_eq!(store.ensure_ballots(e1, &voters, BallotStatus::Available).unwrap(), 0);
        assert!(store.ensure_ballot(VoterId::new(5), e2, BallotStatus::Available).unwrap());

        assert!(store
            .compare_and_set_ballot(VoterId::new(5), e1, BallotStatus::Available, BallotStatus::Cast)
            .unwrap());
        assert!(!store
            .compare_and_set_ballot(VoterId::new(5), e1, BallotStatus::Available, BallotStatus::Cast)
            .unwrap());

        let mine = store.ballots_for_voter(VoterId::new(5)).unwrap();
        assert_eq!(mine, vec![(e1, BallotStatus::Cast), (e2, BallotStatus::Available)]);

        let all = store.ballots_for_election(e1).unwrap();
        assert_eq!(all.len(), 1100);
        assert_eq!(all[4], (VoterId::new(5), BallotStatus::Cast));
    }

    #[test]
    fn advance_never_moves_backwards() {
        let (_dir, store) = open();
        let e = ElectionId::new(1);
        let v = VoterId::new(1);
        assert!(store.advance_ballot(v, e, BallotStatus::Cast).unwrap_err().is_not_found());

        store.ensure_ballot(v, e, BallotStatus::Available).unwrap();
        assert!(store.advance_ballot(v, e, BallotStatus::ResultsVisible).unwrap());
        assert!(!store.advance_ballot(v, e, BallotStatus::Cast).unwrap());
        assert!(!store.advance_ballot(v, e, BallotStatus::ResultsVisible).unwrap());
        assert_eq!(store.get_ballot(v, e).unwrap(), Some(BallotStatus::ResultsVisible));
    }

    #[test]
    fn reopening_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LmdbStore::open(dir.path(), 1 << 24).unwrap();
            let (e, c) = election(1);
            store.insert_election(&e, &c).unwrap();
        }
        let store = LmdbStore::open(dir.path(), 1 << 24).unwrap();
        assert_eq!(store.get_election(ElectionId::new(1)).unwrap().name, "election 1");
    }
}
