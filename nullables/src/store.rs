//! Nullable store: thread-safe in-memory storage for testing.

use ballot_store::{BallotStore, CandidateStore, ElectionStore, StoreError, VoterStore};
use ballot_types::{
    BallotStatus, Candidate, CandidateId, Election, ElectionId, ElectionStatus, Voter, VoterId,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    next_election: u64,
    elections: BTreeMap<ElectionId, Election>,
    candidates: BTreeMap<(ElectionId, CandidateId), Candidate>,
    ballots: BTreeMap<(VoterId, ElectionId), BallotStatus>,
    voters: BTreeMap<VoterId, Voter>,
    failing_voters: HashSet<VoterId>,
}

/// An in-memory implementation of every store trait.
///
/// All tables sit behind one mutex, so each trait call is atomic.
/// Ballot writes for selected voters can be made to fail.
pub struct NullStore {
    tables: Mutex<Tables>,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                next_election: 1,
                ..Tables::default()
            }),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("null store mutex poisoned".into()))
    }

    /// Make every ballot write for `voter` fail with a backend error.
    pub fn fail_ballot_writes_for(&self, voter: VoterId) {
        if let Ok(mut t) = self.tables() {
            t.failing_voters.insert(voter);
        }
    }

    /// Undo [`fail_ballot_writes_for`](Self::fail_ballot_writes_for).
    pub fn heal_ballot_writes_for(&self, voter: VoterId) {
        if let Ok(mut t) = self.tables() {
            t.failing_voters.remove(&voter);
        }
    }

    /// Write a ballot row unconditionally, bypassing the forward-only rule.
    pub fn force_ballot(&self, voter: VoterId, election: ElectionId, status: BallotStatus) {
        if let Ok(mut t) = self.tables() {
            t.ballots.insert((voter, election), status);
        }
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

fn check_writable(t: &Tables, voter: VoterId) -> Result<(), StoreError> {
    if t.failing_voters.contains(&voter) {
        return Err(StoreError::Backend(format!(
            "injected ballot write failure for voter {voter}"
        )));
    }
    Ok(())
}

impl ElectionStore for NullStore {
    fn allocate_election_id(&self) -> Result<ElectionId, StoreError> {
        let mut t = self.tables()?;
        let id = ElectionId::new(t.next_election);
        t.next_election += 1;
        Ok(id)
    }

    fn insert_election(
        &self,
        election: &Election,
        candidates: &[Candidate],
    ) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if t.elections.contains_key(&election.id) {
            return Err(StoreError::Duplicate(format!("election {}", election.id)));
        }
        t.elections.insert(election.id, election.clone());
        for candidate in candidates {
            t.candidates
                .insert((election.id, candidate.id), candidate.clone());
        }
        Ok(())
    }

    fn get_election(&self, id: ElectionId) -> Result<Election, StoreError> {
        self.tables()?
            .elections
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("election {id}")))
    }

    fn iter_elections(&self) -> Result<Vec<Election>, StoreError> {
        Ok(self.tables()?.elections.values().cloned().collect())
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
        let mut t = self.tables()?;
        let election = t
            .elections
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("election {id}")))?;
        if election.status != from {
            return Ok(false);
        }
        election.status = to;
        Ok(true)
    }
}

impl CandidateStore for NullStore {
    fn get_candidates(&self, election: ElectionId) -> Result<Vec<Candidate>, StoreError> {
        Ok(self
            .tables()?
            .candidates
            .range((election, CandidateId::new(0))..=(election, CandidateId::new(u32::MAX)))
            .map(|(_, c)| c.clone())
            .collect())
    }

    fn set_counts(
        &self,
        election: ElectionId,
        counts: &BTreeMap<CandidateId, u64>,
    ) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if let Some(missing) = counts
            .keys()
            .find(|id| !t.candidates.contains_key(&(election, **id)))
        {
            return Err(StoreError::NotFound(format!(
                "candidate {missing} in election {election}"
            )));
        }
        for (id, votes) in counts {
            if let Some(candidate) = t.candidates.get_mut(&(election, *id)) {
                candidate.votes = *votes;
            }
        }
        Ok(())
    }
}

impl BallotStore for NullStore {
    fn ensure_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
        status: BallotStatus,
    ) -> Result<bool, StoreError> {
        let mut t = self.tables()?;
        check_writable(&t, voter)?;
        if t.ballots.contains_key(&(voter, election)) {
            return Ok(false);
        }
        t.ballots.insert((voter, election), status);
        Ok(true)
    }

    fn get_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
    ) -> Result<Option<BallotStatus>, StoreError> {
        Ok(self.tables()?.ballots.get(&(voter, election)).copied())
    }

    fn compare_and_set_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
        expected: BallotStatus,
        new: BallotStatus,
    ) -> Result<bool, StoreError> {
        let mut t = self.tables()?;
        check_writable(&t, voter)?;
        match t.ballots.get_mut(&(voter, election)) {
            Some(current) if *current == expected => {
                *current = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn advance_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
        to: BallotStatus,
    ) -> Result<bool, StoreError> {
        let mut t = self.tables()?;
        check_writable(&t, voter)?;
        let current = t.ballots.get_mut(&(voter, election)).ok_or_else(|| {
            StoreError::NotFound(format!("ballot of voter {voter} in election {election}"))
        })?;
        if !current.can_advance_to(to) {
            return Ok(false);
        }
        *current = to;
        Ok(true)
    }

    fn ballots_for_voter(
        &self,
        voter: VoterId,
    ) -> Result<Vec<(ElectionId, BallotStatus)>, StoreError> {
        Ok(self
            .tables()?
            .ballots
            .range((voter, ElectionId::new(0))..=(voter, ElectionId::new(u64::MAX)))
            .map(|((_, election), status)| (*election, *status))
            .collect())
    }

    fn ballots_for_election(
        &self,
        election: ElectionId,
    ) -> Result<Vec<(VoterId, BallotStatus)>, StoreError> {
        Ok(self
            .tables()?
            .ballots
            .iter()
            .filter(|((_, e), _)| *e == election)
            .map(|((voter, _), status)| (*voter, *status))
            .collect())
    }
}

impl VoterStore for NullStore {
    fn insert_voter(&self, voter: &Voter) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if t.voters.contains_key(&voter.id) {
            return Err(StoreError::Duplicate(format!("voter {}", voter.id)));
        }
        t.voters.insert(voter.id, voter.clone());
        Ok(())
    }

    fn get_voter(&self, id: VoterId) -> Result<Voter, StoreError> {
        self.tables()?
            .voters
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("voter {id}")))
    }

    fn voter_exists(&self, id: VoterId) -> Result<bool, StoreError> {
        Ok(self.tables()?.voters.contains_key(&id))
    }

    fn iter_voters(&self) -> Result<Vec<Voter>, StoreError> {
        Ok(self.tables()?.voters.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_types::{Timestamp, VoterRole};

    fn election(id: u64, start: u64) -> Election {
        Election {
            id: ElectionId::new(id),
            name: format!("election {id}"),
            start_time: Timestamp::new(start),
            end_time: Timestamp::new(start + 100),
            status: ElectionStatus::Open,
        }
    }

    fn candidate(election: u64, id: u32) -> Candidate {
        Candidate {
            election_id: ElectionId::new(election),
            id: CandidateId::new(id),
            name: format!("candidate {id}"),
            party: "independent".into(),
            votes: 0,
        }
    }

    #[test]
    fn set_counts_is_all_or_nothing() {
        let store = NullStore::new();
        store
            .insert_election(&election(1, 0), &[candidate(1, 1), candidate(1, 2)])
            .unwrap();

        let mut counts = BTreeMap::new();
        counts.insert(CandidateId::new(1), 5);
        counts.insert(CandidateId::new(9), 1);
        assert!(store.set_counts(ElectionId::new(1), &counts).is_err());
        let candidates = store.get_candidates(ElectionId::new(1)).unwrap();
        assert!(candidates.iter().all(|c| c.votes == 0));
    }

    #[test]
    fn transition_is_compare_and_set() {
        let store = NullStore::new();
        store.insert_election(&election(1, 0), &[]).unwrap();
        let id = ElectionId::new(1);
        assert!(store
            .transition_status(id, ElectionStatus::Open, ElectionStatus::ClosedPendingFinalize)
            .unwrap());
        assert!(!store
            .transition_status(id, ElectionStatus::Open, ElectionStatus::ClosedPendingFinalize)
            .unwrap());
    }

    #[test]
    fn completed_election_never_moves_back() {
        let store = NullStore::new();
        store.insert_election(&election(1, 0), &[]).unwrap();
        let id = ElectionId::new(1);
        store
            .transition_status(id, ElectionStatus::Open, ElectionStatus::ClosedPendingFinalize)
            .unwrap();
        store
            .transition_status(id, ElectionStatus::ClosedPendingFinalize, ElectionStatus::Completed)
            .unwrap();

        for back in [ElectionStatus::Open, ElectionStatus::ClosedPendingFinalize] {
            assert!(matches!(
                store.transition_status(id, ElectionStatus::Completed, back),
                Err(StoreError::IllegalTransition { .. })
            ));
        }
        assert_eq!(store.get_election(id).unwrap().status, ElectionStatus::Completed);
    }

    #[test]
    fn elections_with_status_ordered_by_start() {
        let store = NullStore::new();
        store.insert_election(&election(1, 50), &[]).unwrap();
        store.insert_election(&election(2, 10), &[]).unwrap();
        let open = store.elections_with_status(ElectionStatus::Open).unwrap();
        let ids: Vec<u64> = open.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn ensure_ballot_is_idempotent() {
        let store = NullStore::new();
        let (v, e) = (VoterId::new(1), ElectionId::new(1));
        assert!(store.ensure_ballot(v, e, BallotStatus::Available).unwrap());
        store.advance_ballot(v, e, BallotStatus::Cast).unwrap();
        assert!(!store.ensure_ballot(v, e, BallotStatus::Available).unwrap());
        assert_eq!(store.get_ballot(v, e).unwrap(), Some(BallotStatus::Cast));
    }

    #[test]
    fn injected_failures_are_per_voter() {
        let store = NullStore::new();
        let e = ElectionId::new(1);
        store.fail_ballot_writes_for(VoterId::new(2));
        assert!(store.ensure_ballot(VoterId::new(1), e, BallotStatus::Available).is_ok());
        assert!(store.ensure_ballot(VoterId::new(2), e, BallotStatus::Available).is_err());
        store.heal_ballot_writes_for(VoterId::new(2));
        assert!(store.ensure_ballot(VoterId::new(2), e, BallotStatus::Available).is_ok());
    }

    #[test]
    fn duplicate_voter_rejected() {
        let store = NullStore::new();
        let voter = Voter {
            id: VoterId::new(7),
            name: "Ada".into(),
            role: VoterRole::Voter,
        };
        store.insert_voter(&voter).unwrap();
        assert!(matches!(
            store.insert_voter(&voter),
            Err(StoreError::Duplicate(_))
        ));
    }
}
