//! Final results of completed elections.

use ballot_store::VoteStore;
use ballot_types::{Candidate, CandidateId, Election, ElectionId, ElectionStatus};
use serde::Serialize;

use crate::ElectionError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ElectionResults {
    pub election: Election,
    /// Candidates ordered by votes descending, then id.
    pub standings: Vec<Candidate>,
    pub total_votes: u64,
    /// Every candidate sharing the top count. Empty when nobody voted.
    pub winners: Vec<CandidateId>,
}

pub fn results<S: VoteStore>(store: &S, id: ElectionId) -> Result<ElectionResults, ElectionError> {
    let election = store.get_election(id)?;
    if election.status != ElectionStatus::Completed {
        return Err(ElectionError::Validation(format!(
            "election {id} is {}, results are only available once completed",
            election.status
        )));
    }

    let mut standings = store.get_candidates(id)?;
    standings.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.id.cmp(&b.id)));
    let total_votes = standings.iter().map(|c| c.votes).sum();
    let top = standings.first().map_or(0, |c| c.votes);
    let winners = if top == 0 {
        Vec::new()
    } else {
        standings
            .iter()
            .take_while(|c| c.votes == top)
            .map(|c| c.id)
            .collect()
    };

    Ok(ElectionResults {
        election,
        standings,
        total_votes,
        winners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_nullables::NullStore;
    use ballot_store::{CandidateStore, ElectionStore};
    use ballot_types::Timestamp;
    use std::collections::BTreeMap;

    fn completed_with(store: &NullStore, counts: &[u64]) -> ElectionId {
        let id = ElectionId::new(1);
        let election = Election {
            id,
            name: "E".into(),
            start_time: Timestamp::new(0),
            end_time: Timestamp::new(10),
            status: ElectionStatus::Completed,
        };
        let candidates: Vec<Candidate> = (1..=counts.len() as u32)
            .map(|n| Candidate {
                election_id: id,
                id: CandidateId::new(n),
                name: format!("c{n}"),
                party: "p".into(),
                votes: 0,
            })
            .collect();
        store.insert_election(&election, &candidates).unwrap();
        let map: BTreeMap<CandidateId, u64> = counts
            .iter()
            .enumerate()
            .map(|(i, c)| (CandidateId::new(i as u32 + 1), *c))
            .collect();
        store.set_counts(id, &map).unwrap();
        id
    }

    #[test]
    fn standings_sorted_with_tied_winners() {
        let store = NullStore::new();
        let id = completed_with(&store, &[2, 5, 5, 1]);
        let results = results(&store, id).unwrap();
        let order: Vec<u32> = results.standings.iter().map(|c| c.id.get()).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
        assert_eq!(results.winners, vec![CandidateId::new(2), CandidateId::new(3)]);
        assert_eq!(results.total_votes, 13);
    }

    #[test]
    fn no_votes_no_winner() {
        let store = NullStore::new();
        let id = completed_with(&store, &[0, 0]);
        assert!(results(&store, id).unwrap().winners.is_empty());
    }

    #[test]
    fn open_election_has_no_results() {
        let store = NullStore::new();
        let id = ElectionId::new(3);
        store
            .insert_election(
                &Election {
                    id,
                    name: "E".into(),
                    start_time: Timestamp::new(0),
                    end_time: Timestamp::new(10),
                    status: ElectionStatus::Open,
                },
                &[],
            )
            .unwrap();
        assert!(matches!(results(&store, id), Err(ElectionError::Validation(_))));
    }
}
