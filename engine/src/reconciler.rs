//! Tally reconciler.
//!
//! Rebuilds an election's candidate counts from the ledger's event history
//! and writes them back in one atomic overwrite. Passes for the same election
//! never overlap; passes for different elections run in parallel.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use ballot_ledger::{with_timeout, LedgerClient};
use ballot_store::VoteStore;
use ballot_types::{Candidate, CandidateId, ElectionId, EventIndex, VoteEvent};
use serde::Serialize;

use crate::locks::KeyedLocks;
use crate::projection::CandidateProjection;
use crate::ElectionError;

/// Authoritative counts computed from the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub election_id: ElectionId,
    /// One entry per candidate of the election, zeros included.
    pub counts: BTreeMap<CandidateId, u64>,
    pub total_votes: u64,
    /// Highest event index observed, if any.
    pub last_event_index: Option<EventIndex>,
}

/// Count `events` against `candidates`.
///
/// Events are counted once per distinct index. An event naming another
/// election or an unknown candidate means the ledger and the candidate table
/// disagree, which is reported instead of silently skipped.
pub fn compute_tally(
    election: ElectionId,
    candidates: &[Candidate],
    events: &[VoteEvent],
) -> Result<Tally, ElectionError> {
    let mut counts: BTreeMap<CandidateId, u64> =
        candidates.iter().map(|c| (c.id, 0)).collect();
    let mut seen: HashSet<EventIndex> = HashSet::with_capacity(events.len());
    let mut last_event_index = None;

    for event in events {
        if event.election_id != election {
            return Err(ElectionError::ReconciliationConflict(format!(
                "event {} belongs to election {}, not {election}",
                event.index, event.election_id
            )));
        }
        if !seen.insert(event.index) {
            continue;
        }
        let Some(count) = counts.get_mut(&event.candidate_id) else {
            return Err(ElectionError::ReconciliationConflict(format!(
                "event {} references unknown candidate {} in election {election}",
                event.index, event.candidate_id
            )));
        };
        *count += 1;
        last_event_index = last_event_index.max(Some(event.index));
    }

    let total_votes = counts.values().sum();
    Ok(Tally {
        election_id: election,
        counts,
        total_votes,
        last_event_index,
    })
}

pub struct TallyReconciler<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    projection: CandidateProjection<S>,
    in_flight: KeyedLocks<ElectionId>,
    timeout: Duration,
}

impl<S: VoteStore, L: LedgerClient> TallyReconciler<S, L> {
    pub fn new(store: Arc<S>, ledger: Arc<L>, timeout: Duration) -> Self {
        Self {
            projection: CandidateProjection::new(store.clone()),
            store,
            ledger,
            in_flight: KeyedLocks::new(),
            timeout,
        }
    }

    /// Recompute and persist the counts of one election.
    ///
    /// On any failure the cached counts are left exactly as they were.
    pub async fn reconcile(&self, election: ElectionId) -> Result<Tally, ElectionError> {
        let _pass = self.in_flight.lock(election).await;

        // Existence check first so an unknown id is NotFound, not an empty tally.
        self.store.get_election(election)?;
        let candidates = self.projection.get_candidates(election)?;

        let events = with_timeout(self.timeout, self.ledger.query_events(election))
            .await
            .map_err(|e| {
                tracing::warn!(election_id = %election, ledger = self.ledger.name(), error = %e, "ledger query failed, keeping cached counts");
                ElectionError::from(e)
            })?;

        let tally = compute_tally(election, &candidates, &events)?;

        for candidate in &candidates {
            let fresh = tally.counts.get(&candidate.id).copied().unwrap_or(0);
            if fresh < candidate.votes {
                tracing::error!(
                    election_id = %election,
                    candidate_id = %candidate.id,
                    cached = candidate.votes,
                    ledger = fresh,
                    "ledger count below cached count"
                );
                return Err(ElectionError::ReconciliationConflict(format!(
                    "candidate {} of election {election}: ledger shows {fresh} votes, cache holds {}",
                    candidate.id, candidate.votes
                )));
            }
        }

        self.projection.set_counts(election, &tally.counts)?;

        tracing::debug!(
            election_id = %election,
            total_votes = tally.total_votes,
            events = events.len(),
            "election reconciled"
        );
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_nullables::{NullLedger, NullStore};
    use ballot_store::{CandidateStore, ElectionStore};
    use ballot_types::{
        Election, ElectionStatus, Timestamp, VoteSubmission, VoterHash,
    };

    fn setup(candidates: u32) -> (Arc<NullStore>, Arc<NullLedger>, TallyReconciler<NullStore, NullLedger>) {
        let store = Arc::new(NullStore::new());
        let ledger = Arc::new(NullLedger::new());
        let election = Election {
            id: ElectionId::new(1),
            name: "E".into(),
            start_time: Timestamp::new(0),
            end_time: Timestamp::new(100),
            status: ElectionStatus::Open,
        };
        let candidates: Vec<Candidate> = (1..=candidates)
            .map(|n| Candidate {
                election_id: election.id,
                id: CandidateId::new(n),
                name: format!("c{n}"),
                party: String::new(),
                votes: 0,
            })
            .collect();
        store.insert_election(&election, &candidates).unwrap();
        let reconciler =
            TallyReconciler::new(store.clone(), ledger.clone(), Duration::from_secs(1));
        (store, ledger, reconciler)
    }

    fn vote(ledger: &NullLedger, candidate: u32, voter: u8) {
        ledger.inject(VoteSubmission {
            election_id: ElectionId::new(1),
            candidate_id: CandidateId::new(candidate),
            voter_hash: VoterHash::new([voter; 32]),
        });
    }

    fn cached(store: &NullStore) -> Vec<u64> {
        store
            .get_candidates(ElectionId::new(1))
            .unwrap()
            .iter()
            .map(|c| c.votes)
            .collect()
    }

    #[tokio::test]
    async fn counts_every_candidate_including_zeros() {
        let (store, ledger, reconciler) = setup(3);
        for voter in 0..3 {
            vote(&ledger, 1, voter);
        }
        vote(&ledger, 2, 10);

        let tally = reconciler.reconcile(ElectionId::new(1)).await.unwrap();
        assert_eq!(tally.total_votes, 4);
        assert_eq!(tally.counts.len(), 3);
        assert_eq!(tally.counts[&CandidateId::new(3)], 0);
        assert_eq!(cached(&store), vec![3, 1, 0]);
    }

    #[tokio::test]
    async fn second_pass_without_new_events_is_identical() {
        let (store, ledger, reconciler) = setup(2);
        vote(&ledger, 2, 1);
        let first = reconciler.reconcile(ElectionId::new(1)).await.unwrap();
        let snapshot = cached(&store);
        let second = reconciler.reconcile(ElectionId::new(1)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(snapshot, cached(&store));
    }

    #[tokio::test]
    async fn outage_keeps_previous_counts() {
        let (store, ledger, reconciler) = setup(2);
        vote(&ledger, 1, 1);
        reconciler.reconcile(ElectionId::new(1)).await.unwrap();
        vote(&ledger, 1, 2);
        ledger.set_available(false);

        let err = reconciler.reconcile(ElectionId::new(1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(cached(&store), vec![1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ledger_times_out() {
        let (_store, ledger, reconciler) = setup(1);
        ledger.set_latency(Duration::from_secs(30));
        let err = reconciler.reconcile(ElectionId::new(1)).await.unwrap_err();
        assert!(matches!(err, ElectionError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn unknown_candidate_is_a_conflict_and_writes_nothing() {
        let (store, ledger, reconciler) = setup(2);
        vote(&ledger, 1, 1);
        vote(&ledger, 7, 2);
        let err = reconciler.reconcile(ElectionId::new(1)).await.unwrap_err();
        assert!(matches!(err, ElectionError::ReconciliationConflict(_)));
        assert_eq!(cached(&store), vec![0, 0]);
    }

    #[tokio::test]
    async fn shrinking_ledger_is_a_conflict() {
        let (store, _ledger, reconciler) = setup(2);
        let mut counts = BTreeMap::new();
        counts.insert(CandidateId::new(1), 5);
        store.set_counts(ElectionId::new(1), &counts).unwrap();

        let err = reconciler.reconcile(ElectionId::new(1)).await.unwrap_err();
        assert!(matches!(err, ElectionError::ReconciliationConflict(_)));
        assert_eq!(cached(&store), vec![5, 0]);
    }

    #[tokio::test]
    async fn unknown_election_is_not_found() {
        let (_store, _ledger, reconciler) = setup(1);
        let err = reconciler.reconcile(ElectionId::new(99)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn duplicate_indexes_count_once() {
        let election = ElectionId::new(1);
        let candidates = vec![Candidate {
            election_id: election,
            id: CandidateId::new(1),
            name: "A".into(),
            party: String::new(),
            votes: 0,
        }];
        let event = VoteEvent {
            election_id: election,
            candidate_id: CandidateId::new(1),
            voter_hash: VoterHash::new([1; 32]),
            timestamp: Timestamp::new(5),
            index: EventIndex::new(4),
        };
        let tally = compute_tally(election, &candidates, &[event.clone(), event]).unwrap();
        assert_eq!(tally.total_votes, 1);
        assert_eq!(tally.last_event_index, Some(EventIndex::new(4)));
    }
}
