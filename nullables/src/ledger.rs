//! Nullable ledger: an in-memory append-only event log with fault injection.

use ballot_ledger::{LedgerClient, LedgerError};
use ballot_types::{
    ElectionId, EventIndex, Timestamp, VoteEvent, VoteSubmission, VoterHash,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct LogState {
    events: Vec<VoteEvent>,
    seen: HashSet<(ElectionId, VoterHash)>,
}

/// An in-memory ledger for testing.
///
/// Behaves like a well-formed ledger (total order, duplicate rejection) until
/// told otherwise: it can be taken offline, slowed down, or made to lose the
/// acknowledgement of an accepted append.
pub struct NullLedger {
    state: Mutex<LogState>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    drop_next_ack: AtomicBool,
    timestamp: AtomicU64,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogState::default()),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            drop_next_ack: AtomicBool::new(false),
            timestamp: AtomicU64::new(1_000),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, LogState>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Corrupt("null ledger mutex poisoned".into()))
    }

    /// Take the ledger offline (`false`) or bring it back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Accept the next append but report it as unavailable to the caller.
    pub fn drop_next_ack(&self) {
        self.drop_next_ack.store(true, Ordering::SeqCst);
    }

    /// Append an event directly, bypassing duplicate detection.
    ///
    /// Simulates events written by another writer of the same ledger.
    pub fn inject(&self, submission: VoteSubmission) -> EventIndex {
        let mut state = self.state().expect("null ledger state");
        Self::push(&mut state, submission, self.next_timestamp())
    }

    /// Number of events recorded for one election.
    pub fn event_count(&self, election: ElectionId) -> usize {
        self.state()
            .map(|s| s.events.iter().filter(|e| e.election_id == election).count())
            .unwrap_or(0)
    }

    /// Number of events recorded for one voter hash in one election.
    pub fn events_for_voter(&self, election: ElectionId, voter_hash: &VoterHash) -> usize {
        self.state()
            .map(|s| {
                s.events
                    .iter()
                    .filter(|e| e.election_id == election && &e.voter_hash == voter_hash)
                    .count()
            })
            .unwrap_or(0)
    }

    fn next_timestamp(&self) -> Timestamp {
        Timestamp::new(self.timestamp.fetch_add(1, Ordering::SeqCst))
    }

    fn push(state: &mut LogState, submission: VoteSubmission, timestamp: Timestamp) -> EventIndex {
        let index = EventIndex::new(state.events.len() as u64);
        state.seen.insert((submission.election_id, submission.voter_hash));
        state.events.push(VoteEvent {
            election_id: submission.election_id,
            candidate_id: submission.candidate_id,
            voter_hash: submission.voter_hash,
            timestamp,
            index,
        });
        index
    }

    async fn simulate_io(&self) -> Result<(), LedgerError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("null ledger offline".into()));
        }
        Ok(())
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerClient for NullLedger {
    async fn append(&self, submission: VoteSubmission) -> Result<EventIndex, LedgerError> {
        self.simulate_io().await?;
        let timestamp = self.next_timestamp();
        let index = {
            let mut state = self.state()?;
            if state
                .seen
                .contains(&(submission.election_id, submission.voter_hash))
            {
                return Err(LedgerError::DuplicateVote {
                    election: submission.election_id,
                    voter_hash: submission.voter_hash,
                });
            }
            Self::push(&mut state, submission, timestamp)
        };
        if self.drop_next_ack.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("acknowledgement lost".into()));
        }
        Ok(index)
    }

    async fn query_events(&self, election: ElectionId) -> Result<Vec<VoteEvent>, LedgerError> {
        self.simulate_io().await?;
        let state = self.state()?;
        Ok(state
            .events
            .iter()
            .filter(|e| e.election_id == election)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "null"
    }
}
