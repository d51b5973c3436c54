//! Exponential backoff for finalization retries.
//!
//! An election whose finalize attempt failed with a transient error is
//! retried after an interval that doubles on every failure, up to a cap.
//! Retries never stop: finalization is retried until it succeeds.

use std::collections::HashMap;

use ballot_types::ElectionId;

/// Initial retry interval (ms).
pub const DEFAULT_INITIAL_MS: u64 = 1_000;
/// Maximum retry interval (ms).
pub const DEFAULT_MAX_MS: u64 = 60_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RetryEntry {
    attempts: u32,
    next_attempt_ms: u64,
    interval_ms: u64,
}

pub struct FinalizeBackoff {
    entries: HashMap<ElectionId, RetryEntry>,
    initial_ms: u64,
    max_ms: u64,
}

impl FinalizeBackoff {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        let initial_ms = initial_ms.max(1);
        Self {
            entries: HashMap::new(),
            initial_ms,
            max_ms: max_ms.max(initial_ms),
        }
    }

    pub fn with_default() -> Self {
        Self::new(DEFAULT_INITIAL_MS, DEFAULT_MAX_MS)
    }

    /// Whether `election` may be attempted at `now_ms`. Untracked elections
    /// are always due.
    pub fn is_due(&self, election: ElectionId, now_ms: u64) -> bool {
        self.entries
            .get(&election)
            .map_or(true, |e| now_ms >= e.next_attempt_ms)
    }

    /// Record a failed attempt and schedule the next one.
    pub fn record_failure(&mut self, election: ElectionId, now_ms: u64) -> u64 {
        let initial = self.initial_ms;
        let max = self.max_ms;
        let entry = self.entries.entry(election).or_insert(RetryEntry {
            attempts: 0,
            next_attempt_ms: now_ms,
            interval_ms: initial,
        });
        entry.attempts += 1;
        entry.next_attempt_ms = now_ms.saturating_add(entry.interval_ms);
        let scheduled = entry.next_attempt_ms;
        entry.interval_ms = entry.interval_ms.saturating_mul(2).min(max);
        scheduled
    }

    /// Forget an election after it finalized.
    pub fn record_success(&mut self, election: ElectionId) {
        self.entries.remove(&election);
    }

    pub fn attempts(&self, election: ElectionId) -> u32 {
        self.entries.get(&election).map_or(0, |e| e.attempts)
    }

    pub fn next_attempt_ms(&self, election: ElectionId) -> Option<u64> {
        self.entries.get(&election).map(|e| e.next_attempt_ms)
    }

    /// Drop entries for elections no longer pending.
    pub fn retain_pending(&mut self, pending: &[ElectionId]) {
        self.entries.retain(|id, _| pending.contains(id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
