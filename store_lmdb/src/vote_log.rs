//! Durable, hash-chained, append-only vote log on LMDB.
//!
//! Serves as the ledger for single-node deployments. Events get a global,
//! strictly increasing index; each stored event carries the Blake2b chain
//! link over its predecessor, so any edit to a persisted event is detected by
//! [`LmdbVoteLog::verify_chain`].

use std::path::Path;
use std::sync::Arc;

use ballot_crypto::chain_link;
use ballot_ledger::{LedgerClient, LedgerError};
use ballot_types::{
    ChainHash, Clock, ElectionId, EventIndex, SystemClock, VoteEvent, VoteSubmission,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};

use crate::keys::{dedup_key, election_key, event_key, read_u64};
use crate::LmdbError;

const MAX_DBS: u32 = 8;
const META_HEAD: &[u8] = b"head";

/// Database names owned by the vote log.
pub const LOG_DATABASES: &[&str] = &["vote_events", "vote_dedup", "vote_order", "vote_meta"];

#[derive(Serialize, Deserialize)]
struct StoredEvent {
    event: VoteEvent,
    chain: ChainHash,
}

/// Latest appended index and chain hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Head {
    index: u64,
    chain: ChainHash,
}

impl Head {
    const GENESIS: Self = Self {
        index: 0,
        chain: ChainHash::ZERO,
    };

    fn encode(&self) -> [u8; 40] {
        let mut out = [0u8; 40];
        out[..8].copy_from_slice(&self.index.to_be_bytes());
        out[8..].copy_from_slice(self.chain.as_bytes());
        out
    }

    fn decode(raw: &[u8]) -> Result<Self, LmdbError> {
        if raw.len() != 40 {
            return Err(LmdbError::Corruption("vote log head length".into()));
        }
        let index = read_u64(&raw[..8])
            .ok_or_else(|| LmdbError::Corruption("vote log head index".into()))?;
        let mut chain = [0u8; 32];
        chain.copy_from_slice(&raw[8..]);
        Ok(Self {
            index,
            chain: ChainHash::new(chain),
        })
    }
}

/// Outcome of walking the whole chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainReport {
    pub events: u64,
    pub head: ChainHash,
    /// First index whose stored link does not match the recomputed one.
    pub broken_at: Option<EventIndex>,
    /// Events referenced by the order table but missing from the event table.
    pub missing: Vec<EventIndex>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.broken_at.is_none() && self.missing.is_empty()
    }
}

pub struct LmdbVoteLog {
    env: Arc<Env>,
    events_db: Database<Bytes, Bytes>,
    dedup_db: Database<Bytes, Bytes>,
    order_db: Database<Bytes, Bytes>,
    meta_db: Database<Bytes, Bytes>,
    clock: Arc<dyn Clock>,
}

impl LmdbVoteLog {
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        Self::open_with_clock(path, map_size, Arc::new(SystemClock))
    }

    /// Open with an injected clock for event timestamps.
    pub fn open_with_clock(
        path: &Path,
        map_size: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: one environment per path per process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)
        }?;

        let mut wtxn = env.write_txn()?;
        let events_db = env.create_database(&mut wtxn, Some("vote_events"))?;
        let dedup_db = env.create_database(&mut wtxn, Some("vote_dedup"))?;
        let order_db = env.create_database(&mut wtxn, Some("vote_order"))?;
        let meta_db = env.create_database(&mut wtxn, Some("vote_meta"))?;
        wtxn.commit()?;

        tracing::info!(path = %path.display(), "opened LMDB vote log");

        Ok(Self {
            env: Arc::new(env),
            events_db,
            dedup_db,
            order_db,
            meta_db,
            clock,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// Flush dirty pages to disk.
    pub fn force_sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync().map_err(LmdbError::from)
    }

    fn read_head(&self, txn: &heed::RoTxn) -> Result<Head, LmdbError> {
        match self.meta_db.get(txn, META_HEAD)? {
            Some(raw) => Head::decode(raw),
            None => Ok(Head::GENESIS),
        }
    }

    /// Append one submission. Duplicate `(election, voter hash)` pairs are
    /// rejected inside the same write transaction that would store the event.
    pub fn append_event(&self, submission: VoteSubmission) -> Result<VoteEvent, LedgerError> {
        let dkey = dedup_key(submission.election_id, &submission.voter_hash);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        if self
            .dedup_db
            .get(&wtxn, &dkey)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(LedgerError::DuplicateVote {
                election: submission.election_id,
                voter_hash: submission.voter_hash,
            });
        }

        let head = self.read_head(&wtxn)?;
        let index = EventIndex::new(head.index + 1);
        let event = VoteEvent {
            election_id: submission.election_id,
            candidate_id: submission.candidate_id,
            voter_hash: submission.voter_hash,
            timestamp: self.clock.now(),
            index,
        };
        let chain = chain_link(&head.chain, &event);
        let stored = StoredEvent {
            event: event.clone(),
            chain,
        };
        let bytes = bincode::serialize(&stored).map_err(LmdbError::from)?;

        self.events_db
            .put(&mut wtxn, &event_key(event.election_id, index), &bytes)
            .map_err(LmdbError::from)?;
        self.dedup_db
            .put(&mut wtxn, &dkey, &index.to_be_bytes())
            .map_err(LmdbError::from)?;
        self.order_db
            .put(
                &mut wtxn,
                &index.to_be_bytes(),
                &election_key(event.election_id),
            )
            .map_err(LmdbError::from)?;
        let new_head = Head {
            index: index.get(),
            chain,
        };
        self.meta_db
            .put(&mut wtxn, META_HEAD, &new_head.encode())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(
            election = %event.election_id,
            index = %index,
            "vote event appended"
        );
        Ok(event)
    }

    /// All events of one election in index order.
    pub fn events_for(&self, election: ElectionId) -> Result<Vec<VoteEvent>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let prefix = election_key(election);
        let mut events = Vec::new();
        for result in self.events_db.prefix_iter(&rtxn, &prefix)? {
            let (_key, val) = result?;
            let stored: StoredEvent = bincode::deserialize(val)?;
            events.push(stored.event);
        }
        Ok(events)
    }

    /// Total number of events across all elections.
    pub fn event_count(&self) -> Result<u64, LmdbError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.read_head(&rtxn)?.index)
    }

    pub fn head(&self) -> Result<ChainHash, LmdbError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.read_head(&rtxn)?.chain)
    }

    /// Recompute every chain link in global order and compare with what is
    /// stored, then compare the final link with the recorded head.
    pub fn verify_chain(&self) -> Result<ChainReport, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let head = self.read_head(&rtxn)?;
        let mut running = ChainHash::ZERO;
        let mut events = 0u64;
        let mut broken_at = None;
        let mut missing = Vec::new();

        for result in self.order_db.iter(&rtxn)? {
            let (key, val) = result?;
            let index = read_u64(key)
                .map(EventIndex::new)
                .ok_or_else(|| LmdbError::Corruption("vote order key length".into()))?;
            let election = read_u64(val)
                .map(ElectionId::new)
                .ok_or_else(|| LmdbError::Corruption("vote order value length".into()))?;

            let Some(raw) = self.events_db.get(&rtxn, &event_key(election, index))? else {
                missing.push(index);
                continue;
            };
            let stored: StoredEvent = bincode::deserialize(raw)?;
            events += 1;
            if broken_at.is_some() {
                continue;
            }
            let expected = chain_link(&running, &stored.event);
            if stored.event.index != index || expected != stored.chain {
                broken_at = Some(index);
                continue;
            }
            running = expected;
        }

        if broken_at.is_none() && missing.is_empty() && running != head.chain {
            broken_at = Some(EventIndex::new(head.index));
        }

        if broken_at.is_some() || !missing.is_empty() {
            tracing::warn!(
                broken_at = ?broken_at,
                missing = missing.len(),
                "vote log chain verification failed"
            );
        }

        Ok(ChainReport {
            events,
            head: head.chain,
            broken_at,
            missing,
        })
    }

    #[cfg(test)]
    fn overwrite_candidate(&self, election: ElectionId, index: EventIndex, candidate: u32) {
        let key = event_key(election, index);
        let mut wtxn = self.env.write_txn().unwrap();
        let mut stored: StoredEvent =
            bincode::deserialize(self.events_db.get(&wtxn, &key).unwrap().unwrap()).unwrap();
        stored.event.candidate_id = ballot_types::CandidateId::new(candidate);
        let bytes = bincode::serialize(&stored).unwrap();
        self.events_db.put(&mut wtxn, &key, &bytes).unwrap();
        wtxn.commit().unwrap();
    }
}

impl LedgerClient for LmdbVoteLog {
    async fn append(&self, submission: VoteSubmission) -> Result<EventIndex, LedgerError> {
        self.append_event(submission).map(|event| event.index)
    }

    async fn query_events(&self, election: ElectionId) -> Result<Vec<VoteEvent>, LedgerError> {
        Ok(self.events_for(election)?)
    }

    fn name(&self) -> &str {
        "lmdb-vote-log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_types::{CandidateId, Timestamp, VoterHash};

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::new(1_700_000_000)
        }
    }

    fn open() -> (tempfile::TempDir, LmdbVoteLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = LmdbVoteLog::open_with_clock(dir.path(), 1 << 24, Arc::new(FixedClock)).unwrap();
        (dir, log)
    }

    fn submission(election: u64, candidate: u32, voter: u8) -> VoteSubmission {
        VoteSubmission {
            election_id: ElectionId::new(election),
            candidate_id: CandidateId::new(candidate),
            voter_hash: VoterHash::new([voter; 32]),
        }
    }

    #[tokio::test]
    async fn duplicate_hash_is_rejected_per_election() {
        let (_dir, log) = open();
        log.append(submission(1, 1, 9)).await.unwrap();
        let err = log.append(submission(1, 2, 9)).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateVote { .. }));
        // Same voter hash in another election is a different vote.
        log.append(submission(2, 1, 9)).await.unwrap();
        assert_eq!(log.event_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn query_is_per_election_and_ordered() {
        let (_dir, log) = open();
        for (election, voter) in [(1, 1), (2, 2), (1, 3), (1, 4)] {
            log.append(submission(election, 1, voter)).await.unwrap();
        }
        let events = log.query_events(ElectionId::new(1)).await.unwrap();
        let indexes: Vec<u64> = events.iter().map(|e| e.index.get()).collect();
        assert_eq!(indexes, vec![1, 3, 4]);
        assert!(events.iter().all(|e| e.election_id == ElectionId::new(1)));
        assert_eq!(events, log.query_events(ElectionId::new(1)).await.unwrap());
    }

    #[test]
    fn chain_verifies_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let head = {
            let log = LmdbVoteLog::open(dir.path(), 1 << 24).unwrap();
            for voter in 0..20 {
                log.append_event(submission(1, 1 + (voter as u32 % 3), voter)).unwrap();
            }
            log.head().unwrap()
        };
        let log = LmdbVoteLog::open(dir.path(), 1 << 24).unwrap();
        let report = log.verify_chain().unwrap();
        assert!(report.is_intact());
        assert_eq!(report.events, 20);
        assert_eq!(report.head, head);

        let next = log.append_event(submission(1, 1, 200)).unwrap();
        assert_eq!(next.index, EventIndex::new(21));
    }

    #[test]
    fn tampering_is_detected() {
        let (_dir, log) = open();
        for voter in 0..5 {
            log.append_event(submission(3, 1, voter)).unwrap();
        }
        log.overwrite_candidate(ElectionId::new(3), EventIndex::new(2), 2);
        let report = log.verify_chain().unwrap();
        assert_eq!(report.broken_at, Some(EventIndex::new(2)));
        assert!(!report.is_intact());
    }

    #[test]
    fn empty_log_is_intact() {
        let (_dir, log) = open();
        let report = log.verify_chain().unwrap();
        assert!(report.is_intact());
        assert_eq!(report.events, 0);
        assert!(report.head.is_zero());
    }
}
