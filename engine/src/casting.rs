//! Vote casting path.

use std::sync::Arc;
use std::time::Duration;

use ballot_crypto::VoterHasher;
use ballot_ledger::{with_timeout, LedgerClient, LedgerError};
use ballot_store::VoteStore;
use ballot_types::{
    BallotStatus, CandidateId, Clock, ElectionId, EventIndex, VoteSubmission,
    VoterHash, VoterId,
};
use serde::Serialize;

use crate::locks::{KeyedGates, KeyedLocks};
use crate::{ElectionError, RejectReason};

/// Proof that the ledger accepted a vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CastReceipt {
    pub election_id: ElectionId,
    pub event_index: EventIndex,
    pub voter_hash: VoterHash,
    /// `false` when the ledger accepted the vote but the ballot row could not
    /// be moved to `cast`; the consistency sweep repairs it.
    pub status_recorded: bool,
}

pub struct VoteCaster<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    hasher: VoterHasher,
    clock: Arc<dyn Clock>,
    gates: Arc<KeyedGates<ElectionId>>,
    ballot_locks: Arc<KeyedLocks<(VoterId, ElectionId)>>,
    timeout: Duration,
}

impl<S: VoteStore, L: LedgerClient> VoteCaster<S, L> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<L>,
        hasher: VoterHasher,
        clock: Arc<dyn Clock>,
        gates: Arc<KeyedGates<ElectionId>>,
        ballot_locks: Arc<KeyedLocks<(VoterId, ElectionId)>>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            hasher,
            clock,
            gates,
            ballot_locks,
            timeout,
        }
    }

    /// Cast one vote.
    ///
    /// The status check, the ledger append and the `available → cast` write
    /// all happen under the `(voter, election)` lock and the election's read
    /// gate, so two casts for the same pair cannot both reach the ledger and
    /// no cast overlaps a close or finalize of the same election.
    pub async fn cast(
        &self,
        voter: VoterId,
        election_id: ElectionId,
        candidate: CandidateId,
    ) -> Result<CastReceipt, ElectionError> {
        self.store.get_election(election_id)?;
        if !self
            .store
            .get_candidates(election_id)?
            .iter()
            .any(|c| c.id == candidate)
        {
            return Err(ElectionError::NotFound(format!(
                "candidate {candidate} in election {election_id}"
            )));
        }
        if !self.store.voter_exists(voter)? {
            return Err(ElectionError::NotFound(format!("voter {voter}")));
        }

        let _gate = self.gates.read(election_id).await;
        let _ballot = self.ballot_locks.lock((voter, election_id)).await;

        // Re-read under the gate: a close may have completed while we waited.
        let election = self.store.get_election(election_id)?;
        if !election.status.accepts_votes() {
            return Err(ElectionError::VoteRejected(RejectReason::ElectionNotOpen));
        }
        if election.window_elapsed(self.clock.now()) {
            return Err(ElectionError::VoteRejected(
                RejectReason::VotingWindowClosed,
            ));
        }
        match self.store.get_ballot(voter, election_id)? {
            None => return Err(ElectionError::VoteRejected(RejectReason::NotEligible)),
            Some(BallotStatus::Available) => {}
            Some(_) => return Err(ElectionError::VoteRejected(RejectReason::AlreadyCast)),
        }

        let voter_hash = self.hasher.hash(election_id, voter);
        let submission = VoteSubmission {
            election_id,
            candidate_id: candidate,
            voter_hash,
        };
        let event_index = match with_timeout(self.timeout, self.ledger.append(submission)).await {
            Ok(index) => index,
            Err(e @ LedgerError::DuplicateVote { .. }) => {
                tracing::warn!(election_id = %election_id, voter_hash = %voter_hash, "ledger already holds a vote for this voter");
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(election_id = %election_id, ledger = self.ledger.name(), error = %e, "vote submission failed");
                return Err(e.into());
            }
        };

        let status_recorded = match self.store.compare_and_set_ballot(
            voter,
            election_id,
            BallotStatus::Available,
            BallotStatus::Cast,
        ) {
            Ok(true) => true,
            Ok(false) => {
                tracing::error!(election_id = %election_id, event_index = %event_index, "ballot row changed under lock after ledger accepted the vote");
                false
            }
            Err(e) => {
                tracing::error!(election_id = %election_id, event_index = %event_index, error = %e, "ledger accepted the vote but the ballot row was not updated");
                false
            }
        };

        tracing::info!(
            election_id = %election_id,
            candidate_id = %candidate,
            event_index = %event_index,
            "vote cast"
        );

        Ok(CastReceipt {
            election_id,
            event_index,
            voter_hash,
            status_recorded,
        })
    }
}
