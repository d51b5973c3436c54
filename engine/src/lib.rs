//! Election engine.
//!
//! Ties the election registry, the candidate and ballot projections, the
//! tally reconciler, the lifecycle controller, the vote-casting path and the
//! consistency sweep together over one store and one ledger client.
//!
//! ```text
//! cast ──► ledger.append ──► ballot: available → cast
//!                │
//! reconcile ◄────┘ query_events ──► candidate counts (atomic overwrite)
//!
//! close ──► closed-pending-finalize ──► finalize: reconcile → completed → fan-out
//! ```

pub mod backoff;
pub mod ballots;
pub mod casting;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod projection;
pub mod reconciler;
pub mod registry;
pub mod results;
pub mod sweep;

pub use backoff::FinalizeBackoff;
pub use ballots::{BallotProjection, FanOutReport, VoterBallot};
pub use casting::{CastReceipt, VoteCaster};
pub use error::{ElectionError, RejectReason};
pub use lifecycle::{FinalizeOutcome, LifecycleController};
pub use locks::{KeyedGates, KeyedLocks};
pub use projection::CandidateProjection;
pub use reconciler::{compute_tally, Tally, TallyReconciler};
pub use registry::{ElectionDetails, ElectionRegistry};
pub use results::ElectionResults;
pub use sweep::{ConsistencySweep, SweepConflict, SweepReport};

use std::sync::Arc;
use std::time::Duration;

use ballot_crypto::VoterHasher;
use ballot_ledger::LedgerClient;
use ballot_store::VoteStore;
use ballot_types::{
    BallotStatus, CandidateId, CandidateSpec, Clock, Election, ElectionId, ElectionStatus,
    Timestamp, Voter, VoterId,
};

/// Tunables of the engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound for every ledger call.
    pub ledger_timeout: Duration,
    /// Attempts per voter when publishing results.
    pub fanout_attempts: u32,
    /// Delay before the first fan-out retry; doubles per attempt.
    pub fanout_retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger_timeout: Duration::from_secs(5),
            fanout_attempts: 3,
            fanout_retry_delay: Duration::from_millis(50),
        }
    }
}

pub struct ElectionEngine<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    registry: ElectionRegistry<S>,
    ballots: Arc<BallotProjection<S>>,
    reconciler: Arc<TallyReconciler<S, L>>,
    lifecycle: LifecycleController<S, L>,
    caster: VoteCaster<S, L>,
    sweep: ConsistencySweep<S, L>,
}

impl<S: VoteStore, L: LedgerClient> ElectionEngine<S, L> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<L>,
        hasher: VoterHasher,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let gates = Arc::new(KeyedGates::new());
        let ballot_locks = Arc::new(KeyedLocks::new());
        let ballots = Arc::new(BallotProjection::new(
            store.clone(),
            config.fanout_attempts,
            config.fanout_retry_delay,
        ));
        let reconciler = Arc::new(TallyReconciler::new(
            store.clone(),
            ledger.clone(),
            config.ledger_timeout,
        ));
        let lifecycle = LifecycleController::new(
            store.clone(),
            reconciler.clone(),
            ballots.clone(),
            gates.clone(),
            clock.clone(),
        );
        let caster = VoteCaster::new(
            store.clone(),
            ledger.clone(),
            hasher.clone(),
            clock.clone(),
            gates,
            ballot_locks.clone(),
            config.ledger_timeout,
        );
        let sweep = ConsistencySweep::new(
            store.clone(),
            ledger.clone(),
            hasher,
            ballots.clone(),
            ballot_locks,
            config.ledger_timeout,
        );
        Self {
            registry: ElectionRegistry::new(store.clone(), clock),
            store,
            ledger,
            ballots,
            reconciler,
            lifecycle,
            caster,
            sweep,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Create an election and give every voter an `available` ballot.
    ///
    /// The election is committed before the fan-out; if the fan-out fails
    /// part-way the sweep finishes it.
    pub fn create_election(
        &self,
        name: &str,
        end_time: Timestamp,
        candidates: &[CandidateSpec],
    ) -> Result<ElectionDetails, ElectionError> {
        let details = self.registry.create(name, end_time, candidates)?;
        if let Err(e) = self.ballots.fan_out_available(details.election.id) {
            tracing::warn!(election_id = %details.election.id, error = %e, "ballot fan-out interrupted, the sweep will resume it");
        }
        Ok(details)
    }

    pub fn get_election(&self, id: ElectionId) -> Result<Election, ElectionError> {
        self.registry.get(id)
    }

    pub fn list_by_status(&self, status: ElectionStatus) -> Result<Vec<Election>, ElectionError> {
        self.registry.list_by_status(status)
    }

    pub fn list_elections(&self) -> Result<Vec<Election>, ElectionError> {
        self.registry.list_all()
    }

    pub fn election_details(&self, id: ElectionId) -> Result<ElectionDetails, ElectionError> {
        self.registry.details(id)
    }

    pub fn register_voter(&self, voter: &Voter) -> Result<usize, ElectionError> {
        self.ballots.register_voter(voter)
    }

    pub fn get_voter(&self, id: VoterId) -> Result<Voter, ElectionError> {
        self.ballots.get_voter(id)
    }

    pub fn list_voters(&self) -> Result<Vec<Voter>, ElectionError> {
        self.ballots.list_voters()
    }

    pub fn ballot_status(
        &self,
        voter: VoterId,
        election: ElectionId,
    ) -> Result<Option<BallotStatus>, ElectionError> {
        self.ballots.status(voter, election)
    }

    pub fn voter_ballots(&self, voter: VoterId) -> Result<Vec<VoterBallot>, ElectionError> {
        self.ballots.voter_ballots(voter)
    }

    pub async fn cast_vote(
        &self,
        voter: VoterId,
        election: ElectionId,
        candidate: CandidateId,
    ) -> Result<CastReceipt, ElectionError> {
        self.caster.cast(voter, election, candidate).await
    }

    pub async fn reconcile(&self, election: ElectionId) -> Result<Tally, ElectionError> {
        self.reconciler.reconcile(election).await
    }

    pub async fn close_election(&self, id: ElectionId) -> Result<Election, ElectionError> {
        self.lifecycle.close(id).await
    }

    pub async fn close_expired(&self) -> Result<Vec<ElectionId>, ElectionError> {
        self.lifecycle.close_expired().await
    }

    pub async fn finalize(&self, id: ElectionId) -> Result<FinalizeOutcome, ElectionError> {
        self.lifecycle.finalize(id).await
    }

    pub async fn end_election(&self, id: ElectionId) -> Result<FinalizeOutcome, ElectionError> {
        self.lifecycle.end_election(id).await
    }

    pub fn pending_finalize(&self) -> Result<Vec<Election>, ElectionError> {
        self.lifecycle.pending_finalize()
    }

    pub fn results(&self, id: ElectionId) -> Result<ElectionResults, ElectionError> {
        results::results(self.store.as_ref(), id)
    }

    pub async fn sweep(&self) -> Result<SweepReport, ElectionError> {
        self.sweep.run().await
    }
}
