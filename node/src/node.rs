//! The ballot node: owns the engine and its background tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use ballot_crypto::VoterHasher;
use ballot_engine::{
    CastReceipt, ElectionDetails, ElectionEngine, ElectionError, FinalizeOutcome, SweepReport,
    Tally,
};
use ballot_ledger::LedgerClient;
use ballot_store::VoteStore;
use ballot_store_lmdb::{check_data_dir, ChainReport, IntegrityReport, LmdbStore};
use ballot_types::{
    CandidateId, CandidateSpec, Clock, Election, ElectionId, ElectionStatus, SystemClock,
    Timestamp, VoterId,
};

use crate::config::NodeConfig;
use crate::ledger::LedgerBackend;
use crate::metrics::NodeMetrics;
use crate::scheduler::Scheduler;
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// How long `stop` waits for background tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running ballot node.
///
/// Production nodes use [`BallotNode::open`] (LMDB store plus the configured
/// ledger). Tests assemble one from in-memory parts with
/// [`BallotNode::with_parts`].
pub struct BallotNode<S = LmdbStore, L = LedgerBackend> {
    config: NodeConfig,
    engine: Arc<ElectionEngine<S, L>>,
    metrics: Arc<NodeMetrics>,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownController,
    task_handles: Vec<JoinHandle<()>>,
}

impl BallotNode<LmdbStore, LedgerBackend> {
    /// Open the store and ledger under `config.data_dir`.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let store_dir = config.store_dir();
        check_data_dir(&store_dir).map_err(NodeError::Config)?;
        let store = LmdbStore::open(&store_dir, config.lmdb_map_size)?;
        let ledger = LedgerBackend::open(&config)?;
        tracing::info!(
            data_dir = %config.data_dir.display(),
            ledger = ledger.name(),
            "ballot node storage opened"
        );
        Self::with_parts(config, Arc::new(store), Arc::new(ledger), Arc::new(SystemClock))
    }

    /// Integrity reports for the store and, when local, the vote log.
    pub fn check_integrity(
        &self,
    ) -> Result<(IntegrityReport, Option<IntegrityReport>), NodeError> {
        let store = self.engine.store().check_integrity()?;
        let ledger = self.engine.ledger().check_integrity()?;
        Ok((store, ledger))
    }

    /// Walk the local vote log chain. `None` for an external ledger.
    pub fn verify_ledger(&self) -> Result<Option<ChainReport>, NodeError> {
        self.engine.ledger().verify_chain()
    }

    /// Flush both LMDB environments.
    pub fn sync(&self) -> Result<(), NodeError> {
        self.engine.store().force_sync()?;
        self.engine.ledger().sync()
    }

    /// Stop background tasks, then flush to disk.
    pub async fn shutdown(mut self) -> Result<(), NodeError> {
        let stopped = self.stop().await;
        match self.sync() {
            Ok(()) => tracing::info!("LMDB flushed to disk"),
            Err(e) => tracing::warn!(error = %e, "LMDB force_sync failed"),
        }
        stopped
    }
}

impl<S, L> BallotNode<S, L>
where
    S: VoteStore + 'static,
    L: LedgerClient + 'static,
{
    pub fn with_parts(
        config: NodeConfig,
        store: Arc<S>,
        ledger: Arc<L>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let hasher = VoterHasher::new(config.voter_hash_key.as_bytes())?;
        let engine = Arc::new(ElectionEngine::new(
            store,
            ledger,
            hasher,
            clock.clone(),
            config.engine_config(),
        ));
        Ok(Self {
            config,
            engine,
            metrics: Arc::new(NodeMetrics::new()),
            clock,
            shutdown: ShutdownController::new(),
            task_handles: Vec::new(),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<ElectionEngine<S, L>> {
        &self.engine
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    pub fn is_running(&self) -> bool {
        !self.task_handles.is_empty()
    }

    /// Run a sweep to repair anything a crash left behind, then spawn the
    /// background tasks.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.is_running() {
            return Ok(());
        }
        tracing::info!(ledger = self.engine.ledger().name(), "ballot node starting");

        match self.sweep().await {
            Ok(report) if !report.is_clean() => tracing::warn!(
                repaired = report.repaired.len(),
                conflicts = report.conflicts.len(),
                "startup sweep found inconsistencies"
            ),
            Ok(_) => tracing::info!("startup sweep clean"),
            Err(e) => tracing::warn!(error = %e, "startup sweep failed, the periodic sweep will retry"),
        }

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.metrics),
            Arc::clone(&self.clock),
        ));
        self.task_handles = scheduler.spawn(&self.config, &self.shutdown);
        self.refresh_metrics();
        tracing::info!(tasks = self.task_handles.len(), "ballot node started");
        Ok(())
    }

    /// Signal every task and wait for them, bounded by a timeout.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("ballot node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(timeout = ?SHUTDOWN_TIMEOUT, "some tasks did not stop in time");
            return Err(NodeError::ShutdownTimeout);
        }

        self.refresh_metrics();
        tracing::info!("ballot node stopped");
        Ok(())
    }

    /// Update the election gauges from the store.
    pub fn refresh_metrics(&self) {
        let gauges = [
            (ElectionStatus::Open, &self.metrics.open_elections),
            (
                ElectionStatus::ClosedPendingFinalize,
                &self.metrics.pending_finalize_elections,
            ),
            (ElectionStatus::Completed, &self.metrics.completed_elections),
        ];
        for (status, gauge) in gauges {
            match self.engine.list_by_status(status) {
                Ok(elections) => gauge.set(elections.len() as i64),
                Err(e) => tracing::warn!(status = %status, error = %e, "failed to refresh gauge"),
            }
        }
    }

    // ── Metered operations ──────────────────────────────────────────────

    pub fn create_election(
        &self,
        name: &str,
        end_time: Timestamp,
        candidates: &[CandidateSpec],
    ) -> Result<ElectionDetails, ElectionError> {
        let details = self.engine.create_election(name, end_time, candidates)?;
        self.metrics.elections_created.inc();
        self.metrics.open_elections.inc();
        Ok(details)
    }

    pub async fn cast_vote(
        &self,
        voter: VoterId,
        election: ElectionId,
        candidate: CandidateId,
    ) -> Result<CastReceipt, ElectionError> {
        match self.engine.cast_vote(voter, election, candidate).await {
            Ok(receipt) => {
                self.metrics.votes_cast.inc();
                Ok(receipt)
            }
            Err(e) => {
                if matches!(e, ElectionError::VoteRejected(_)) {
                    self.metrics.votes_rejected.inc();
                }
                Err(e)
            }
        }
    }

    pub async fn reconcile(&self, election: ElectionId) -> Result<Tally, ElectionError> {
        let result = self.engine.reconcile(election).await;
        match &result {
            Ok(_) => self.metrics.reconcile_passes.inc(),
            Err(_) => self.metrics.reconcile_failures.inc(),
        }
        result
    }

    pub async fn close_election(&self, id: ElectionId) -> Result<Election, ElectionError> {
        let before = self.engine.get_election(id)?.status;
        let election = self.engine.close_election(id).await?;
        if before == ElectionStatus::Open {
            self.metrics.elections_closed.inc();
        }
        self.refresh_metrics();
        Ok(election)
    }

    pub async fn finalize(&self, id: ElectionId) -> Result<FinalizeOutcome, ElectionError> {
        let outcome = self.engine.finalize(id).await;
        match &outcome {
            Ok(outcome) => {
                if !outcome.already_completed {
                    self.metrics.elections_finalized.inc();
                    self.metrics.reconcile_passes.inc();
                }
                self.metrics
                    .fanout_failures
                    .inc_by(outcome.fan_out.failed.len() as u64);
            }
            Err(_) => self.metrics.reconcile_failures.inc(),
        }
        self.refresh_metrics();
        outcome
    }

    pub async fn sweep(&self) -> Result<SweepReport, ElectionError> {
        let report = self.engine.sweep().await?;
        self.metrics.sweep_repairs.inc_by(report.repaired.len() as u64);
        self.metrics
            .sweep_conflicts
            .inc_by(report.conflicts.len() as u64);
        self.metrics
            .fanout_failures
            .inc_by(report.fan_out_failures as u64);
        Ok(report)
    }
}
