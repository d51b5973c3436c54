//! Background lifecycle tasks.
//!
//! Each task is an `interval` loop that `select!`s on the shutdown channel:
//!
//! - **auto-close**: moves open elections past their end time to
//!   `closed-pending-finalize`.
//! - **finalize**: finalizes pending elections, backing off per election on
//!   transient ledger failures.
//! - **reconcile**: refreshes cached counts of open elections.
//! - **sweep**: runs the consistency sweep.
//!
//! One tick of every task is a plain async method so tests can drive it
//! without timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use ballot_engine::{ElectionEngine, FinalizeBackoff, SweepReport};
use ballot_ledger::LedgerClient;
use ballot_store::VoteStore;
use ballot_types::{Clock, ElectionId, ElectionStatus};

use crate::config::NodeConfig;
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;

/// What one finalize tick did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FinalizeTick {
    pub finalized: Vec<ElectionId>,
    /// Elections that failed and were rescheduled.
    pub deferred: Vec<ElectionId>,
    /// Elections skipped because their backoff has not expired.
    pub waiting: Vec<ElectionId>,
}

/// What one reconcile tick did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileTick {
    pub reconciled: usize,
    pub failed: usize,
}

pub struct Scheduler<S, L> {
    engine: Arc<ElectionEngine<S, L>>,
    metrics: Arc<NodeMetrics>,
    clock: Arc<dyn Clock>,
}

impl<S, L> Scheduler<S, L>
where
    S: VoteStore + 'static,
    L: LedgerClient + 'static,
{
    pub fn new(
        engine: Arc<ElectionEngine<S, L>>,
        metrics: Arc<NodeMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            metrics,
            clock,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().as_secs().saturating_mul(1_000)
    }

    pub async fn close_tick(&self) -> Vec<ElectionId> {
        match self.engine.close_expired().await {
            Ok(closed) => {
                self.metrics.elections_closed.inc_by(closed.len() as u64);
                closed
            }
            Err(e) => {
                tracing::warn!(error = %e, "auto-close pass failed");
                Vec::new()
            }
        }
    }

    pub async fn finalize_tick(&self, backoff: &mut FinalizeBackoff) -> FinalizeTick {
        let mut tick = FinalizeTick::default();
        let pending = match self.engine.pending_finalize() {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list pending elections");
                return tick;
            }
        };
        let ids: Vec<ElectionId> = pending.iter().map(|e| e.id).collect();
        backoff.retain_pending(&ids);

        for id in ids {
            let now_ms = self.now_ms();
            if !backoff.is_due(id, now_ms) {
                tick.waiting.push(id);
                continue;
            }
            match self.engine.finalize(id).await {
                Ok(outcome) => {
                    backoff.record_success(id);
                    self.metrics.elections_finalized.inc();
                    self.metrics.reconcile_passes.inc();
                    self.metrics
                        .fanout_failures
                        .inc_by(outcome.fan_out.failed.len() as u64);
                    tick.finalized.push(id);
                }
                Err(e) => {
                    self.metrics.reconcile_failures.inc();
                    let next = backoff.record_failure(id, now_ms);
                    tracing::warn!(
                        election_id = %id,
                        attempts = backoff.attempts(id),
                        next_attempt_ms = next,
                        retryable = e.is_retryable(),
                        error = %e,
                        "finalize deferred"
                    );
                    tick.deferred.push(id);
                }
            }
        }
        tick
    }

    /// Reconcile every open election. Failures are logged and counted.
    pub async fn reconcile_tick(&self) -> ReconcileTick {
        let mut tick = ReconcileTick::default();
        let open = match self.engine.list_by_status(ElectionStatus::Open) {
            Ok(open) => open,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list open elections");
                return tick;
            }
        };
        for election in open {
            match self.engine.reconcile(election.id).await {
                Ok(_) => {
                    self.metrics.reconcile_passes.inc();
                    tick.reconciled += 1;
                }
                Err(e) => {
                    self.metrics.reconcile_failures.inc();
                    tracing::debug!(election_id = %election.id, error = %e, "periodic reconcile skipped");
                    tick.failed += 1;
                }
            }
        }
        tick
    }

    pub async fn sweep_tick(&self) -> Option<SweepReport> {
        match self.engine.sweep().await {
            Ok(report) => {
                self.metrics.sweep_repairs.inc_by(report.repaired.len() as u64);
                self.metrics
                    .sweep_conflicts
                    .inc_by(report.conflicts.len() as u64);
                self.metrics
                    .fanout_failures
                    .inc_by(report.fan_out_failures as u64);
                if !report.is_clean() {
                    tracing::warn!(
                        repaired = report.repaired.len(),
                        conflicts = report.conflicts.len(),
                        ledger_errors = report.ledger_errors,
                        "consistency sweep found issues"
                    );
                }
                Some(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "consistency sweep failed");
                None
            }
        }
    }

    /// Spawn every background task. Handles are returned so the node can
    /// await them on shutdown.
    pub fn spawn(
        self: Arc<Self>,
        config: &NodeConfig,
        shutdown: &ShutdownController,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(4);

        let close_every = Duration::from_secs(config.close_check_interval_secs.max(1));
        let reconcile_every = Duration::from_secs(config.reconcile_interval_secs.max(1));
        let sweep_every = Duration::from_secs(config.sweep_interval_secs.max(1));
        let backoff_initial = config.finalize_backoff_initial_ms;
        let backoff_max = config.finalize_backoff_max_ms;

        // Auto-close and finalize share a cadence.
        {
            let scheduler = Arc::clone(&self);
            let mut shutdown_rx = shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(close_every);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = interval.tick() => {
                            let closed = scheduler.close_tick().await;
                            if !closed.is_empty() {
                                tracing::info!(count = closed.len(), "closed expired elections");
                            }
                        }
                    }
                }
                tracing::debug!("auto-close task stopped");
            }));
        }

        {
            let scheduler = Arc::clone(&self);
            let mut shutdown_rx = shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                let mut backoff = FinalizeBackoff::new(backoff_initial, backoff_max);
                let mut interval = tokio::time::interval(close_every);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = interval.tick() => {
                            scheduler.finalize_tick(&mut backoff).await;
                        }
                    }
                }
                tracing::debug!("finalize task stopped");
            }));
        }

        {
            let scheduler = Arc::clone(&self);
            let mut shutdown_rx = shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(reconcile_every);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = interval.tick() => {
                            scheduler.reconcile_tick().await;
                        }
                    }
                }
                tracing::debug!("reconcile task stopped");
            }));
        }

        {
            let scheduler = self;
            let mut shutdown_rx = shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweep_every);
                // The first tick fires immediately; skip it so startup is not
                // dominated by a full sweep.
                interval.tick().await;
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = interval.tick() => {
                            scheduler.sweep_tick().await;
                        }
                    }
                }
                tracing::debug!("sweep task stopped");
            }));
        }

        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_crypto::VoterHasher;
    use ballot_engine::EngineConfig;
    use ballot_nullables::{NullClock, NullLedger, NullStore};
    use ballot_types::{CandidateSpec, Timestamp, Voter, VoterId, VoterRole};

    struct Fixture {
        ledger: Arc<NullLedger>,
        clock: Arc<NullClock>,
        engine: Arc<ElectionEngine<NullStore, NullLedger>>,
        metrics: Arc<NodeMetrics>,
        scheduler: Scheduler<NullStore, NullLedger>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(NullStore::new());
        let ledger = Arc::new(NullLedger::new());
        let clock = Arc::new(NullClock::new(1_000));
        let engine = Arc::new(ElectionEngine::new(
            store,
            ledger.clone(),
            VoterHasher::new(b"scheduler-test-key").unwrap(),
            clock.clone(),
            EngineConfig {
                ledger_timeout: Duration::from_millis(200),
                fanout_attempts: 1,
                fanout_retry_delay: Duration::from_millis(1),
            },
        ));
        let metrics = Arc::new(NodeMetrics::new());
        let scheduler = Scheduler::new(engine.clone(), metrics.clone(), clock.clone());
        Fixture {
            ledger,
            clock,
            engine,
            metrics,
            scheduler,
        }
    }

    fn seed(f: &Fixture) -> ElectionId {
        f.engine
            .register_voter(&Voter {
                id: VoterId::new(1),
                name: "ada".into(),
                role: VoterRole::Voter,
            })
            .unwrap();
        f.engine
            .create_election(
                "board",
                Timestamp::new(1_100),
                &[CandidateSpec::new("x", ""), CandidateSpec::new("y", "")],
            )
            .unwrap()
            .election
            .id
    }

    #[tokio::test]
    async fn close_tick_only_closes_expired_elections() {
        let f = fixture();
        let id = seed(&f);
        assert!(f.scheduler.close_tick().await.is_empty());

        f.clock.advance(100);
        assert_eq!(f.scheduler.close_tick().await, vec![id]);
        assert_eq!(f.metrics.elections_closed.get(), 1);
        assert_eq!(
            f.engine.get_election(id).unwrap().status,
            ElectionStatus::ClosedPendingFinalize
        );
    }

    #[tokio::test]
    async fn finalize_tick_backs_off_while_ledger_is_down() {
        let f = fixture();
        let id = seed(&f);
        f.engine
            .cast_vote(VoterId::new(1), id, ballot_types::CandidateId::new(2))
            .await
            .unwrap();
        f.engine.close_election(id).await.unwrap();

        let mut backoff = FinalizeBackoff::new(5_000, 60_000);
        f.ledger.set_available(false);
        let tick = f.scheduler.finalize_tick(&mut backoff).await;
        assert_eq!(tick.deferred, vec![id]);
        assert_eq!(backoff.attempts(id), 1);

        // Still inside the backoff window.
        f.clock.advance(1);
        let tick = f.scheduler.finalize_tick(&mut backoff).await;
        assert_eq!(tick.waiting, vec![id]);

        f.ledger.set_available(true);
        f.clock.advance(10);
        let tick = f.scheduler.finalize_tick(&mut backoff).await;
        assert_eq!(tick.finalized, vec![id]);
        assert!(backoff.is_empty());
        assert_eq!(
            f.engine.get_election(id).unwrap().status,
            ElectionStatus::Completed
        );
        assert_eq!(f.metrics.elections_finalized.get(), 1);
        assert_eq!(f.metrics.reconcile_failures.get(), 1);
    }

    #[tokio::test]
    async fn reconcile_tick_swallows_ledger_outage() {
        let f = fixture();
        seed(&f);
        f.ledger.set_available(false);
        let tick = f.scheduler.reconcile_tick().await;
        assert_eq!(tick, ReconcileTick { reconciled: 0, failed: 1 });

        f.ledger.set_available(true);
        let tick = f.scheduler.reconcile_tick().await;
        assert_eq!(tick.reconciled, 1);
        assert_eq!(f.metrics.reconcile_passes.get(), 1);
    }

    #[tokio::test]
    async fn sweep_tick_reports_clean_state() {
        let f = fixture();
        seed(&f);
        let report = f.scheduler.sweep_tick().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(f.metrics.sweep_repairs.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_tasks_stop_on_shutdown() {
        let f = fixture();
        let id = seed(&f);
        f.clock.advance(500);

        let shutdown = ShutdownController::new();
        let config = NodeConfig {
            close_check_interval_secs: 1,
            ..NodeConfig::default()
        };
        let handles = Arc::new(f.scheduler).spawn(&config, &shutdown);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            f.engine.get_election(id).unwrap().status,
            ElectionStatus::Completed
        );

        shutdown.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
