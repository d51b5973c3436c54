//! Prometheus metrics for the ballot node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; [`NodeMetrics::encode`]
//! renders it in the Prometheus text exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

use crate::NodeError;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Votes accepted by the ledger.
    pub votes_cast: IntCounter,
    /// Votes refused before or by the ledger.
    pub votes_rejected: IntCounter,
    pub reconcile_passes: IntCounter,
    /// Reconciliation passes that failed (ledger down or conflict).
    pub reconcile_failures: IntCounter,
    pub elections_created: IntCounter,
    pub elections_closed: IntCounter,
    pub elections_finalized: IntCounter,
    /// Voters whose results-visible status could not be written.
    pub fanout_failures: IntCounter,
    /// Ballot rows repaired by the consistency sweep.
    pub sweep_repairs: IntCounter,
    pub sweep_conflicts: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub open_elections: IntGauge,
    pub pending_finalize_elections: IntGauge,
    pub completed_elections: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let votes_cast = register_int_counter_with_registry!(
            Opts::new("ballot_votes_cast_total", "Votes accepted by the ledger"),
            registry
        )
        .expect("failed to register votes_cast counter");

        let votes_rejected = register_int_counter_with_registry!(
            Opts::new("ballot_votes_rejected_total", "Votes rejected"),
            registry
        )
        .expect("failed to register votes_rejected counter");

        let reconcile_passes = register_int_counter_with_registry!(
            Opts::new(
                "ballot_reconcile_passes_total",
                "Successful tally reconciliation passes"
            ),
            registry
        )
        .expect("failed to register reconcile_passes counter");

        let reconcile_failures = register_int_counter_with_registry!(
            Opts::new(
                "ballot_reconcile_failures_total",
                "Tally reconciliation passes that failed"
            ),
            registry
        )
        .expect("failed to register reconcile_failures counter");

        let elections_created = register_int_counter_with_registry!(
            Opts::new("ballot_elections_created_total", "Elections created"),
            registry
        )
        .expect("failed to register elections_created counter");

        let elections_closed = register_int_counter_with_registry!(
            Opts::new("ballot_elections_closed_total", "Elections closed"),
            registry
        )
        .expect("failed to register elections_closed counter");

        let elections_finalized = register_int_counter_with_registry!(
            Opts::new("ballot_elections_finalized_total", "Elections finalized"),
            registry
        )
        .expect("failed to register elections_finalized counter");

        let fanout_failures = register_int_counter_with_registry!(
            Opts::new(
                "ballot_fanout_failures_total",
                "Per-voter status writes that failed during fan-out"
            ),
            registry
        )
        .expect("failed to register fanout_failures counter");

        let sweep_repairs = register_int_counter_with_registry!(
            Opts::new(
                "ballot_sweep_repairs_total",
                "Ballot rows repaired by the consistency sweep"
            ),
            registry
        )
        .expect("failed to register sweep_repairs counter");

        let sweep_conflicts = register_int_counter_with_registry!(
            Opts::new(
                "ballot_sweep_conflicts_total",
                "Inconsistencies found by the consistency sweep"
            ),
            registry
        )
        .expect("failed to register sweep_conflicts counter");

        let open_elections = register_int_gauge_with_registry!(
            Opts::new("ballot_open_elections", "Elections accepting votes"),
            registry
        )
        .expect("failed to register open_elections gauge");

        let pending_finalize_elections = register_int_gauge_with_registry!(
            Opts::new(
                "ballot_pending_finalize_elections",
                "Closed elections awaiting finalization"
            ),
            registry
        )
        .expect("failed to register pending_finalize_elections gauge");

        let completed_elections = register_int_gauge_with_registry!(
            Opts::new("ballot_completed_elections", "Completed elections"),
            registry
        )
        .expect("failed to register completed_elections gauge");

        Self {
            registry,
            votes_cast,
            votes_rejected,
            reconcile_passes,
            reconcile_failures,
            elections_created,
            elections_closed,
            elections_finalized,
            fanout_failures,
            sweep_repairs,
            sweep_conflicts,
            open_elections,
            pending_finalize_elections,
            completed_elections,
        }
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| NodeError::Config(format!("metrics encoding failed: {e}")))?;
        String::from_utf8(buffer).map_err(|e| NodeError::Config(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
