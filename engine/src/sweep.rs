//! Consistency sweep between ballot rows and the ledger.
//!
//! Repairs the gaps the cast and finalize paths can leave behind when a
//! write fails halfway:
//! - a row still `available` although the ledger holds the voter's vote is
//!   moved to `cast`;
//! - a row `cast` with no ledger event is reported as a conflict and left
//!   alone for an operator;
//! - completed elections get their results fan-out repeated;
//! - open elections get rows for voters the creation fan-out missed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ballot_crypto::VoterHasher;
use ballot_ledger::{with_timeout, LedgerClient};
use ballot_store::VoteStore;
use ballot_types::{BallotStatus, ElectionId, ElectionStatus, VoterHash, VoterId};
use serde::Serialize;

use crate::ballots::BallotProjection;
use crate::locks::KeyedLocks;
use crate::ElectionError;

/// A ballot row that claims a vote the ledger does not hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SweepConflict {
    pub election_id: ElectionId,
    pub voter_id: VoterId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub elections_checked: usize,
    /// Rows moved from `available` to `cast`.
    pub repaired: Vec<(ElectionId, VoterId)>,
    pub conflicts: Vec<SweepConflict>,
    /// `available` rows created for open elections.
    pub rows_created: usize,
    /// Rows moved to `results-visible` for completed elections.
    pub results_published: usize,
    pub fan_out_failures: usize,
    /// Elections skipped because the ledger could not be queried.
    pub ledger_errors: usize,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty()
            && self.conflicts.is_empty()
            && self.fan_out_failures == 0
            && self.ledger_errors == 0
    }
}

pub struct ConsistencySweep<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    hasher: VoterHasher,
    ballots: Arc<BallotProjection<S>>,
    ballot_locks: Arc<KeyedLocks<(VoterId, ElectionId)>>,
    timeout: Duration,
}

impl<S: VoteStore, L: LedgerClient> ConsistencySweep<S, L> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<L>,
        hasher: VoterHasher,
        ballots: Arc<BallotProjection<S>>,
        ballot_locks: Arc<KeyedLocks<(VoterId, ElectionId)>>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            hasher,
            ballots,
            ballot_locks,
            timeout,
        }
    }

    /// Sweep every election once.
    pub async fn run(&self) -> Result<SweepReport, ElectionError> {
        let mut report = SweepReport::default();
        for election in self.store.iter_elections()? {
            report.elections_checked += 1;
            match election.status {
                ElectionStatus::Completed => {
                    let fan_out = self.ballots.fan_out_results(election.id).await?;
                    report.results_published += fan_out.updated;
                    report.fan_out_failures += fan_out.failed.len();
                }
                ElectionStatus::Open | ElectionStatus::ClosedPendingFinalize => {
                    if election.status == ElectionStatus::Open {
                        report.rows_created += self.ballots.fan_out_available(election.id)?;
                    }
                    self.check_cast_rows(election.id, &mut report).await?;
                }
            }
        }

        if !report.conflicts.is_empty() {
            tracing::error!(
                conflicts = report.conflicts.len(),
                "ballot rows claim votes missing from the ledger"
            );
        }
        tracing::info!(
            elections = report.elections_checked,
            repaired = report.repaired.len(),
            conflicts = report.conflicts.len(),
            rows_created = report.rows_created,
            results_published = report.results_published,
            "consistency sweep finished"
        );
        Ok(report)
    }

    async fn check_cast_rows(
        &self,
        election: ElectionId,
        report: &mut SweepReport,
    ) -> Result<(), ElectionError> {
        // Rows first: a row seen as `cast` here was written after its append
        // was acknowledged, so a read-your-writes ledger includes that event
        // in the query below. A lagging replica would flag the row.
        let rows = self.store.ballots_for_election(election)?;
        let events = match with_timeout(self.timeout, self.ledger.query_events(election)).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(election_id = %election, error = %e, "sweep skipped election, ledger unavailable");
                report.ledger_errors += 1;
                return Ok(());
            }
        };
        let on_ledger: HashSet<VoterHash> = events.iter().map(|e| e.voter_hash).collect();

        for (voter, status) in rows {
            let voted = on_ledger.contains(&self.hasher.hash(election, voter));
            match status {
                BallotStatus::Available if voted => {
                    let _ballot = self.ballot_locks.lock((voter, election)).await;
                    if self.store.compare_and_set_ballot(
                        voter,
                        election,
                        BallotStatus::Available,
                        BallotStatus::Cast,
                    )? {
                        tracing::warn!(election_id = %election, voter_id = %voter, "repaired ballot status to cast");
                        report.repaired.push((election, voter));
                    }
                }
                BallotStatus::Cast if !voted => {
                    tracing::error!(election_id = %election, voter_id = %voter, "ballot is cast but the ledger has no vote for this voter");
                    report.conflicts.push(SweepConflict {
                        election_id: election,
                        voter_id: voter,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}
