//! Lifecycle controller: open → closed-pending-finalize → completed.
//!
//! Closing and finalizing take the election's write gate, which vote casting
//! holds for reading. Once a close or finalize holds the gate, no cast for
//! that election is in flight and none can start until it is released; casts
//! queued behind it then observe the new status and are rejected.

use std::sync::Arc;

use ballot_ledger::LedgerClient;
use ballot_store::VoteStore;
use ballot_types::{Clock, Election, ElectionId, ElectionStatus};
use serde::Serialize;

use crate::ballots::{BallotProjection, FanOutReport};
use crate::locks::KeyedGates;
use crate::reconciler::{Tally, TallyReconciler};
use crate::ElectionError;

/// Result of a finalize call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    pub election_id: ElectionId,
    /// The final tally, absent when the election was already completed.
    pub tally: Option<Tally>,
    pub fan_out: FanOutReport,
    pub already_completed: bool,
}

pub struct LifecycleController<S, L> {
    store: Arc<S>,
    reconciler: Arc<TallyReconciler<S, L>>,
    ballots: Arc<BallotProjection<S>>,
    gates: Arc<KeyedGates<ElectionId>>,
    clock: Arc<dyn Clock>,
}

impl<S: VoteStore, L: LedgerClient> LifecycleController<S, L> {
    pub fn new(
        store: Arc<S>,
        reconciler: Arc<TallyReconciler<S, L>>,
        ballots: Arc<BallotProjection<S>>,
        gates: Arc<KeyedGates<ElectionId>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            reconciler,
            ballots,
            gates,
            clock,
        }
    }

    /// Close an open election. Closing an election that is already closed or
    /// completed is a no-op.
    pub async fn close(&self, id: ElectionId) -> Result<Election, ElectionError> {
        Ok(self.close_if_open(id).await?.0)
    }

    /// The election as it stands after the attempt, and whether this call
    /// moved it out of `open`.
    async fn close_if_open(&self, id: ElectionId) -> Result<(Election, bool), ElectionError> {
        let _gate = self.gates.write(id).await;
        let mut election = self.store.get_election(id)?;
        if !election.status.accepts_votes() {
            return Ok((election, false));
        }
        if self.store.transition_status(
            id,
            ElectionStatus::Open,
            ElectionStatus::ClosedPendingFinalize,
        )? {
            tracing::info!(election_id = %id, "election closed, pending finalize");
            election.status = ElectionStatus::ClosedPendingFinalize;
            Ok((election, true))
        } else {
            Ok((self.store.get_election(id)?, false))
        }
    }

    /// Close every open election whose end time has passed.
    ///
    /// Returns only the elections this call closed; one closed concurrently
    /// by someone else after the listing is skipped.
    pub async fn close_expired(&self) -> Result<Vec<ElectionId>, ElectionError> {
        let now = self.clock.now();
        let mut closed = Vec::new();
        for election in self.store.elections_with_status(ElectionStatus::Open)? {
            if !election.window_elapsed(now) {
                continue;
            }
            match self.close_if_open(election.id).await {
                Ok((_, true)) => closed.push(election.id),
                Ok((_, false)) => {
                    tracing::debug!(election_id = %election.id, "expired election already closed")
                }
                Err(e) => {
                    tracing::warn!(election_id = %election.id, error = %e, "failed to close expired election")
                }
            }
        }
        Ok(closed)
    }

    /// Finalize a closed election.
    ///
    /// Runs a final reconciliation, persists `completed`, then publishes
    /// results to every ballot row. A reconciliation failure leaves the
    /// election pending so the call can be retried. Fan-out failures are
    /// reported in the outcome and never undo `completed`. Finalizing a
    /// completed election only repeats the fan-out.
    pub async fn finalize(&self, id: ElectionId) -> Result<FinalizeOutcome, ElectionError> {
        let (tally, already_completed) = {
            let _gate = self.gates.write(id).await;
            let election = self.store.get_election(id)?;
            match election.status {
                ElectionStatus::Open => {
                    return Err(ElectionError::Validation(format!(
                        "election {id} must be closed before it can be finalized"
                    )))
                }
                ElectionStatus::Completed => (None, true),
                ElectionStatus::ClosedPendingFinalize => {
                    let tally = self.reconciler.reconcile(id).await.map_err(|e| {
                        tracing::warn!(election_id = %id, error = %e, "final reconciliation failed, election stays pending");
                        e
                    })?;
                    if !self.store.transition_status(
                        id,
                        ElectionStatus::ClosedPendingFinalize,
                        ElectionStatus::Completed,
                    )? {
                        return Err(ElectionError::ReconciliationConflict(format!(
                            "election {id} changed status during finalization"
                        )));
                    }
                    tracing::info!(
                        election_id = %id,
                        total_votes = tally.total_votes,
                        "election completed"
                    );
                    (Some(tally), false)
                }
            }
        };

        let fan_out = self.ballots.fan_out_results(id).await?;
        tracing::info!(
            election_id = %id,
            updated = fan_out.updated,
            failed = fan_out.failed.len(),
            "results published"
        );

        Ok(FinalizeOutcome {
            election_id: id,
            tally,
            fan_out,
            already_completed,
        })
    }

    /// Close then finalize in one call.
    pub async fn end_election(&self, id: ElectionId) -> Result<FinalizeOutcome, ElectionError> {
        self.close(id).await?;
        self.finalize(id).await
    }

    /// Elections waiting for finalization, oldest first.
    pub fn pending_finalize(&self) -> Result<Vec<Election>, ElectionError> {
        Ok(self
            .store
            .elections_with_status(ElectionStatus::ClosedPendingFinalize)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ballot_nullables::{NullClock, NullLedger, NullStore};
    use ballot_store::ElectionStore;
    use ballot_types::Timestamp;

    fn controller(
        store: Arc<NullStore>,
        gates: Arc<KeyedGates<ElectionId>>,
        clock: Arc<NullClock>,
    ) -> LifecycleController<NullStore, NullLedger> {
        let ledger = Arc::new(NullLedger::new());
        LifecycleController::new(
            store.clone(),
            Arc::new(TallyReconciler::new(
                store.clone(),
                ledger,
                Duration::from_millis(200),
            )),
            Arc::new(BallotProjection::new(store, 1, Duration::from_millis(1))),
            gates,
            clock,
        )
    }

    fn open_election(store: &NullStore, end: u64) -> ElectionId {
        let id = store.allocate_election_id().unwrap();
        let election = Election {
            id,
            name: "Council".into(),
            start_time: Timestamp::new(0),
            end_time: Timestamp::new(end),
            status: ElectionStatus::Open,
        };
        store.insert_election(&election, &[]).unwrap();
        id
    }

    #[tokio::test]
    async fn close_expired_reports_only_its_own_transitions() {
        let store = Arc::new(NullStore::new());
        let gates = Arc::new(KeyedGates::new());
        let clock = Arc::new(NullClock::new(500));
        let lifecycle = Arc::new(controller(store.clone(), gates.clone(), clock));
        let raced = open_election(&store, 100);
        let expired = open_election(&store, 200);

        // Hold the first election's gate so the sweep lists it as open, then
        // parks on the gate while another closer wins.
        let gate = gates.write(raced).await;
        let sweep = tokio::spawn({
            let lifecycle = lifecycle.clone();
            async move { lifecycle.close_expired().await }
        });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(store
            .transition_status(raced, ElectionStatus::Open, ElectionStatus::ClosedPendingFinalize)
            .unwrap());
        drop(gate);

        let closed = sweep.await.unwrap().unwrap();
        assert_eq!(closed, vec![expired]);
        assert_eq!(
            store.get_election(raced).unwrap().status,
            ElectionStatus::ClosedPendingFinalize
        );

        // Nothing left to close.
        assert!(lifecycle.close_expired().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let store = Arc::new(NullStore::new());
        let lifecycle = controller(
            store.clone(),
            Arc::new(KeyedGates::new()),
            Arc::new(NullClock::new(0)),
        );
        let id = open_election(&store, 100);
        let first = lifecycle.close(id).await.unwrap();
        let second = lifecycle.close(id).await.unwrap();
        assert_eq!(first.status, ElectionStatus::ClosedPendingFinalize);
        assert_eq!(second, first);
    }
}
