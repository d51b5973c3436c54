//! Voter ballot projection.
//!
//! One status row per `(voter, election)`. Rows are created `available` by
//! fan-out, moved to `cast` by the vote path and to `results-visible` by
//! finalization. Every write touches a single voter's row.

use std::sync::Arc;
use std::time::Duration;

use ballot_store::{StoreError, VoteStore};
use ballot_types::{
    BallotStatus, ElectionId, ElectionStatus, Timestamp, Voter, VoterId,
};
use serde::Serialize;

use crate::ElectionError;

/// One row of a voter's ballot overview, joined with its election.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoterBallot {
    pub election_id: ElectionId,
    pub election_name: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub election_status: ElectionStatus,
    pub status: BallotStatus,
}

/// Outcome of fanning `results-visible` out to an election's rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    pub updated: usize,
    /// Rows that were already `results-visible`.
    pub unchanged: usize,
    /// Voters whose row could not be written after every attempt.
    pub failed: Vec<VoterId>,
}

impl FanOutReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BallotProjection<S> {
    store: Arc<S>,
    attempts: u32,
    retry_delay: Duration,
}

impl<S: VoteStore> BallotProjection<S> {
    pub fn new(store: Arc<S>, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            store,
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    /// Give every ballot-receiving voter an `available` row for `election`.
    ///
    /// Existing rows are left alone, so an interrupted fan-out can simply be
    /// run again. Returns the number of rows created.
    pub fn fan_out_available(&self, election: ElectionId) -> Result<usize, ElectionError> {
        let voters = self.store.ballot_voter_ids()?;
        let created = self
            .store
            .ensure_ballots(election, &voters, BallotStatus::Available)?;
        tracing::debug!(
            election_id = %election,
            voters = voters.len(),
            created,
            "available ballots fanned out"
        );
        Ok(created)
    }

    /// Register a voter and back-fill rows for every open election.
    pub fn register_voter(&self, voter: &Voter) -> Result<usize, ElectionError> {
        if voter.name.trim().is_empty() {
            return Err(ElectionError::Validation("voter name is empty".into()));
        }
        match self.store.insert_voter(voter) {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(ElectionError::Validation(format!(
                    "voter {} is already registered",
                    voter.id
                )))
            }
            Err(e) => return Err(e.into()),
        }

        let mut created = 0;
        if voter.receives_ballots() {
            for election in self.store.elections_with_status(ElectionStatus::Open)? {
                if self
                    .store
                    .ensure_ballot(voter.id, election.id, BallotStatus::Available)?
                {
                    created += 1;
                }
            }
        }
        tracing::info!(voter_id = %voter.id, role = voter.role.as_str(), ballots = created, "voter registered");
        Ok(created)
    }

    pub fn get_voter(&self, id: VoterId) -> Result<Voter, ElectionError> {
        Ok(self.store.get_voter(id)?)
    }

    pub fn list_voters(&self) -> Result<Vec<Voter>, ElectionError> {
        Ok(self.store.iter_voters()?)
    }

    pub fn status(
        &self,
        voter: VoterId,
        election: ElectionId,
    ) -> Result<Option<BallotStatus>, ElectionError> {
        Ok(self.store.get_ballot(voter, election)?)
    }

    /// Every ballot row of a voter joined with election metadata.
    pub fn voter_ballots(&self, voter: VoterId) -> Result<Vec<VoterBallot>, ElectionError> {
        if !self.store.voter_exists(voter)? {
            return Err(ElectionError::NotFound(format!("voter {voter}")));
        }
        let mut rows = Vec::new();
        for (election_id, status) in self.store.ballots_for_voter(voter)? {
            let election = self.store.get_election(election_id)?;
            rows.push(VoterBallot {
                election_id,
                election_name: election.name,
                start_time: election.start_time,
                end_time: election.end_time,
                election_status: election.status,
                status,
            });
        }
        Ok(rows)
    }

    /// Move every row of `election` to `results-visible`.
    ///
    /// Each voter is retried independently; a failing row is reported and
    /// never stops the others.
    pub async fn fan_out_results(&self, election: ElectionId) -> Result<FanOutReport, ElectionError> {
        let rows = self.store.ballots_for_election(election)?;
        let mut report = FanOutReport::default();

        for (voter, status) in rows {
            if status == BallotStatus::ResultsVisible {
                report.unchanged += 1;
                continue;
            }
            match self.advance_with_retry(voter, election).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    tracing::warn!(
                        election_id = %election,
                        voter_id = %voter,
                        error = %e,
                        "failed to publish results to voter"
                    );
                    report.failed.push(voter);
                }
            }
        }

        if !report.is_complete() {
            tracing::warn!(
                election_id = %election,
                failed = report.failed.len(),
                "results fan-out incomplete"
            );
        }
        Ok(report)
    }

    async fn advance_with_retry(
        &self,
        voter: VoterId,
        election: ElectionId,
    ) -> Result<bool, StoreError> {
        let mut delay = self.retry_delay;
        let mut attempt = 1;
        loop {
            match self
                .store
                .advance_ballot(voter, election, BallotStatus::ResultsVisible)
            {
                Ok(advanced) => return Ok(advanced),
                Err(e) if attempt >= self.attempts || e.is_not_found() => return Err(e),
                Err(e) => {
                    tracing::debug!(voter_id = %voter, attempt, error = %e, "retrying ballot update");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }
}
