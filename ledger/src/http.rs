//! HTTP client for an external ledger gateway.
//!
//! Wire format (JSON):
//! - `POST {base}/elections/{id}/votes` with `{"candidate_id", "voter_hash"}`
//!   answers `{"event_index"}`; `409 Conflict` means the voter hash already
//!   voted in this election.
//! - `GET {base}/elections/{id}/events` answers the ordered event array.

use ballot_types::{
    CandidateId, ElectionId, EventIndex, Timestamp, VoteEvent, VoteSubmission, VoterHash,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{LedgerClient, LedgerError};

#[derive(Serialize)]
struct AppendRequest {
    candidate_id: u32,
    voter_hash: String,
}

#[derive(Deserialize)]
struct AppendResponse {
    event_index: u64,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    candidate_id: u32,
    voter_hash: String,
    timestamp: u64,
    event_index: u64,
}

/// Ledger client speaking JSON over HTTP to a ledger gateway.
pub struct HttpLedgerClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLedgerClient {
    /// Create a client for the gateway at `base_url`.
    ///
    /// `request_timeout` bounds every individual HTTP request.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn votes_url(&self, election: ElectionId) -> String {
        format!("{}/elections/{}/votes", self.base_url, election)
    }

    fn events_url(&self, election: ElectionId) -> String {
        format!("{}/elections/{}/events", self.base_url, election)
    }
}

fn transport_error(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Unavailable(format!("request timed out: {e}"))
    } else {
        LedgerError::Unavailable(e.to_string())
    }
}

/// Non-success status: 5xx is the gateway being down, anything else is a
/// permanent refusal of this request.
fn status_error(status: StatusCode, url: &str) -> LedgerError {
    if status.is_server_error() {
        LedgerError::Unavailable(format!("HTTP {status} from {url}"))
    } else {
        LedgerError::Rejected(format!("HTTP {status} from {url}"))
    }
}

fn decode_event(election: ElectionId, wire: WireEvent) -> Result<VoteEvent, LedgerError> {
    let voter_hash = VoterHash::from_hex(&wire.voter_hash)
        .map_err(|e| LedgerError::Corrupt(format!("event {}: {e}", wire.event_index)))?;
    Ok(VoteEvent {
        election_id: election,
        candidate_id: CandidateId::new(wire.candidate_id),
        voter_hash,
        timestamp: Timestamp::new(wire.timestamp),
        index: EventIndex::new(wire.event_index),
    })
}

impl LedgerClient for HttpLedgerClient {
    async fn append(&self, submission: VoteSubmission) -> Result<EventIndex, LedgerError> {
        let url = self.votes_url(submission.election_id);
        let body = AppendRequest {
            candidate_id: submission.candidate_id.get(),
            voter_hash: submission.voter_hash.to_hex(),
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        match resp.status() {
            s if s.is_success() => {
                let accepted: AppendResponse = resp
                    .json()
                    .await
                    .map_err(|e| LedgerError::Corrupt(format!("append response: {e}")))?;
                Ok(EventIndex::new(accepted.event_index))
            }
            s if s == StatusCode::CONFLICT => Err(LedgerError::DuplicateVote {
                election: submission.election_id,
                voter_hash: submission.voter_hash,
            }),
            s => Err(status_error(s, &url)),
        }
    }

    async fn query_events(&self, election: ElectionId) -> Result<Vec<VoteEvent>, LedgerError> {
        let url = self.events_url(election);
        let resp = self.client.get(&url).send().await.map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(status_error(resp.status(), &url));
        }

        let wire: Vec<WireEvent> = resp
            .json()
            .await
            .map_err(|e| LedgerError::Corrupt(format!("event list: {e}")))?;
        tracing::debug!(%election, events = wire.len(), "fetched ledger events");
        wire.into_iter()
            .map(|w| decode_event(election, w))
            .collect()
    }

    fn name(&self) -> &str {
        "http"
    }
}
