//! Ledger backend selected by configuration.

use ballot_ledger::{HttpLedgerClient, LedgerClient, LedgerError};
use ballot_store_lmdb::{ChainReport, IntegrityReport, LmdbVoteLog};
use ballot_types::{ElectionId, EventIndex, VoteEvent, VoteSubmission};

use crate::config::{LedgerKind, NodeConfig};
use crate::NodeError;

/// Either the local LMDB vote log or an external HTTP ledger.
pub enum LedgerBackend {
    Local(LmdbVoteLog),
    Http(HttpLedgerClient),
}

impl LedgerBackend {
    pub fn open(config: &NodeConfig) -> Result<Self, NodeError> {
        match config.ledger {
            LedgerKind::Local => {
                let log = LmdbVoteLog::open(&config.ledger_dir(), config.lmdb_map_size)?;
                Ok(Self::Local(log))
            }
            LedgerKind::Http => {
                let client = HttpLedgerClient::new(&config.ledger_url, config.ledger_timeout())?;
                Ok(Self::Http(client))
            }
        }
    }

    /// Walk the local hash chain. `None` for an external ledger.
    pub fn verify_chain(&self) -> Result<Option<ChainReport>, NodeError> {
        match self {
            Self::Local(log) => Ok(Some(log.verify_chain()?)),
            Self::Http(_) => Ok(None),
        }
    }

    /// Table counts and chain walk of the local log. `None` for an external ledger.
    pub fn check_integrity(&self) -> Result<Option<IntegrityReport>, NodeError> {
        match self {
            Self::Local(log) => Ok(Some(log.check_integrity()?)),
            Self::Http(_) => Ok(None),
        }
    }

    pub fn sync(&self) -> Result<(), NodeError> {
        match self {
            Self::Local(log) => Ok(log.force_sync()?),
            Self::Http(_) => Ok(()),
        }
    }
}

impl LedgerClient for LedgerBackend {
    async fn append(&self, submission: VoteSubmission) -> Result<EventIndex, LedgerError> {
        match self {
            Self::Local(log) => log.append(submission).await,
            Self::Http(client) => client.append(submission).await,
        }
    }

    async fn query_events(&self, election: ElectionId) -> Result<Vec<VoteEvent>, LedgerError> {
        match self {
            Self::Local(log) => log.query_events(election).await,
            Self::Http(client) => client.query_events(election).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Local(log) => log.name(),
            Self::Http(client) => client.name(),
        }
    }
}
