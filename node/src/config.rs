//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use ballot_engine::EngineConfig;

use crate::logging::LogFormat;
use crate::NodeError;

/// Which ledger the node appends votes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    /// Hash-chained LMDB vote log under `data_dir/ledger`.
    Local,
    /// External ledger service at `ledger_url`.
    Http,
}

/// Configuration for a ballot node.
///
/// Loaded from a TOML file via [`NodeConfig::from_toml_file`] or built
/// programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the `store/` and `ledger/` LMDB environments.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_ledger")]
    pub ledger: LedgerKind,

    /// Base URL of the external ledger (only used with `ledger = "http"`).
    #[serde(default)]
    pub ledger_url: String,

    /// Upper bound for every ledger call, in milliseconds.
    #[serde(default = "default_ledger_timeout_ms")]
    pub ledger_timeout_ms: u64,

    /// Secret key for voter identity hashing. Must be set, and must stay the
    /// same for the lifetime of the data directory.
    #[serde(default)]
    pub voter_hash_key: String,

    #[serde(default = "default_close_check_interval_secs")]
    pub close_check_interval_secs: u64,

    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_finalize_backoff_initial_ms")]
    pub finalize_backoff_initial_ms: u64,

    #[serde(default = "default_finalize_backoff_max_ms")]
    pub finalize_backoff_max_ms: u64,

    /// Attempts per voter when publishing results.
    #[serde(default = "default_fanout_attempts")]
    pub fanout_attempts: u32,

    /// LMDB memory map size per environment, in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./ballot_data")
}

fn default_ledger() -> LedgerKind {
    LedgerKind::Local
}

fn default_ledger_timeout_ms() -> u64 {
    5_000
}

fn default_close_check_interval_secs() -> u64 {
    5
}

fn default_reconcile_interval_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_finalize_backoff_initial_ms() -> u64 {
    1_000
}

fn default_finalize_backoff_max_ms() -> u64 {
    60_000
}

fn default_fanout_attempts() -> u32 {
    3
}

fn default_lmdb_map_size() -> usize {
    1 << 30
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject combinations the node cannot start with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.voter_hash_key.is_empty() {
            return Err(NodeError::Config("voter_hash_key must be set".into()));
        }
        if self.ledger == LedgerKind::Http && self.ledger_url.trim().is_empty() {
            return Err(NodeError::Config(
                "ledger_url is required when ledger = \"http\"".into(),
            ));
        }
        if self.ledger_timeout_ms == 0 {
            return Err(NodeError::Config("ledger_timeout_ms must be positive".into()));
        }
        self.log_format()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            ledger_timeout: self.ledger_timeout(),
            fanout_attempts: self.fanout_attempts,
            ..EngineConfig::default()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            ledger: default_ledger(),
            ledger_url: String::new(),
            ledger_timeout_ms: default_ledger_timeout_ms(),
            voter_hash_key: String::new(),
            close_check_interval_secs: default_close_check_interval_secs(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            finalize_backoff_initial_ms: default_finalize_backoff_initial_ms(),
            finalize_backoff_max_ms: default_finalize_backoff_max_ms(),
            fanout_attempts: default_fanout_attempts(),
            lmdb_map_size: default_lmdb_map_size(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}
