//! Ballot node: wires the election engine to LMDB storage and a ledger.
//!
//! The node:
//! - Opens the store and the configured ledger backend
//! - Closes elections whose voting window has elapsed
//! - Finalizes closed elections, backing off while the ledger is down
//! - Reconciles open elections and runs the consistency sweep periodically
//! - Exposes Prometheus metrics and shuts down cleanly on SIGINT/SIGTERM

pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod scheduler;
pub mod shutdown;

pub use config::{LedgerKind, NodeConfig};
pub use error::NodeError;
pub use ledger::LedgerBackend;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::BallotNode;
pub use scheduler::{FinalizeTick, ReconcileTick, Scheduler};
pub use shutdown::ShutdownController;
