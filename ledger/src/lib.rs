//! Ledger client layer.
//!
//! The ledger is an external, append-only, totally ordered event log. The rest
//! of the workspace talks to it only through [`LedgerClient`]; any store that
//! can append, reject duplicates per `(election, voter hash)` and replay an
//! election's events in order satisfies the contract.

pub mod client;
pub mod error;
pub mod http;

pub use client::{with_timeout, LedgerClient};
pub use error::LedgerError;
pub use http::HttpLedgerClient;
