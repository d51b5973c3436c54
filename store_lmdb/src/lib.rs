//! LMDB storage backend for the ballot ledger.
//!
//! Implements all storage traits from `ballot-store` using the `heed` LMDB
//! bindings, plus [`LmdbVoteLog`], a durable append-only vote log that
//! satisfies the ledger client contract for single-node deployments.
//!
//! The store and the vote log live in separate LMDB environments: they are
//! independently mutable, exactly like a relational projection and an
//! external ledger.

pub mod ballot;
pub mod candidate;
pub mod election;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod keys;
pub mod vote_log;
pub mod voter;

pub use environment::LmdbStore;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use vote_log::{ChainReport, LmdbVoteLog};
