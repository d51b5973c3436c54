//! LMDB environment setup for the election store.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::LmdbError;

/// Maximum number of named databases in the store environment.
const MAX_DBS: u32 = 16;
/// Default memory map size (1 GiB).
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;
/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

pub(crate) const META_SCHEMA_VERSION: &[u8] = b"schema_version";
pub(crate) const META_NEXT_ELECTION: &[u8] = b"next_election_id";

/// Database names owned by the election store.
pub const STORE_DATABASES: &[&str] = &[
    "meta",
    "elections",
    "candidates",
    "ballots",
    "ballots_by_election",
    "voters",
];

/// LMDB-backed implementation of every `ballot-store` trait.
///
/// Each trait call runs in its own transaction; multi-row writes
/// (`insert_election`, `set_counts`, ballot CAS with its index row) commit
/// atomically or not at all.
pub struct LmdbStore {
    pub(crate) env: Arc<Env>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    pub(crate) elections_db: Database<Bytes, Bytes>,
    pub(crate) candidates_db: Database<Bytes, Bytes>,
    pub(crate) ballots_db: Database<Bytes, Bytes>,
    pub(crate) ballot_index_db: Database<Bytes, Bytes>,
    pub(crate) voters_db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per path by this process and
        // never mapped twice concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)
        }?;

        let mut wtxn = env.write_txn()?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("meta"))?;
        let elections_db = env.create_database(&mut wtxn, Some("elections"))?;
        let candidates_db = env.create_database(&mut wtxn, Some("candidates"))?;
        let ballots_db = env.create_database(&mut wtxn, Some("ballots"))?;
        let ballot_index_db = env.create_database(&mut wtxn, Some("ballots_by_election"))?;
        let voters_db = env.create_database(&mut wtxn, Some("voters"))?;

        match meta_db.get(&wtxn, META_SCHEMA_VERSION)? {
            None => {
                meta_db.put(&mut wtxn, META_SCHEMA_VERSION, &SCHEMA_VERSION.to_be_bytes())?;
            }
            Some(raw) => {
                let arr: [u8; 4] = raw
                    .try_into()
                    .map_err(|_| LmdbError::Corruption("schema version length".into()))?;
                let found = u32::from_be_bytes(arr);
                if found != SCHEMA_VERSION {
                    return Err(LmdbError::Corruption(format!(
                        "unsupported schema version {found}, expected {SCHEMA_VERSION}"
                    )));
                }
            }
        }
        wtxn.commit()?;

        tracing::info!(path = %path.display(), "opened LMDB election store");

        Ok(Self {
            env: Arc::new(env),
            meta_db,
            elections_db,
            candidates_db,
            ballots_db,
            ballot_index_db,
            voters_db,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// Flush dirty pages to disk.
    pub fn force_sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync().map_err(LmdbError::from)
    }
}
