//! Startup integrity checks for the store and vote log environments.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::Env;

use crate::environment::{LmdbStore, STORE_DATABASES};
use crate::keys::split_u64_pair;
use crate::vote_log::LOG_DATABASES;
use crate::{LmdbError, LmdbVoteLog};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Open each named database and count its entries.
///
/// Read failures are recorded in the report; only failing to start the read
/// transaction is a hard error. A missing database is acceptable on a fresh
/// environment.
pub fn check_integrity(env: &Arc<Env>, databases: &[&str]) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.read_txn()?;

    for &name in databases {
        match env.open_database::<Bytes, Bytes>(&rtxn, Some(name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{name}': {e}")),
                }
            }
            Ok(None) => {}
            Err(e) => report
                .errors
                .push(format!("failed to open database '{name}': {e}")),
        }
    }

    Ok(report)
}

/// Check that an existing data directory still holds its `data.mdb`.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}

impl LmdbStore {
    /// Table counts plus a cross-check that every ballot row has its mirror
    /// in the fan-out index with the same status.
    pub fn check_integrity(&self) -> Result<IntegrityReport, LmdbError> {
        let mut report = check_integrity(&self.env, STORE_DATABASES)?;
        let rtxn = self.env.read_txn()?;

        let primary = self.ballots_db.len(&rtxn)?;
        let index = self.ballot_index_db.len(&rtxn)?;
        if primary != index {
            report.errors.push(format!(
                "ballot index has {index} rows but ballot table has {primary}"
            ));
        }

        for result in self.ballots_db.iter(&rtxn)? {
            let (key, val) = result?;
            let Some((voter, election)) = split_u64_pair(key) else {
                report.errors.push("malformed ballot key".to_string());
                continue;
            };
            let mut mirror = [0u8; 16];
            mirror[..8].copy_from_slice(&election.to_be_bytes());
            mirror[8..].copy_from_slice(&voter.to_be_bytes());
            match self.ballot_index_db.get(&rtxn, &mirror)? {
                Some(indexed) if indexed == val => {}
                Some(_) => report.errors.push(format!(
                    "ballot of voter {voter} in election {election} disagrees with its index row"
                )),
                None => report.errors.push(format!(
                    "ballot of voter {voter} in election {election} is missing from the index"
                )),
            }
        }

        Ok(report)
    }
}

impl LmdbVoteLog {
    /// Table counts plus a full chain walk.
    pub fn check_integrity(&self) -> Result<IntegrityReport, LmdbError> {
        let mut report = check_integrity(self.env(), LOG_DATABASES)?;
        let chain = self.verify_chain()?;
        if let Some(index) = chain.broken_at {
            report
                .errors
                .push(format!("vote log chain broken at event {index}"));
        }
        for index in chain.missing {
            report
                .errors
                .push(format!("vote log event {index} is missing"));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_store::BallotStore;
    use ballot_types::{BallotStatus, ElectionId, VoterId};

    #[test]
    fn check_data_dir_fresh_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(&dir.path().join("never-created")).is_ok());
    }

    #[test]
    fn check_data_dir_without_data_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(dir.path()).is_err());
    }

    #[test]
    fn fresh_store_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbStore::open(dir.path(), 1 << 24).unwrap();
        store
            .ensure_ballots(
                ElectionId::new(1),
                &[VoterId::new(1), VoterId::new(2)],
                BallotStatus::Available,
            )
            .unwrap();
        let report = store.check_integrity().unwrap();
        assert!(report.is_healthy(), "{:?}", report.errors);
        assert_eq!(report.databases_checked, STORE_DATABASES.len() as u32);
        assert!(check_data_dir(dir.path()).is_ok());
    }

    #[test]
    fn diverging_index_row_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbStore::open(dir.path(), 1 << 24).unwrap();
        store
            .ensure_ballot(VoterId::new(1), ElectionId::new(1), BallotStatus::Available)
            .unwrap();
        {
            let mut wtxn = store.env.write_txn().unwrap();
            let key = crate::keys::ballot_index_key(ElectionId::new(1), VoterId::new(1));
            store
                .ballot_index_db
                .put(&mut wtxn, &key, &[BallotStatus::Cast.to_byte()])
                .unwrap();
            wtxn.commit().unwrap();
        }
        let report = store.check_integrity().unwrap();
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn fresh_vote_log_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let log = LmdbVoteLog::open(dir.path(), 1 << 24).unwrap();
        let report = log.check_integrity().unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.databases_checked, LOG_DATABASES.len() as u32);
    }
}
