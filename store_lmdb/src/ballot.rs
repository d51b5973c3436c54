//! LMDB implementation of BallotStore.
//!
//! Every row is written twice in the same transaction: once under
//! `voter ++ election` and once under the `election ++ voter` fan-out index.

use ballot_store::{BallotStore, StoreError};
use ballot_types::{BallotStatus, ElectionId, VoterId};
use heed::RwTxn;

use crate::environment::LmdbStore;
use crate::keys::{ballot_index_key, ballot_key, election_key, split_u64_pair};
use crate::LmdbError;

/// Number of rows written per transaction by `ensure_ballots`.
const ENSURE_CHUNK: usize = 512;

fn decode_status(raw: &[u8]) -> Result<BallotStatus, LmdbError> {
    match raw {
        [b] => BallotStatus::from_byte(*b)
            .ok_or_else(|| LmdbError::Corruption(format!("unknown ballot status byte {b}"))),
        _ => Err(LmdbError::Corruption("ballot status length".into())),
    }
}

impl LmdbStore {
    fn read_ballot_in(
        &self,
        txn: &heed::RoTxn,
        voter: VoterId,
        election: ElectionId,
    ) -> Result<Option<BallotStatus>, LmdbError> {
        self.ballots_db
            .get(txn, &ballot_key(voter, election))?
            .map(decode_status)
            .transpose()
    }

    fn write_ballot_in(
        &self,
        wtxn: &mut RwTxn,
        voter: VoterId,
        election: ElectionId,
        status: BallotStatus,
    ) -> Result<(), LmdbError> {
        let value = [status.to_byte()];
        self.ballots_db
            .put(wtxn, &ballot_key(voter, election), &value)?;
        self.ballot_index_db
            .put(wtxn, &ballot_index_key(election, voter), &value)?;
        Ok(())
    }
}

impl BallotStore for LmdbStore {
    fn ensure_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
        status: BallotStatus,
    ) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self.read_ballot_in(&wtxn, voter, election)?.is_some() {
            return Ok(false);
        }
        self.write_ballot_in(&mut wtxn, voter, election, status)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn ensure_ballots(
        &self,
        election: ElectionId,
        voters: &[VoterId],
        status: BallotStatus,
    ) -> Result<usize, StoreError> {
        let mut created = 0;
        for chunk in voters.chunks(ENSURE_CHUNK) {
            let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
            for voter in chunk {
                if self.read_ballot_in(&wtxn, *voter, election)?.is_none() {
                    self.write_ballot_in(&mut wtxn, *voter, election, status)?;
                    created += 1;
                }
            }
            wtxn.commit().map_err(LmdbError::from)?;
        }
        Ok(created)
    }

    fn get_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
    ) -> Result<Option<BallotStatus>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_ballot_in(&rtxn, voter, election)?)
    }

    fn compare_and_set_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
        expected: BallotStatus,
        new: BallotStatus,
    ) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        match self.read_ballot_in(&wtxn, voter, election)? {
            Some(current) if current == expected => {
                self.write_ballot_in(&mut wtxn, voter, election, new)?;
                wtxn.commit().map_err(LmdbError::from)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn advance_ballot(
        &self,
        voter: VoterId,
        election: ElectionId,
        to: BallotStatus,
    ) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let current = self.read_ballot_in(&wtxn, voter, election)?.ok_or_else(|| {
            LmdbError::NotFound(format!("ballot of voter {voter} in election {election}"))
        })?;
        if !current.can_advance_to(to) {
            return Ok(false);
        }
        self.write_ballot_in(&mut wtxn, voter, election, to)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn ballots_for_voter(
        &self,
        voter: VoterId,
    ) -> Result<Vec<(ElectionId, BallotStatus)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let prefix = voter.to_be_bytes();
        let mut rows = Vec::new();
        for result in self
            .ballots_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (key, val) = result.map_err(LmdbError::from)?;
            let (_, election) = split_u64_pair(key)
                .ok_or_else(|| LmdbError::Corruption("ballot key length".into()))?;
            rows.push((ElectionId::new(election), decode_status(val)?));
        }
        Ok(rows)
    }

    fn ballots_for_election(
        &self,
        election: ElectionId,
    ) -> Result<Vec<(VoterId, BallotStatus)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let prefix = election_key(election);
        let mut rows = Vec::new();
        for result in self
            .ballot_index_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (key, val) = result.map_err(LmdbError::from)?;
            let (_, voter) = split_u64_pair(key)
                .ok_or_else(|| LmdbError::Corruption("ballot index key length".into()))?;
            rows.push((VoterId::new(voter), decode_status(val)?));
        }
        Ok(rows)
    }
}
