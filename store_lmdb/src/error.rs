use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted record: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        LmdbError::Heed(e.to_string())
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(e: bincode::Error) -> Self {
        LmdbError::Serialization(e.to_string())
    }
}

impl From<LmdbError> for ballot_store::StoreError {
    fn from(e: LmdbError) -> Self {
        use ballot_store::StoreError;
        match e {
            LmdbError::NotFound(what) => StoreError::NotFound(what),
            LmdbError::Duplicate(what) => StoreError::Duplicate(what),
            LmdbError::Serialization(msg) => StoreError::Serialization(msg),
            LmdbError::Corruption(msg) => StoreError::Corruption(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<LmdbError> for ballot_ledger::LedgerError {
    fn from(e: LmdbError) -> Self {
        use ballot_ledger::LedgerError;
        match e {
            LmdbError::Corruption(msg) | LmdbError::Serialization(msg) => {
                LedgerError::Corrupt(msg)
            }
            other => LedgerError::Unavailable(other.to_string()),
        }
    }
}
