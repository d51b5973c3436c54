use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("election error: {0}")]
    Election(#[from] ballot_engine::ElectionError),

    #[error("store error: {0}")]
    Store(#[from] ballot_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] ballot_store_lmdb::LmdbError),

    #[error("ledger error: {0}")]
    Ledger(#[from] ballot_ledger::LedgerError),

    #[error("crypto error: {0}")]
    Crypto(#[from] ballot_crypto::CryptoError),

    #[error("config error: {0}")]
    Config(String),

    #[error("logging already initialised: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
