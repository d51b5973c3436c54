use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("voter hash key must not be empty")]
    EmptyKey,

    #[error("invalid key: {0}")]
    InvalidKey(String),
}
