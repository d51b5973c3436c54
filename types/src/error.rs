use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeError {
    #[error("invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },

    #[error("unknown election status: {0}")]
    UnknownElectionStatus(String),

    #[error("unknown ballot status: {0}")]
    UnknownBallotStatus(String),

    #[error("unknown voter role: {0}")]
    UnknownRole(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),
}
