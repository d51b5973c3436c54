//! Cryptographic primitives for the ballot ledger.
//!
//! - **Blake2b** for the vote-log hash chain
//! - **HMAC-SHA256** for one-way, election-bound voter identity hashing

pub mod error;
pub mod hash;
pub mod voter;

pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi, chain_link};
pub use voter::VoterHasher;
