//! 32-byte hash types for hashed voter identities and the vote-log chain.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One-way hash of a voter's identity, bound to a single election.
///
/// This is the only form of voter identity that ever reaches the ledger.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VoterHash([u8; 32]);

impl VoterHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, crate::TypeError> {
        hex::decode_32(s).map(Self)
    }
}

impl fmt::Debug for VoterHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoterHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for VoterHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Running hash over the vote log; each link commits to every earlier event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainHash([u8; 32]);

impl Default for ChainHash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl ChainHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

// Inline hex helpers to avoid adding the `hex` crate as a dependency of types.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn decode_32(s: &str) -> Result<[u8; 32], crate::TypeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 || !s.is_ascii() {
            return Err(crate::TypeError::InvalidHash(s.to_string()));
        }
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| crate::TypeError::InvalidHash(s.to_string()))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voter_hash_hex_round_trip() {
        let hash = VoterHash::new([0xab; 32]);
        let parsed = VoterHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn accepts_0x_prefix() {
        let hex = format!("0x{}", "01".repeat(32));
        assert_eq!(VoterHash::from_hex(&hex).unwrap().as_bytes(), &[1u8; 32]);
    }

    #[test]
    fn rejects_short_or_non_hex() {
        assert!(VoterHash::from_hex("abcd").is_err());
        assert!(VoterHash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn debug_is_abbreviated() {
        let hash = VoterHash::new([0x12; 32]);
        assert_eq!(format!("{:?}", hash), "VoterHash(12121212)");
    }
}
