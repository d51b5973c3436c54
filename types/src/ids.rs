//! Integer identifiers.
//!
//! Every id is a thin newtype so an election id can never be passed where a
//! voter id is expected. Byte encodings are big-endian so that LMDB keys sort
//! in numeric order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident, $inner:ty, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name($inner);

        impl $name {
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            pub const fn get(&self) -> $inner {
                self.0
            }

            pub fn to_be_bytes(&self) -> [u8; std::mem::size_of::<$inner>()] {
                self.0.to_be_bytes()
            }

            pub fn from_be_bytes(bytes: [u8; std::mem::size_of::<$inner>()]) -> Self {
                Self(<$inner>::from_be_bytes(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = crate::TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<$inner>()
                    .map(Self)
                    .map_err(|_| crate::TypeError::InvalidId {
                        kind: $label,
                        value: s.to_string(),
                    })
            }
        }
    };
}

integer_id!(
    /// Identity of an election. Allocated sequentially by the registry.
    ElectionId,
    u64,
    "election"
);

integer_id!(
    /// Identity of a candidate, scoped to its election (1-based).
    CandidateId,
    u32,
    "candidate"
);

integer_id!(
    /// Identity of a registered voter.
    VoterId,
    u64,
    "voter"
);

integer_id!(
    /// Position of a vote event in the ledger's total order.
    EventIndex,
    u64,
    "event index"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_bytes_sort_numerically() {
        let a = ElectionId::new(2).to_be_bytes();
        let b = ElectionId::new(256).to_be_bytes();
        assert!(a < b);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!("42".parse::<VoterId>().unwrap(), VoterId::new(42));
        assert!("forty-two".parse::<VoterId>().is_err());
        assert!("-1".parse::<CandidateId>().is_err());
    }
}
