use proptest::prelude::*;

use ballot_types::{BallotStatus, ElectionId, ElectionStatus, Timestamp, VoterHash};

fn election_status() -> impl Strategy<Value = ElectionStatus> {
    prop_oneof![
        Just(ElectionStatus::Open),
        Just(ElectionStatus::ClosedPendingFinalize),
        Just(ElectionStatus::Completed),
    ]
}

fn ballot_status() -> impl Strategy<Value = BallotStatus> {
    prop_oneof![
        Just(BallotStatus::Available),
        Just(BallotStatus::Cast),
        Just(BallotStatus::ResultsVisible),
    ]
}

proptest! {
    /// Applying any sequence of requested transitions, accepting only legal
    /// ones, never moves an election backwards.
    #[test]
    fn election_status_is_monotonic(requests in prop::collection::vec(election_status(), 0..20)) {
        let mut current = ElectionStatus::Open;
        for next in requests {
            let before = current;
            if current.can_transition_to(next) {
                current = next;
            }
            prop_assert!(current >= before);
        }
    }

    /// Once completed, no requested transition is legal.
    #[test]
    fn completed_is_terminal(next in election_status()) {
        prop_assert!(!ElectionStatus::Completed.can_transition_to(next));
    }

    /// Ballot advances are strictly forward.
    #[test]
    fn ballot_advance_is_strictly_forward(from in ballot_status(), to in ballot_status()) {
        if from.can_advance_to(to) {
            prop_assert!(to > from);
        }
    }

    /// Big-endian id keys sort the same way as the ids themselves.
    #[test]
    fn election_id_key_order(a in 0u64.., b in 0u64..) {
        let ka = ElectionId::new(a).to_be_bytes();
        let kb = ElectionId::new(b).to_be_bytes();
        prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
    }

    /// Voter hashes survive the hex form used on the wire.
    #[test]
    fn voter_hash_hex(bytes in prop::array::uniform32(0u8..)) {
        let hash = VoterHash::new(bytes);
        prop_assert_eq!(VoterHash::from_hex(&hash.to_hex()).unwrap(), hash);
    }

    /// has_passed agrees with plain comparison.
    #[test]
    fn timestamp_has_passed(end in 0u64..1_000_000, now in 0u64..1_000_000) {
        prop_assert_eq!(Timestamp::new(end).has_passed(Timestamp::new(now)), now >= end);
    }

    /// Records survive the bincode encoding used by the LMDB backend.
    #[test]
    fn election_status_bincode(status in election_status()) {
        let encoded = bincode::serialize(&status).unwrap();
        let decoded: ElectionStatus = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, status);
    }
}
