use ballot_types::{CandidateId, ChainHash, ElectionId, EventIndex, Timestamp, VoteEvent, VoterId};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn voter_hash_bench(c: &mut Criterion) {
    let hasher = ballot_crypto::VoterHasher::new(b"bench-key").expect("non-empty key");

    c.bench_function("voter_hash", |b| {
        b.iter(|| hasher.hash(black_box(ElectionId::new(7)), black_box(VoterId::new(123_456))))
    });
}

fn chain_link_bench(c: &mut Criterion) {
    let hasher = ballot_crypto::VoterHasher::new(b"bench-key").expect("non-empty key");
    let event = VoteEvent {
        election_id: ElectionId::new(7),
        candidate_id: CandidateId::new(2),
        voter_hash: hasher.hash(ElectionId::new(7), VoterId::new(1)),
        timestamp: Timestamp::new(1_700_000_000),
        index: EventIndex::new(99),
    };

    c.bench_function("chain_link", |b| {
        b.iter(|| ballot_crypto::chain_link(black_box(&ChainHash::ZERO), black_box(&event)))
    });
}

fn blake2b_256_1kb_bench(c: &mut Criterion) {
    let data = vec![0xCDu8; 1024];

    c.bench_function("blake2b_256_1KB", |b| {
        b.iter(|| ballot_crypto::blake2b_256(black_box(&data)))
    });
}

criterion_group!(benches, voter_hash_bench, chain_link_bench, blake2b_256_1kb_bench);
criterion_main!(benches);
