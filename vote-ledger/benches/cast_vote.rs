//! Vote path benchmarks

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;
use vote_ledger::{
    transition::{CastVoteRequest, OpenCampaignRequest, TransitionProcessor},
    AddressDeriver, Config, Pubkey, Storage,
};

const T: i64 = 1_700_000_000;

fn bench_address_derivation(c: &mut Criterion) {
    let deriver = AddressDeriver::new("bench");
    let creator = Pubkey::new([1u8; 32]);

    c.bench_function("campaign_address", |b| {
        b.iter(|| deriver.campaign_address(&creator, "Best lang?"))
    });
}

fn bench_cast_vote(c: &mut Criterion) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.rocksdb.sync_writes = false;

    let storage = Arc::new(Storage::open(&config).unwrap());
    let processor = TransitionProcessor::new(storage, AddressDeriver::new(&config.namespace));
    let campaign = processor
        .open_campaign(OpenCampaignRequest {
            description: "Bench".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            duration_seconds: 3600,
            creator: Pubkey::new([1u8; 32]),
            now: T,
        })
        .unwrap();

    let mut next_voter = 0u64;
    c.bench_function("cast_vote", |b| {
        b.iter_batched(
            || {
                next_voter += 1;
                let mut key = [0u8; 32];
                key[..8].copy_from_slice(&next_voter.to_be_bytes());
                CastVoteRequest {
                    campaign,
                    option_index: (next_voter % 2) as u8,
                    voter: Pubkey::new(key),
                    now: T + 1,
                }
            },
            |request| processor.cast_vote(request).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_address_derivation, bench_cast_vote);
criterion_main!(benches);
