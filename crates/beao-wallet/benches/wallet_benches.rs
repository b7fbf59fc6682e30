//! Criterion benchmarks for beao-wallet hot paths.
//!
//! Covers: coin selection over large candidate sets, fee-aware selection,
//! and message signature verification.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use beao_core::address::{Address, Network};
use beao_core::crypto::KeyPair;
use beao_core::types::{Hash256, OutPoint};
use beao_wallet::builder::{estimate_size, FeePolicy};
use beao_wallet::coin_selection::{Candidate, CoinSelector};
use beao_wallet::message::{verify_message, MessageSignature};

/// `n` candidates with spread-out values and depths.
fn make_candidates(n: usize) -> Vec<Candidate> {
    (0..n)
        .map(|i| {
            let seed = blake3::hash(&(i as u64).to_le_bytes());
            let bytes = seed.as_bytes();
            Candidate {
                outpoint: OutPoint::new(Hash256(*bytes), 0),
                value: 1_000 + u64::from(bytes[0]) * 1_000 + i as u64,
                pubkey_hash: Hash256([0xCC; 32]),
                depth: u64::from(bytes[1]),
            }
        })
        .collect()
}

fn bench_coin_selection(c: &mut Criterion) {
    let small = make_candidates(50);
    let large = make_candidates(2_000);
    let policy = FeePolicy::default();

    c.bench_function("select_50_candidates", |b| {
        b.iter(|| CoinSelector::select(black_box(&small), 40_000, |_| 0))
    });

    c.bench_function("select_2000_candidates", |b| {
        b.iter(|| CoinSelector::select(black_box(&large), 1_500_000, |_| 0))
    });

    c.bench_function("select_2000_candidates_with_fee", |b| {
        b.iter(|| {
            CoinSelector::select(black_box(&large), 1_500_000, |k| policy.fee_for_size(estimate_size(k, 2)))
        })
    });
}

fn bench_message_verification(c: &mut Criterion) {
    let kp = KeyPair::from_secret_bytes([0x42; 32]);
    let address = Address::from_public_key(&kp.public_key(), Network::Mainnet);
    let message = "I control this address";
    let signature = MessageSignature::sign(&kp, message).to_string();

    c.bench_function("message_sign", |b| b.iter(|| MessageSignature::sign(&kp, black_box(message))));

    c.bench_function("message_verify", |b| {
        b.iter(|| verify_message(&address, black_box(message), black_box(&signature)))
    });
}

criterion_group!(benches, bench_coin_selection, bench_message_verification);
criterion_main!(benches);
