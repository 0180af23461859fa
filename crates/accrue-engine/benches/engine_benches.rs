//! Criterion benchmarks for accrue-engine.
//!
//! Covers: network multiplier over a full three-level tree and an uncached
//! rate computation.

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use accrue_core::error::ProviderError;
use accrue_core::fingerprint::DeviceFingerprint;
use accrue_core::params::RewardParams;
use accrue_core::traits::{BehaviorProvider, IdentityProvider, QualityProvider, SettlementSink};
use accrue_core::types::{
    AccountId, ContentRef, SettlementRecord, VerificationRecord, VerificationStatus, VerificationTier,
};
use accrue_engine::{Collaborators, MiningRateEngine};

struct Verified;

#[async_trait]
impl IdentityProvider for Verified {
    async fn verification(&self, _account: AccountId) -> Result<VerificationRecord, ProviderError> {
        Ok(VerificationRecord { tier: VerificationTier::Standard, status: VerificationStatus::Verified, strong_auth: true })
    }
}

#[async_trait]
impl BehaviorProvider for Verified {
    async fn human_probability(
        &self,
        _account: AccountId,
        _session: Option<&DeviceFingerprint>,
    ) -> Result<f64, ProviderError> {
        Ok(0.95)
    }
}

#[async_trait]
impl QualityProvider for Verified {
    async fn score(&self, _content: &ContentRef) -> Result<f64, ProviderError> {
        Ok(1.0)
    }
}

#[async_trait]
impl SettlementSink for Verified {
    async fn submit(&self, _record: SettlementRecord) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Root account 0 with `fanout` referees per member down to L3.
fn build_engine(fanout: u64, cache_ttl: u64) -> MiningRateEngine {
    let fake = Arc::new(Verified);
    let collaborators = Collaborators {
        identity: fake.clone(),
        behavior: fake.clone(),
        quality: fake.clone(),
        settlement: fake,
    };
    let mut params = RewardParams::default();
    params.mining.rate_cache_ttl_secs = cache_ttl;
    let engine = MiningRateEngine::new(params, collaborators).expect("default params are valid");

    let mut next = 1u64;
    let mut frontier = vec![AccountId(0)];
    engine.register_account(AccountId(0), 0, None).expect("register root");
    for _ in 0..3 {
        let mut level = Vec::new();
        for parent in frontier {
            for _ in 0..fanout {
                let child = AccountId(next);
                next += 1;
                engine.register_account(child, 0, None).expect("register");
                engine.register_referral(parent, child, 0).expect("refer");
                level.push(child);
            }
        }
        frontier = level;
    }
    engine
}

fn bench_network_multiplier(c: &mut Criterion) {
    let engine = build_engine(10, 60);
    c.bench_function("network_multiplier_1110", |b| {
        b.iter(|| engine.network_snapshot(black_box(AccountId(0)), 100))
    });
}

fn bench_compute_rate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let engine = build_engine(5, 0);
    c.bench_function("compute_rate_uncached", |b| {
        b.iter(|| rt.block_on(engine.compute_rate(black_box(AccountId(0)), 100)))
    });
}

criterion_group!(benches, bench_network_multiplier, bench_compute_rate);
criterion_main!(benches);
