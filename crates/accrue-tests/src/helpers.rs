//! Shared helpers for scenario and adversarial tests.

use std::sync::Arc;

use accrue_core::params::{LevelBand, PhaseParams, RewardParams, RpTier};
use accrue_core::progression::{Activity, ActivityKind, Platform};
use accrue_core::types::{AccountId, Timestamp};
use accrue_engine::testing::Fakes;
use accrue_engine::MiningRateEngine;
use accrue_graph::DeviceFingerprint;

pub fn id(n: u64) -> AccountId {
    AccountId(n)
}

/// Engine over default params with verified, confident-human fakes.
pub fn engine() -> (Arc<MiningRateEngine>, Fakes) {
    engine_with(RewardParams::default())
}

pub fn engine_with(params: RewardParams) -> (Arc<MiningRateEngine>, Fakes) {
    let fakes = Fakes::new();
    let engine = MiningRateEngine::new(params, fakes.collaborators()).expect("test params are valid");
    (Arc::new(engine), fakes)
}

/// One unbounded phase, one RP tier and one level band with fixed values.
///
/// Pioneer bonus is 1.0, so the rate is `base × trust × network × level`
/// for a fresh account.
pub fn flat_params(base_rate: f64, network: f64, level: f64) -> RewardParams {
    let mut params = RewardParams::default();
    params.mining.phases = vec![PhaseParams {
        name: "flat".into(),
        max_participants: None,
        base_rate,
        pioneer_bonus: 1.0,
        daily_cap: 100.0,
    }];
    params.network.rp_tiers = vec![RpTier { name: "flat".into(), min_points: 0.0, multiplier: network }];
    params.progression.level_bands =
        vec![LevelBand { name: "flat".into(), min_level: 1, min_multiplier: level, max_multiplier: level }];
    params
}

/// Register `ids` at `at` without fingerprints.
pub fn register_all(engine: &MiningRateEngine, ids: impl IntoIterator<Item = u64>, at: Timestamp) {
    for n in ids {
        engine.register_account(id(n), at, None).expect("fresh account");
    }
}

/// Register `count` accounts from one device under `referrer`, ids from `first`.
pub fn farm_referrals(engine: &MiningRateEngine, referrer: u64, first: u64, count: u64, at: Timestamp) {
    let device = DeviceFingerprint::from_parts("farm-device", "203.0.113.7");
    for n in first..first + count {
        engine.register_account(id(n), at, Some(device)).expect("fresh account");
        engine.register_referral(id(referrer), id(n), at).expect("valid referral");
    }
}

pub fn native(kind: ActivityKind, at: Timestamp) -> Activity {
    Activity { kind, platform: Platform::Native, at }
}
