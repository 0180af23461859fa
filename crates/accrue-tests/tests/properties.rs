//! Property-based invariants across crates.
//!
//! - Mining rate never increases as cumulative mined grows
//! - The referral graph stays a forest; cycles are rejected exactly when they would form
//! - XP never decreases and levels never go down
//! - Effect resolution is deterministic and idempotent

use std::collections::HashSet;

use accrue_core::constants::HOUR_SECS;
use accrue_core::effects::{EffectDefinition, EffectOp, EffectStack, Metric, StackPolicy};
use accrue_core::error::ReferralError;
use accrue_core::params::{NetworkParams, ProgressionParams};
use accrue_core::progression::{Activity, ActivityKind, Platform, ProgressionLedger, ProgressionState};
use accrue_core::types::{Account, AccountId};
use accrue_graph::ReferralGraph;
use accrue_tests::helpers::*;
use proptest::prelude::*;

fn is_ancestor(graph: &ReferralGraph, ancestor: AccountId, of: AccountId) -> bool {
    let mut current = Some(of);
    let mut seen = HashSet::new();
    while let Some(node) = current {
        if node == ancestor {
            return true;
        }
        assert!(seen.insert(node), "cycle through {node}");
        current = graph.referrer_of(node).unwrap();
    }
    false
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn rate_non_increasing_in_mined(hours in prop::collection::vec(1u64..30, 1..8)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let (engine, _fakes) = engine();
            register_all(&engine, [1], 0);
            let mut now = 0;
            let mut previous = engine.compute_rate(id(1), now).await.unwrap().rate_per_hour;
            for h in hours {
                now += h * HOUR_SECS;
                engine.settle(id(1), now).await.unwrap();
                let rate = engine.compute_rate(id(1), now).await.unwrap().rate_per_hour;
                assert!(rate <= previous, "rate rose from {previous} to {rate}");
                previous = rate;
            }
        });
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn referral_graph_stays_a_forest(edges in prop::collection::vec((0u64..12, 0u64..12), 0..60)) {
        let graph = ReferralGraph::new(NetworkParams::default());
        for n in 0..12 {
            graph.register_account(AccountId(n), None).unwrap();
        }
        for (a, b) in edges {
            let (referrer, referee) = (AccountId(a), AccountId(b));
            let would_cycle = a != b && is_ancestor(&graph, referee, referrer);
            let existing = graph.referrer_of(referee).unwrap();
            match graph.register_referral(referrer, referee, 0) {
                Ok(()) => {
                    prop_assert!(!would_cycle);
                    prop_assert!(existing.is_none());
                }
                Err(ReferralError::CircularReferral { .. }) => prop_assert!(would_cycle),
                Err(ReferralError::SelfReferral(_)) => prop_assert_eq!(a, b),
                Err(ReferralError::AlreadyReferred { .. }) => prop_assert!(existing.is_some()),
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
        for n in 0..12 {
            // Terminates without revisiting a node.
            is_ancestor(&graph, AccountId(u64::MAX), AccountId(n));
        }
    }

    #[test]
    fn xp_and_level_monotone(
        events in prop::collection::vec((0usize..12, 0u64..600, 0.0f64..3.0, 0.0f64..4.0), 1..80),
    ) {
        let ledger = ProgressionLedger::new(ProgressionParams::default());
        let mut account = Account::new(AccountId(1), 0);
        let mut state = ProgressionState::new();
        let mut at = 0;
        let mut level = ledger.level_for_xp(0);
        for (kind, step, quality, xp_effect) in events {
            at += step;
            let activity = Activity { kind: ActivityKind::ALL[kind], platform: Platform::TikTok, at };
            let before = account.cumulative_xp;
            let r = ledger.apply_activity(&mut account, &mut state, &activity, quality, xp_effect).unwrap();
            prop_assert_eq!(r.total_xp, before + r.xp_gained);
            prop_assert!(r.level >= level);
            level = r.level;
        }
    }

    #[test]
    fn effect_resolution_deterministic(
        ops in prop::collection::vec((0u8..3, 0.1f64..4.0, 0u64..100, 1u64..200), 0..20),
        query in 0u64..400,
    ) {
        let build = || {
            let mut stack = EffectStack::new(AccountId(1));
            for (i, (op, magnitude, start, duration)) in ops.iter().enumerate() {
                let op = match op {
                    0 => EffectOp::Add,
                    1 => EffectOp::Multiply,
                    _ => EffectOp::Set,
                };
                let def = EffectDefinition::new(
                    &format!("e{i}"),
                    Metric::MiningRate,
                    op,
                    *magnitude,
                    Some(*duration),
                    StackPolicy::Stackable,
                );
                stack.activate(&def, *start).unwrap();
            }
            stack
        };
        let a = build();
        let b = build();
        let first = a.current_multiplier(Metric::MiningRate, query);
        prop_assert_eq!(first, a.current_multiplier(Metric::MiningRate, query));
        prop_assert_eq!(first, b.current_multiplier(Metric::MiningRate, query));
        prop_assert!(first >= 0.0);
        prop_assert_eq!(a.current_multiplier(Metric::Xp, query), 1.0);
    }
}
