//! Concurrent writers against one engine.
//!
//! Every test runs on a multi-threaded runtime so tasks genuinely race.

use std::sync::Arc;
use std::thread;

use accrue_core::constants::HOUR_SECS;
use accrue_core::error::{AccrueError, ReferralError};
use accrue_core::progression::ActivityKind;
use accrue_core::types::AccountStatus;
use accrue_tests::helpers::*;

#[test]
fn opposite_referrals_never_both_succeed() {
    let (engine, _fakes) = engine();
    register_all(&engine, 0..200, 0);

    thread::scope(|s| {
        for pair in 0..100u64 {
            let (a, b) = (id(pair * 2), id(pair * 2 + 1));
            let forward = Arc::clone(&engine);
            let backward = Arc::clone(&engine);
            s.spawn(move || forward.register_referral(a, b, 0));
            s.spawn(move || backward.register_referral(b, a, 0));
        }
    });

    for pair in 0..100u64 {
        let (a, b) = (id(pair * 2), id(pair * 2 + 1));
        let a_up = engine.graph().referrer_of(a).unwrap();
        let b_up = engine.graph().referrer_of(b).unwrap();
        assert!(
            (a_up == Some(b)) ^ (b_up == Some(a)),
            "pair {pair}: exactly one direction must win ({a_up:?}, {b_up:?})"
        );
    }
}

#[test]
fn concurrent_chain_closing_is_rejected() {
    // 0 → 1 → … → 9 built concurrently with attempts to close the loop.
    let (engine, _fakes) = engine();
    register_all(&engine, 0..10, 0);

    let results: Vec<Result<(), AccrueError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..10u64)
            .map(|n| {
                let engine = Arc::clone(&engine);
                s.spawn(move || engine.register_referral(id(n), id((n + 1) % 10), 0))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(AccrueError::Referral(ReferralError::CircularReferral { .. }))))
        .count();
    assert!(rejected >= 1, "a ten-edge ring over ten nodes must reject at least one edge");
    for n in 0..10 {
        // Every upline walk terminates.
        assert!(engine.graph().referral_path(id(n)).unwrap().len() <= 3);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_activities_respect_caps() {
    let (engine, _fakes) = engine();
    register_all(&engine, [1], 0);

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine.apply_activity(id(1), native(ActivityKind::DailyLogin, i), None).await
            })
        })
        .collect();

    let mut awarded = 0;
    for task in tasks {
        if !task.await.unwrap().unwrap().capped {
            awarded += 1;
        }
    }
    assert_eq!(awarded, 1);
    assert_eq!(engine.over_cap_total(id(1)).unwrap(), 39);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_xp_is_not_lost() {
    let (engine, _fakes) = engine();
    register_all(&engine, [1], 0);

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine.apply_activity(id(1), native(ActivityKind::Like, i), None).await
            })
        })
        .collect();

    let mut gained = 0;
    for task in tasks {
        gained += task.await.unwrap().unwrap().xp_gained;
    }
    assert_eq!(engine.account(id(1)).unwrap().cumulative_xp, gained);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settlements_credit_once() {
    let (engine, fakes) = engine();
    register_all(&engine, [1], 0);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.settle(id(1), HOUR_SECS).await })
        })
        .collect();

    let mut credited = 0;
    for task in tasks {
        let out = task.await.unwrap().unwrap();
        if out.amount > 0 {
            credited += 1;
        }
    }
    assert_eq!(credited, 1);
    assert_eq!(fakes.sink.records().len(), 1);
    let account = engine.account(id(1)).unwrap();
    assert_eq!(account.cumulative_mined, fakes.sink.records()[0].amount);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn suspension_wins_over_in_flight_rates() {
    let (engine, _fakes) = engine();
    register_all(&engine, 1..=50, 0);

    let tasks: Vec<_> = (1..=50u64)
        .map(|n| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.compute_rate(id(n), 10).await })
        })
        .collect();
    for n in 1..=50 {
        engine.set_account_status(id(n), AccountStatus::Suspended).unwrap();
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for n in 1..=50 {
        let b = engine.compute_rate(id(n), 11).await.unwrap();
        assert!(b.is_zero(), "{} still mining after suspension", id(n));
    }
}
