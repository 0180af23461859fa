//! Collaborator failures: every one fails closed.

use std::sync::Arc;
use std::time::Duration;

use accrue_core::constants::HOUR_SECS;
use accrue_core::error::AccrueError;
use accrue_core::params::RewardParams;
use accrue_core::progression::ActivityKind;
use accrue_engine::testing::{Fakes, FailingQuality, SlowBehavior};
use accrue_engine::MiningRateEngine;
use accrue_tests::helpers::*;

fn tight_params() -> RewardParams {
    let mut params = RewardParams::default();
    params.upstream.timeout_ms = 20;
    params.upstream.retry_backoff_ms = 5;
    params
}

#[tokio::test]
async fn slow_behavior_model_blocks_mining() {
    let fakes = Fakes::new();
    let collaborators = accrue_engine::Collaborators {
        behavior: Arc::new(SlowBehavior { delay: Duration::from_secs(5) }),
        ..fakes.collaborators()
    };
    let engine = MiningRateEngine::new(tight_params(), collaborators).unwrap();
    engine.register_account(id(1), 0, None).unwrap();

    let err = engine.compute_rate(id(1), 0).await.unwrap_err();
    assert!(matches!(err, AccrueError::UpstreamTimeout { after_ms: 20, .. }));
    assert!(err.is_retryable());
    assert!(matches!(engine.trust_assessment(id(1), 0), Err(AccrueError::MissingInput { .. })));

    let err = engine.settle(id(1), HOUR_SECS).await.unwrap_err();
    assert!(matches!(err, AccrueError::UpstreamTimeout { .. }));
    assert_eq!(engine.account(id(1)).unwrap().last_settled_at, 0);
    assert!(fakes.sink.records().is_empty());
}

#[tokio::test]
async fn rejected_settlement_is_retried_by_next_call() {
    let (engine, fakes) = engine();
    register_all(&engine, [1], 0);

    fakes.sink.reject_all(true);
    assert!(matches!(engine.settle(id(1), HOUR_SECS).await, Err(AccrueError::Upstream { .. })));
    assert_eq!(engine.account(id(1)).unwrap().cumulative_mined, 0);

    fakes.sink.reject_all(false);
    let out = engine.settle(id(1), 2 * HOUR_SECS).await.unwrap();
    assert_eq!(out.from, 0);
    assert!(out.amount > 0);
    assert_eq!(fakes.sink.records().len(), 1);
}

#[tokio::test]
async fn quality_outage_only_fails_strict_providers() {
    let fakes = Fakes::new();
    let lenient =
        MiningRateEngine::new(tight_params(), fakes.collaborators_with_quality(Arc::new(FailingQuality { best_effort: true })))
            .unwrap();
    let strict =
        MiningRateEngine::new(tight_params(), fakes.collaborators_with_quality(Arc::new(FailingQuality { best_effort: false })))
            .unwrap();
    lenient.register_account(id(1), 0, None).unwrap();
    strict.register_account(id(1), 0, None).unwrap();

    let post = native(ActivityKind::PhotoPost, 0);
    assert!(lenient.apply_activity(id(1), post, Some("p")).await.unwrap().xp_gained > 0);
    assert!(strict.apply_activity(id(1), post, Some("p")).await.is_err());

    // Non-content activity never consults the quality model.
    let login = native(ActivityKind::DailyLogin, 0);
    assert!(strict.apply_activity(id(1), login, None).await.unwrap().xp_gained > 0);
}
