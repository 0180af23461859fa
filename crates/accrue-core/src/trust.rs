//! Trust scoring: verification depth × behavioural authenticity × security.
//!
//! Pure computation: no storage, no IO. The scorer consumes the account's
//! verification fields and a human-probability scalar produced by an external
//! behaviour model, and emits a [`TrustAssessment`] the mining engine may use
//! for at most `ttl_secs`.
//!
//! | Human probability `p` | Outcome                              |
//! |-----------------------|--------------------------------------|
//! | `p < 0.7`             | `LowHumanConfidence`                 |
//! | `0.7 ≤ p < 0.9`       | penalty `max(0.5, 1 − (0.9 − p))`    |
//! | `p ≥ 0.9`             | penalty `1.0`                        |

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TrustError;
use crate::params::TrustParams;
use crate::primitives::clamp;
use crate::types::{Account, AccountId, Timestamp, VerificationStatus};

/// Snapshot of an account's trustworthiness at `assessed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustAssessment {
    pub account: AccountId,
    pub verification_status: VerificationStatus,
    pub verification_multiplier: f64,
    pub human_probability: f64,
    /// Penalty in `[min_behavior_penalty, 1.0]`; `None` when the behaviour
    /// gate was never reached (verification suspended).
    pub behavior_penalty: Option<f64>,
    pub security_bonus: f64,
    /// Final multiplier in `[0, max_multiplier]`.
    pub multiplier: f64,
    pub assessed_at: Timestamp,
}

impl TrustAssessment {
    /// Stale once `ttl_secs` have elapsed since assessment.
    pub fn is_stale(&self, now: Timestamp, ttl_secs: u64) -> bool {
        now.saturating_sub(self.assessed_at) >= ttl_secs
    }

    pub fn expires_at(&self, ttl_secs: u64) -> Timestamp {
        self.assessed_at.saturating_add(ttl_secs)
    }

    /// Error if the assessment may no longer be used at `now`.
    pub fn ensure_fresh(&self, now: Timestamp, ttl_secs: u64) -> Result<(), TrustError> {
        if self.is_stale(now, ttl_secs) {
            return Err(TrustError::StaleAssessment {
                account: self.account,
                assessed_at: self.assessed_at,
                now,
                ttl_secs,
            });
        }
        Ok(())
    }

    pub fn is_zero(&self) -> bool {
        self.multiplier == 0.0
    }
}

/// Computes [`TrustAssessment`]s from verification and behaviour signals.
#[derive(Debug, Clone, Default)]
pub struct TrustScorer {
    params: TrustParams,
}

impl TrustScorer {
    pub fn new(params: TrustParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrustParams {
        &self.params
    }

    /// Behaviour penalty for a human probability, or `None` below the minimum.
    ///
    /// # Examples
    ///
    /// ```
    /// use accrue_core::trust::TrustScorer;
    ///
    /// let scorer = TrustScorer::default();
    /// assert_eq!(scorer.behavior_penalty(0.95), Some(1.0));
    /// assert!((scorer.behavior_penalty(0.8).unwrap() - 0.9).abs() < 1e-12);
    /// assert_eq!(scorer.behavior_penalty(0.5), None);
    /// ```
    pub fn behavior_penalty(&self, human_probability: f64) -> Option<f64> {
        if human_probability.is_nan() {
            return None;
        }
        let p = clamp(human_probability, 0.0, 1.0);
        let confident = self.params.confident_human_probability;
        if p >= confident {
            Some(1.0)
        } else if p >= self.params.min_human_probability {
            Some((1.0 - (confident - p)).max(self.params.min_behavior_penalty))
        } else {
            None
        }
    }

    /// Assess `account` given the behaviour model's `human_probability`.
    ///
    /// A suspended verification status short-circuits to a zero multiplier
    /// without evaluating anything else.
    pub fn assess(
        &self,
        account: &Account,
        human_probability: f64,
        now: Timestamp,
    ) -> Result<TrustAssessment, TrustError> {
        if account.verification_status == VerificationStatus::Suspended {
            debug!(account = %account.id, "trust: verification suspended, multiplier forced to zero");
            return Ok(TrustAssessment {
                account: account.id,
                verification_status: VerificationStatus::Suspended,
                verification_multiplier: 0.0,
                human_probability,
                behavior_penalty: None,
                security_bonus: 1.0,
                multiplier: 0.0,
                assessed_at: now,
            });
        }

        let Some(tier_multiplier) = self.params.tier_multipliers.get(account.verification_tier) else {
            return Err(TrustError::InsufficientVerification {
                account: account.id,
                tier: account.verification_tier,
            });
        };

        let behavior_penalty = self.behavior_penalty(human_probability).ok_or(
            TrustError::LowHumanConfidence {
                account: account.id,
                probability: human_probability,
                minimum: self.params.min_human_probability,
            },
        )?;

        let verification_multiplier =
            self.params.status_multipliers.get(account.verification_status) * tier_multiplier;
        let security_bonus = if account.strong_auth { self.params.strong_auth_bonus } else { 1.0 };
        let multiplier = clamp(
            verification_multiplier * behavior_penalty * security_bonus,
            0.0,
            self.params.max_multiplier,
        );

        debug!(
            account = %account.id,
            verification_multiplier,
            behavior_penalty,
            security_bonus,
            multiplier,
            "trust: assessed"
        );

        Ok(TrustAssessment {
            account: account.id,
            verification_status: account.verification_status,
            verification_multiplier,
            human_probability: clamp(human_probability, 0.0, 1.0),
            behavior_penalty: Some(behavior_penalty),
            security_bonus,
            multiplier,
            assessed_at: now,
        })
    }
}
