//! Error types for Accrue.
use thiserror::Error;

use crate::progression::ActivityKind;
use crate::types::{AccountId, AccountStatus, Timestamp, VerificationTier};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrustError {
    #[error("{account}: verification tier {tier:?} is below the minimum for mining")] InsufficientVerification { account: AccountId, tier: VerificationTier },
    #[error("{account}: human probability {probability:.3} below minimum {minimum:.3}")] LowHumanConfidence { account: AccountId, probability: f64, minimum: f64 },
    #[error("{account}: trust assessment from {assessed_at} is stale at {now} (ttl {ttl_secs}s)")] StaleAssessment { account: AccountId, assessed_at: Timestamp, now: Timestamp, ttl_secs: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferralError {
    #[error("{0} cannot refer itself")] SelfReferral(AccountId),
    #[error("referral {referrer} -> {referee} would create a cycle")] CircularReferral { referrer: AccountId, referee: AccountId },
    #[error("{referee} already referred by {existing}")] AlreadyReferred { referee: AccountId, existing: AccountId },
    #[error("unknown account in referral graph: {0}")] UnknownAccount(AccountId),
    #[error("account already registered in referral graph: {0}")] DuplicateAccount(AccountId),
    #[error("referral {referrer} -> {referee} contended after {attempts} attempts")] Contended { referrer: AccountId, referee: AccountId, attempts: u32 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    #[error("{account}: effect {effect} already active until {expires_at:?}")] EffectAlreadyActive { account: AccountId, effect: String, expires_at: Option<Timestamp> },
    #[error("unknown effect: {0}")] UnknownEffect(String),
    #[error("effect {effect}: invalid magnitude {magnitude}")] InvalidMagnitude { effect: String, magnitude: f64 },
    #[error("effect {0}: duration must be non-zero")] ZeroDuration(String),
    #[error("effect instance not found: {0}")] NotFound(u64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgressionError {
    #[error("{account}: quality score {quality} is not a number")] InvalidQuality { account: AccountId, quality: f64 },
    #[error("{account}: xp multiplier {multiplier} is not a finite non-negative number")] InvalidMultiplier { account: AccountId, multiplier: f64 },
    #[error("{account}: cannot record activity while {status:?}")] Inactive { account: AccountId, status: AccountStatus },
    #[error("no xp rule for {0:?}")] NoRule(ActivityKind),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{service} timed out after {after_ms}ms")] Timeout { service: &'static str, after_ms: u64 },
    #[error("{service} unavailable: {reason}")] Unavailable { service: &'static str, reason: String },
    #[error("{service} returned invalid response: {reason}")] InvalidResponse { service: &'static str, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid parameter {field}: {reason}")] Invalid { field: &'static str, reason: String },
}

/// Umbrella error for every Accrue operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccrueError {
    #[error(transparent)] Trust(#[from] TrustError),
    #[error(transparent)] Referral(#[from] ReferralError),
    #[error(transparent)] Effect(#[from] EffectError),
    #[error(transparent)] Progression(#[from] ProgressionError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error("unknown account: {0}")] UnknownAccount(AccountId),
    #[error("account already registered: {0}")] DuplicateAccount(AccountId),
    #[error("{account} is {status:?}")] AccountSuspended { account: AccountId, status: AccountStatus },
    #[error("{account}: upstream {service} timed out after {after_ms}ms")] UpstreamTimeout { account: AccountId, service: &'static str, after_ms: u64 },
    #[error("{account}: upstream failure: {source}")] Upstream { account: AccountId, source: ProviderError },
    #[error("{account}: cannot move from {from:?} to {to:?}")] InvalidStatusTransition { account: AccountId, from: AccountStatus, to: AccountStatus },
    #[error("{account}: missing input {input}")] MissingInput { account: AccountId, input: &'static str },
}

impl AccrueError {
    /// Map a collaborator failure for `account`, promoting timeouts.
    pub fn upstream(account: AccountId, err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout { service, after_ms } => {
                AccrueError::UpstreamTimeout { account, service, after_ms }
            }
            other => AccrueError::Upstream { account, source: other },
        }
    }

    /// Whether the operation may succeed if retried once after a short backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AccrueError::UpstreamTimeout { .. }
                | AccrueError::Trust(TrustError::StaleAssessment { .. })
                | AccrueError::Referral(ReferralError::Contended { .. })
        )
    }

    /// User-facing hint for terminal eligibility failures.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            AccrueError::Trust(TrustError::InsufficientVerification { .. }) => {
                Some("complete phone and email verification to start mining")
            }
            AccrueError::Trust(TrustError::LowHumanConfidence { .. }) => {
                Some("complete an additional identity check to restore mining")
            }
            AccrueError::AccountSuspended { .. } => Some("contact support to review the suspension"),
            AccrueError::Effect(EffectError::EffectAlreadyActive { .. }) => {
                Some("wait for the active effect to expire")
            }
            AccrueError::Referral(ReferralError::CircularReferral { .. })
            | AccrueError::Referral(ReferralError::SelfReferral(_)) => {
                Some("use a referral code from someone outside your own network")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_promoted_to_upstream_timeout() {
        let err = AccrueError::upstream(
            AccountId(3),
            ProviderError::Timeout { service: "identity", after_ms: 250 },
        );
        assert!(matches!(err, AccrueError::UpstreamTimeout { after_ms: 250, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn unavailable_is_not_retryable() {
        let err = AccrueError::upstream(
            AccountId(3),
            ProviderError::Unavailable { service: "behavior", reason: "down".into() },
        );
        assert!(!err.is_retryable());
        assert!(err.remediation().is_none());
    }

    #[test]
    fn eligibility_errors_carry_remediation() {
        let err: AccrueError = TrustError::InsufficientVerification {
            account: AccountId(1),
            tier: VerificationTier::None,
        }
        .into();
        assert!(err.remediation().is_some());
        assert!(!err.is_retryable());
    }

    #[test]
    fn stale_assessment_is_retryable() {
        let err: AccrueError = TrustError::StaleAssessment {
            account: AccountId(1),
            assessed_at: 0,
            now: 400,
            ttl_secs: 300,
        }
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn messages_include_values() {
        let err = TrustError::LowHumanConfidence {
            account: AccountId(9),
            probability: 0.42,
            minimum: 0.7,
        };
        let msg = err.to_string();
        assert!(msg.contains("acct-9"));
        assert!(msg.contains("0.420"));
        assert!(msg.contains("0.700"));
    }
}
