//! Collaborator interfaces.
//!
//! The core never talks to the outside world directly. These traits define
//! the contracts it consumes:
//! - [`QualityProvider`]: content-quality model (scalar in `[0.5, 2.0]`)
//! - [`BehaviorProvider`]: bot-detection model (human probability in `[0, 1]`)
//! - [`IdentityProvider`]: KYC / verification service
//! - [`SettlementSink`]: downstream ledger that actually pays out
//!
//! Every call is made under a bounded timeout by `accrue-engine`; an
//! implementation that blocks only delays its own caller.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::fingerprint::DeviceFingerprint;
use crate::types::{AccountId, ContentRef, SettlementRecord, VerificationRecord};

/// Scores content quality.
#[async_trait]
pub trait QualityProvider: Send + Sync {
    /// Quality multiplier for `content`; values outside `[0.5, 2.0]` are clamped.
    async fn score(&self, content: &ContentRef) -> Result<f64, ProviderError>;

    /// Whether a failure may fall back to the neutral score `1.0`.
    ///
    /// Providers must opt in; by default a failed score rejects the activity.
    fn is_best_effort(&self) -> bool {
        false
    }
}

/// Estimates how likely an account is operated by a human.
///
/// `session` is the fingerprint of the device the account was last seen on,
/// when one is known. Failures always fail closed: no rate is computed
/// without a fresh estimate.
#[async_trait]
pub trait BehaviorProvider: Send + Sync {
    async fn human_probability(
        &self,
        account: AccountId,
        session: Option<&DeviceFingerprint>,
    ) -> Result<f64, ProviderError>;
}

/// Source of truth for identity verification.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verification(&self, account: AccountId) -> Result<VerificationRecord, ProviderError>;
}

/// Receives settled mining amounts.
#[async_trait]
pub trait SettlementSink: Send + Sync {
    async fn submit(&self, record: SettlementRecord) -> Result<(), ProviderError>;
}
