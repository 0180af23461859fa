//! In-memory collaborator fakes for tests and benches.
//!
//! Enabled by the `testing` feature for downstream test crates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use accrue_core::error::ProviderError;
use accrue_core::fingerprint::DeviceFingerprint;
use accrue_core::traits::{BehaviorProvider, IdentityProvider, QualityProvider, SettlementSink};
use accrue_core::types::{
    AccountId, ContentRef, SettlementRecord, VerificationRecord, VerificationStatus, VerificationTier,
};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::engine::Collaborators;

/// Identity service backed by a map, with a default for unknown accounts.
pub struct StaticIdentity {
    default: VerificationRecord,
    records: Mutex<HashMap<AccountId, VerificationRecord>>,
}

impl StaticIdentity {
    pub fn new(default: VerificationRecord) -> Self {
        Self { default, records: Mutex::new(HashMap::new()) }
    }

    /// Every account verified at `Basic` without strong auth.
    pub fn verified() -> Self {
        Self::new(VerificationRecord {
            tier: VerificationTier::Basic,
            status: VerificationStatus::Verified,
            strong_auth: false,
        })
    }

    pub fn set(&self, account: AccountId, record: VerificationRecord) {
        self.records.lock().insert(account, record);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verification(&self, account: AccountId) -> Result<VerificationRecord, ProviderError> {
        Ok(self.records.lock().get(&account).copied().unwrap_or(self.default))
    }
}

/// Behaviour model returning a fixed probability per account.
///
/// A probability set for a session fingerprint wins over the account's.
pub struct StaticBehavior {
    default: f64,
    scores: Mutex<HashMap<AccountId, f64>>,
    sessions: Mutex<HashMap<DeviceFingerprint, f64>>,
}

impl StaticBehavior {
    pub fn new(default: f64) -> Self {
        Self { default, scores: Mutex::new(HashMap::new()), sessions: Mutex::new(HashMap::new()) }
    }

    pub fn set(&self, account: AccountId, probability: f64) {
        self.scores.lock().insert(account, probability);
    }

    pub fn set_session(&self, session: DeviceFingerprint, probability: f64) {
        self.sessions.lock().insert(session, probability);
    }
}

#[async_trait]
impl BehaviorProvider for StaticBehavior {
    async fn human_probability(
        &self,
        account: AccountId,
        session: Option<&DeviceFingerprint>,
    ) -> Result<f64, ProviderError> {
        if let Some(p) = session.and_then(|s| self.sessions.lock().get(s).copied()) {
            return Ok(p);
        }
        Ok(self.scores.lock().get(&account).copied().unwrap_or(self.default))
    }
}

/// Behaviour model that never answers in time.
pub struct SlowBehavior {
    pub delay: Duration,
}

#[async_trait]
impl BehaviorProvider for SlowBehavior {
    async fn human_probability(
        &self,
        _account: AccountId,
        _session: Option<&DeviceFingerprint>,
    ) -> Result<f64, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(1.0)
    }
}

/// Quality model returning a fixed score.
pub struct StaticQuality(pub f64);

#[async_trait]
impl QualityProvider for StaticQuality {
    async fn score(&self, _content: &ContentRef) -> Result<f64, ProviderError> {
        Ok(self.0)
    }
}

/// Quality model that always fails.
pub struct FailingQuality {
    pub best_effort: bool,
}

#[async_trait]
impl QualityProvider for FailingQuality {
    async fn score(&self, _content: &ContentRef) -> Result<f64, ProviderError> {
        Err(ProviderError::Unavailable { service: "quality", reason: "model offline".into() })
    }

    fn is_best_effort(&self) -> bool {
        self.best_effort
    }
}

/// Settlement sink that keeps every submitted record.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<SettlementRecord>>,
    reject: Mutex<bool>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<SettlementRecord> {
        self.records.lock().clone()
    }

    /// Make subsequent submissions fail.
    pub fn reject_all(&self, reject: bool) {
        *self.reject.lock() = reject;
    }
}

#[async_trait]
impl SettlementSink for RecordingSink {
    async fn submit(&self, record: SettlementRecord) -> Result<(), ProviderError> {
        if *self.reject.lock() {
            return Err(ProviderError::Unavailable { service: "settlement", reason: "ledger rejected".into() });
        }
        self.records.lock().push(record);
        Ok(())
    }
}

/// Handles to the fakes wired into a [`Collaborators`] set.
pub struct Fakes {
    pub identity: Arc<StaticIdentity>,
    pub behavior: Arc<StaticBehavior>,
    pub sink: Arc<RecordingSink>,
}

impl Fakes {
    /// Verified identities, confident humans, neutral quality.
    pub fn new() -> Self {
        Self {
            identity: Arc::new(StaticIdentity::verified()),
            behavior: Arc::new(StaticBehavior::new(0.95)),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        self.collaborators_with_quality(Arc::new(StaticQuality(1.0)))
    }

    pub fn collaborators_with_quality(&self, quality: Arc<dyn QualityProvider>) -> Collaborators {
        Collaborators {
            identity: self.identity.clone(),
            behavior: self.behavior.clone(),
            quality,
            settlement: self.sink.clone(),
        }
    }
}

impl Default for Fakes {
    fn default() -> Self {
        Self::new()
    }
}
