//! Seeded population simulation.
//!
//! Collaborators answer deterministically from `(seed, account)`, so two runs
//! with the same seed and parameters produce the same summary.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use accrue_core::constants::{HOUR_SECS, MICRO};
use accrue_core::error::{AccrueError, ProviderError, TrustError};
use accrue_core::params::RewardParams;
use accrue_core::progression::{Activity, ActivityKind, Platform};
use accrue_core::traits::{BehaviorProvider, IdentityProvider, QualityProvider, SettlementSink};
use accrue_core::types::{
    AccountId, ContentRef, SettlementRecord, Timestamp, VerificationRecord, VerificationStatus, VerificationTier,
};
use accrue_engine::{Collaborators, LeaderboardEntry, LeaderboardKind, MiningRateEngine, RateBreakdown};
use accrue_graph::DeviceFingerprint;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

/// Population shape.
#[derive(Debug, Clone)]
pub struct Population {
    pub accounts: u64,
    /// Share of accounts driven by bots.
    pub bot_share: f64,
    /// Share of accounts signing up from the shared farm device.
    pub farm_share: f64,
    /// Chance a new account joins through a referral.
    pub referral_rate: f64,
}

impl Default for Population {
    fn default() -> Self {
        Self { accounts: 200, bot_share: 0.05, farm_share: 0.03, referral_rate: 0.7 }
    }
}

fn farm_device() -> DeviceFingerprint {
    DeviceFingerprint::from_parts("sim-farm", "198.51.100.1")
}

fn account_rng(seed: u64, account: AccountId, salt: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ account.0.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ salt)
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

struct SimIdentity {
    seed: u64,
}

#[async_trait]
impl IdentityProvider for SimIdentity {
    async fn verification(&self, account: AccountId) -> Result<VerificationRecord, ProviderError> {
        let mut rng = account_rng(self.seed, account, 1);
        let tier = match rng.gen_range(0..100) {
            0..5 => VerificationTier::None,
            5..60 => VerificationTier::Basic,
            60..85 => VerificationTier::Standard,
            85..97 => VerificationTier::Premium,
            _ => VerificationTier::Enterprise,
        };
        let status = match tier {
            VerificationTier::None => VerificationStatus::Unverified,
            _ if rng.gen_bool(0.02) => VerificationStatus::Suspended,
            _ => VerificationStatus::Verified,
        };
        Ok(VerificationRecord { tier, status, strong_auth: rng.gen_bool(0.3) })
    }
}

struct SimBehavior {
    seed: u64,
    bot_share: f64,
    farm: DeviceFingerprint,
}

#[async_trait]
impl BehaviorProvider for SimBehavior {
    async fn human_probability(
        &self,
        account: AccountId,
        session: Option<&DeviceFingerprint>,
    ) -> Result<f64, ProviderError> {
        let mut rng = account_rng(self.seed, account, 2);
        if session == Some(&self.farm) {
            // Emulated devices look borderline at best.
            Ok(rng.gen_range(0.4..0.8))
        } else if rng.gen_bool(self.bot_share) {
            Ok(rng.gen_range(0.2..0.69))
        } else {
            Ok(rng.gen_range(0.75..1.0))
        }
    }
}

struct SimQuality {
    seed: u64,
}

#[async_trait]
impl QualityProvider for SimQuality {
    async fn score(&self, content: &ContentRef) -> Result<f64, ProviderError> {
        let salt = content.content_id.bytes().fold(3u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64));
        Ok(account_rng(self.seed, content.account, salt).gen_range(0.5..2.0))
    }
}

/// Totals of everything the engine paid out.
#[derive(Default)]
struct SimLedger {
    records: AtomicU64,
    paid: AtomicU64,
}

#[async_trait]
impl SettlementSink for SimLedger {
    async fn submit(&self, record: SettlementRecord) -> Result<(), ProviderError> {
        self.records.fetch_add(1, Ordering::Relaxed);
        self.paid.fetch_add(record.amount, Ordering::Relaxed);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub now: Timestamp,
    pub activities: u64,
    pub settled: u64,
    pub minted: u64,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub generated_at: String,
    pub seed: u64,
    pub ticks: u64,
    pub accounts: u64,
    pub simulated_secs: u64,
    pub settlements: u64,
    pub total_mined_tokens: f64,
    pub flagged_accounts: u64,
    /// Failed operations by error kind.
    pub errors: BTreeMap<&'static str, u64>,
    pub top_mined: Vec<LeaderboardEntry>,
    pub top_xp: Vec<LeaderboardEntry>,
    /// Breakdown of the top miner's current rate.
    pub leader_breakdown: Option<RateBreakdown>,
}

pub struct Simulation {
    seed: u64,
    engine: Arc<MiningRateEngine>,
    ledger: Arc<SimLedger>,
    rng: StdRng,
    accounts: Vec<AccountId>,
    errors: BTreeMap<&'static str, u64>,
    ticks: u64,
    now: Timestamp,
}

fn error_kind(err: &AccrueError) -> &'static str {
    match err {
        AccrueError::Trust(TrustError::InsufficientVerification { .. }) => "insufficient_verification",
        AccrueError::Trust(TrustError::LowHumanConfidence { .. }) => "low_human_confidence",
        AccrueError::Trust(TrustError::StaleAssessment { .. }) => "stale_assessment",
        AccrueError::Referral(_) => "referral",
        AccrueError::Effect(_) => "effect",
        AccrueError::Progression(_) => "progression",
        AccrueError::AccountSuspended { .. } => "account_suspended",
        AccrueError::UpstreamTimeout { .. } => "upstream_timeout",
        AccrueError::Upstream { .. } => "upstream",
        _ => "other",
    }
}

impl Simulation {
    pub fn new(params: RewardParams, seed: u64, population: &Population) -> Result<Self, AccrueError> {
        let ledger = Arc::new(SimLedger::default());
        let collaborators = Collaborators {
            identity: Arc::new(SimIdentity { seed }),
            behavior: Arc::new(SimBehavior { seed, bot_share: population.bot_share, farm: farm_device() }),
            quality: Arc::new(SimQuality { seed }),
            settlement: ledger.clone(),
        };
        let engine = Arc::new(MiningRateEngine::new(params, collaborators)?);
        let mut sim = Self {
            seed,
            engine,
            ledger,
            rng: StdRng::seed_from_u64(seed),
            accounts: Vec::new(),
            errors: BTreeMap::new(),
            ticks: 0,
            now: 0,
        };
        sim.populate(population)?;
        Ok(sim)
    }

    fn record_error(&mut self, err: &AccrueError) {
        debug!(error = %err, "sim: operation failed");
        *self.errors.entry(error_kind(err)).or_default() += 1;
    }

    /// Register accounts, wiring referrals to earlier accounts.
    fn populate(&mut self, population: &Population) -> Result<(), AccrueError> {
        let farm = farm_device();
        for n in 0..population.accounts {
            let id = AccountId(n);
            let fingerprint = if self.rng.gen_bool(population.farm_share) {
                farm
            } else {
                let ip = format!("10.{}.{}.{}", (n >> 16) & 255, (n >> 8) & 255, n & 255);
                DeviceFingerprint::from_parts(&format!("device-{n}"), &ip)
            };
            self.engine.register_account(id, 0, Some(fingerprint))?;
            if !self.accounts.is_empty() && self.rng.gen_bool(population.referral_rate) {
                let referrer = self.accounts[self.rng.gen_range(0..self.accounts.len())];
                if let Err(e) = self.engine.register_referral(referrer, id, 0) {
                    self.record_error(&e);
                }
            }
            self.accounts.push(id);
        }
        info!(accounts = self.accounts.len(), "sim: population registered");
        Ok(())
    }

    /// Everyday activity; milestones and viral hits are not simulated.
    fn random_activity(&mut self, at: Timestamp) -> Activity {
        let kind = ActivityKind::ALL[self.rng.gen_range(0..ActivityKind::ALL.len() - 2)];
        let platform = match self.rng.gen_range(0..6) {
            0 => Platform::Instagram,
            1 => Platform::TikTok,
            2 => Platform::YouTube,
            3 => Platform::X,
            4 => Platform::Facebook,
            _ => Platform::Native,
        };
        Activity { kind, platform, at }
    }

    /// Advance the clock by `tick_secs`, generate activity and settle everyone.
    pub async fn tick(&mut self, tick_secs: u64) -> TickReport {
        let start = self.now;
        self.now += tick_secs;
        self.ticks += 1;
        let mut report = TickReport { now: self.now, ..Default::default() };
        let minted_before = self.ledger.paid.load(Ordering::Relaxed);

        for i in 0..self.accounts.len() {
            let id = self.accounts[i];
            let events = self.rng.gen_range(0..4);
            for _ in 0..events {
                let at = self.rng.gen_range(start..self.now);
                let activity = self.random_activity(at);
                let content_id = format!("{}-{}-{at}", self.seed, id.0);
                let applied = self.engine.apply_activity(id, activity, Some(&content_id)).await;
                match applied {
                    Ok(_) => report.activities += 1,
                    Err(e) => self.record_error(&e),
                }
            }
            if self.rng.gen_bool(0.01) {
                let name = ["double_mining", "mining_boost", "xp_double", "referral_boost"][self.rng.gen_range(0..4)];
                if let Err(e) = self.engine.activate_effect(id, name, self.now) {
                    self.record_error(&e);
                }
            }
        }

        for i in 0..self.accounts.len() {
            let id = self.accounts[i];
            let settled = self.engine.settle(id, self.now).await;
            match settled {
                Ok(out) if out.amount > 0 => report.settled += 1,
                Ok(_) => {}
                Err(e) => self.record_error(&e),
            }
        }
        self.engine.prune_expired_effects(self.now);
        self.engine.prune_abuse_windows(self.now);

        report.minted = self.ledger.paid.load(Ordering::Relaxed) - minted_before;
        debug!(now = self.now, activities = report.activities, settled = report.settled, "sim: tick complete");
        report
    }

    pub async fn summary(&mut self, top: usize) -> Summary {
        let top_mined = self.engine.leaderboard(LeaderboardKind::Mined, top, self.now);
        let top_xp = self.engine.leaderboard(LeaderboardKind::Xp, top, self.now);
        let leader_breakdown = match top_mined.first() {
            Some(leader) => self.engine.compute_rate(leader.account, self.now).await.ok(),
            None => None,
        };
        let flagged_accounts = self
            .accounts
            .iter()
            .filter(|id| self.engine.graph().flags(**id).is_ok_and(|f| !f.is_empty()))
            .count() as u64;
        Summary {
            generated_at: chrono::Utc::now().to_rfc3339(),
            seed: self.seed,
            ticks: self.ticks,
            accounts: self.accounts.len() as u64,
            simulated_secs: self.now,
            settlements: self.ledger.records.load(Ordering::Relaxed),
            total_mined_tokens: self.ledger.paid.load(Ordering::Relaxed) as f64 / MICRO as f64,
            flagged_accounts,
            errors: self.errors.clone(),
            top_mined,
            top_xp,
            leader_breakdown,
        }
    }
}

/// Default simulated time per tick.
pub const DEFAULT_TICK_SECS: u64 = HOUR_SECS;
