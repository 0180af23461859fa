//! Reward policy parameters.
//!
//! Every tunable number in the computation path lives here. Defaults mirror
//! [`constants`](crate::constants); deployments load overrides from a config
//! file (see the `accrue-sim` binary) and must call [`RewardParams::validate`]
//! before handing the parameters to an engine.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::effects::{EffectDefinition, EffectOp, Metric, StackPolicy};
use crate::error::ConfigError;
use crate::primitives::{tier_lookup, Bounds};
use crate::progression::{ActivityKind, Platform};
use crate::types::{VerificationStatus, VerificationTier};

/// Complete policy for one engine instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardParams {
    pub trust: TrustParams,
    pub network: NetworkParams,
    pub progression: ProgressionParams,
    pub effects: EffectParams,
    pub mining: MiningParams,
    pub upstream: UpstreamParams,
}

impl RewardParams {
    /// Reject internally inconsistent parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trust.validate()?;
        self.network.validate()?;
        self.progression.validate()?;
        self.effects.validate()?;
        self.mining.validate()?;
        self.upstream.validate()
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

fn check_positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite and > 0, got {v}")))
    }
}

fn check_non_negative(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite and >= 0, got {v}")))
    }
}

fn check_bounds(field: &'static str, b: &Bounds) -> Result<(), ConfigError> {
    if b.min.is_finite() && b.max.is_finite() && b.min <= b.max {
        Ok(())
    } else {
        Err(invalid(field, format!("min {} must not exceed max {}", b.min, b.max)))
    }
}

fn check_ascending(field: &'static str, values: impl Iterator<Item = f64>) -> Result<(), ConfigError> {
    let mut prev: Option<f64> = None;
    for v in values {
        if !v.is_finite() {
            return Err(invalid(field, format!("non-finite threshold {v}")));
        }
        if let Some(p) = prev {
            if v <= p {
                return Err(invalid(field, format!("thresholds must be strictly ascending ({p} then {v})")));
            }
        }
        prev = Some(v);
    }
    if prev.is_none() {
        return Err(invalid(field, "table must not be empty"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trust
// ---------------------------------------------------------------------------

/// Multiplier per [`VerificationStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMultipliers {
    pub unverified: f64,
    pub pending: f64,
    pub verified: f64,
    pub rejected: f64,
    pub suspended: f64,
}

impl Default for StatusMultipliers {
    fn default() -> Self {
        Self { unverified: 0.8, pending: 0.9, verified: 1.2, rejected: 0.5, suspended: 0.0 }
    }
}

impl StatusMultipliers {
    pub fn get(&self, status: VerificationStatus) -> f64 {
        match status {
            VerificationStatus::Unverified => self.unverified,
            VerificationStatus::Pending => self.pending,
            VerificationStatus::Verified => self.verified,
            VerificationStatus::Rejected => self.rejected,
            VerificationStatus::Suspended => self.suspended,
        }
    }
}

/// Multiplier per [`VerificationTier`]. `None` never reaches the lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierMultipliers {
    pub basic: f64,
    pub standard: f64,
    pub premium: f64,
    pub enterprise: f64,
}

impl Default for TierMultipliers {
    fn default() -> Self {
        Self { basic: 1.0, standard: 1.25, premium: 1.5, enterprise: 2.0 }
    }
}

impl TierMultipliers {
    pub fn get(&self, tier: VerificationTier) -> Option<f64> {
        match tier {
            VerificationTier::None => None,
            VerificationTier::Basic => Some(self.basic),
            VerificationTier::Standard => Some(self.standard),
            VerificationTier::Premium => Some(self.premium),
            VerificationTier::Enterprise => Some(self.enterprise),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustParams {
    pub min_human_probability: f64,
    pub confident_human_probability: f64,
    pub min_behavior_penalty: f64,
    pub status_multipliers: StatusMultipliers,
    pub tier_multipliers: TierMultipliers,
    pub strong_auth_bonus: f64,
    pub max_multiplier: f64,
    pub ttl_secs: u64,
}

impl Default for TrustParams {
    fn default() -> Self {
        Self {
            min_human_probability: MIN_HUMAN_PROBABILITY,
            confident_human_probability: CONFIDENT_HUMAN_PROBABILITY,
            min_behavior_penalty: MIN_BEHAVIOR_PENALTY,
            status_multipliers: StatusMultipliers::default(),
            tier_multipliers: TierMultipliers::default(),
            strong_auth_bonus: STRONG_AUTH_BONUS,
            max_multiplier: MAX_TRUST_MULTIPLIER,
            ttl_secs: TRUST_TTL_SECS,
        }
    }
}

impl TrustParams {
    fn validate(&self) -> Result<(), ConfigError> {
        let lo = self.min_human_probability;
        let hi = self.confident_human_probability;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(invalid(
                "trust.min_human_probability",
                format!("need 0 <= min ({lo}) <= confident ({hi}) <= 1"),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_behavior_penalty) {
            return Err(invalid("trust.min_behavior_penalty", "must be in [0, 1]"));
        }
        let s = &self.status_multipliers;
        for v in [s.unverified, s.pending, s.verified, s.rejected, s.suspended] {
            check_non_negative("trust.status_multipliers", v)?;
        }
        let t = &self.tier_multipliers;
        for v in [t.basic, t.standard, t.premium, t.enterprise] {
            check_positive("trust.tier_multipliers", v)?;
        }
        check_positive("trust.strong_auth_bonus", self.strong_auth_bonus)?;
        check_positive("trust.max_multiplier", self.max_multiplier)?;
        if self.ttl_secs == 0 {
            return Err(invalid("trust.ttl_secs", "must be non-zero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// One referral-points tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpTier {
    pub name: String,
    pub min_points: f64,
    pub multiplier: f64,
}

impl RpTier {
    fn new(name: &str, min_points: f64, multiplier: f64) -> Self {
        Self { name: name.to_string(), min_points, multiplier }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParams {
    /// Points weight for L1, L2, L3 members.
    pub level_weights: [f64; REFERRAL_DEPTH],
    pub points_per_member: f64,
    pub dormant_weight: f64,
    pub active_window_secs: u64,
    /// Ascending by `min_points`; the first tier must start at 0.
    pub rp_tiers: Vec<RpTier>,
    pub regression_coefficient: f64,
    pub regression_floor: f64,
    pub multiplier_bounds: Bounds,
    pub device_burst_limit: usize,
    pub device_burst_window_secs: u64,
    pub cluster_min_members: usize,
    /// Share of a network that may come from one fingerprint before flagging.
    pub cluster_share: f64,
    pub low_activity_min_members: usize,
    pub low_activity_ratio: f64,
    /// Optimistic-lock retries for a contended referral registration.
    pub max_register_attempts: u32,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            level_weights: LEVEL_WEIGHTS,
            points_per_member: POINTS_PER_MEMBER,
            dormant_weight: DORMANT_WEIGHT,
            active_window_secs: ACTIVE_WINDOW_SECS,
            rp_tiers: vec![
                RpTier::new("explorer", 0.0, 1.0),
                RpTier::new("connector", 1_000.0, 1.2),
                RpTier::new("influencer", 5_000.0, 1.5),
                RpTier::new("leader", 15_000.0, 2.0),
                RpTier::new("ambassador", 50_000.0, 3.0),
            ],
            regression_coefficient: NETWORK_REGRESSION_COEFFICIENT,
            regression_floor: NETWORK_REGRESSION_FLOOR,
            multiplier_bounds: Bounds::new(1.0, MAX_NETWORK_MULTIPLIER),
            device_burst_limit: DEVICE_BURST_LIMIT,
            device_burst_window_secs: DEVICE_BURST_WINDOW_SECS,
            cluster_min_members: 5,
            cluster_share: 0.5,
            low_activity_min_members: 10,
            low_activity_ratio: 0.1,
            max_register_attempts: 8,
        }
    }
}

impl NetworkParams {
    /// Lower bounds of the RP tiers, for [`tier_lookup`](crate::primitives::tier_lookup).
    pub fn tier_bounds(&self) -> Vec<f64> {
        self.rp_tiers.iter().map(|t| t.min_points).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for w in self.level_weights {
            check_non_negative("network.level_weights", w)?;
        }
        check_non_negative("network.points_per_member", self.points_per_member)?;
        if !(0.0..=1.0).contains(&self.dormant_weight) {
            return Err(invalid("network.dormant_weight", "must be in [0, 1]"));
        }
        check_ascending("network.rp_tiers", self.rp_tiers.iter().map(|t| t.min_points))?;
        if self.rp_tiers.first().is_some_and(|t| t.min_points != 0.0) {
            return Err(invalid("network.rp_tiers", "first tier must start at 0 points"));
        }
        for t in &self.rp_tiers {
            check_positive("network.rp_tiers.multiplier", t.multiplier)?;
        }
        check_non_negative("network.regression_coefficient", self.regression_coefficient)?;
        check_bounds("network.multiplier_bounds", &self.multiplier_bounds)?;
        if !(0.0..=1.0).contains(&self.cluster_share) || self.cluster_share == 0.0 {
            return Err(invalid("network.cluster_share", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.low_activity_ratio) {
            return Err(invalid("network.low_activity_ratio", "must be in [0, 1]"));
        }
        if self.device_burst_window_secs == 0 || self.active_window_secs == 0 {
            return Err(invalid("network.windows", "windows must be non-zero"));
        }
        if self.max_register_attempts == 0 {
            return Err(invalid("network.max_register_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// XP rule for one activity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRule {
    pub kind: ActivityKind,
    pub base_xp: u64,
    /// Rolling 24h cap; `None` means uncapped.
    pub daily_cap: Option<u32>,
    /// How strongly the quality score moves XP: 0 ignores it, 1 applies it fully.
    pub quality_weight: f64,
}

impl ActivityRule {
    fn new(kind: ActivityKind, base_xp: u64, daily_cap: Option<u32>, quality_weight: f64) -> Self {
        Self { kind, base_xp, daily_cap, quality_weight }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformMultiplier {
    pub platform: Platform,
    pub multiplier: f64,
}

/// Level band with a linearly interpolated mining multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelBand {
    pub name: String,
    pub min_level: u32,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl LevelBand {
    fn new(name: &str, min_level: u32, min_multiplier: f64, max_multiplier: f64) -> Self {
        Self { name: name.to_string(), min_level, min_multiplier, max_multiplier }
    }
}

/// XP multiplier reached after `min_days` consecutive active days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakTier {
    pub min_days: u32,
    pub multiplier: f64,
}

impl StreakTier {
    fn new(min_days: u32, multiplier: f64) -> Self {
        Self { min_days, multiplier }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionParams {
    pub level_base_xp: f64,
    pub level_growth: f64,
    pub max_level: u32,
    pub damping_coefficient: f64,
    pub quality_bounds: Bounds,
    pub cap_window_secs: u64,
    pub activities: Vec<ActivityRule>,
    pub platforms: Vec<PlatformMultiplier>,
    /// Ascending by `min_level`; the first band must start at level 1.
    pub level_bands: Vec<LevelBand>,
    pub level_multiplier_bounds: Bounds,
    /// Ascending by `min_days`; streaks below the first tier earn 1.0.
    pub streak_tiers: Vec<StreakTier>,
    pub streak_bonus_bounds: Bounds,
}

impl Default for ProgressionParams {
    fn default() -> Self {
        use ActivityKind::*;
        Self {
            level_base_xp: LEVEL_BASE_XP,
            level_growth: LEVEL_GROWTH,
            max_level: MAX_LEVEL,
            damping_coefficient: LEVEL_DAMPING_COEFFICIENT,
            quality_bounds: Bounds::new(MIN_QUALITY, MAX_QUALITY),
            cap_window_secs: DAY_SECS,
            activities: vec![
                ActivityRule::new(OriginalPost, 50, Some(25), 1.0),
                ActivityRule::new(PhotoPost, 75, Some(20), 1.0),
                ActivityRule::new(VideoPost, 150, Some(10), 1.0),
                ActivityRule::new(Story, 25, Some(50), 1.0),
                ActivityRule::new(Comment, 25, Some(100), 0.5),
                ActivityRule::new(Like, 5, Some(200), 0.0),
                ActivityRule::new(Share, 15, Some(50), 0.5),
                ActivityRule::new(Follow, 20, Some(25), 0.0),
                ActivityRule::new(DailyLogin, 10, Some(1), 0.0),
                ActivityRule::new(DailyQuest, 100, Some(3), 0.0),
                ActivityRule::new(Milestone, 500, None, 0.0),
                ActivityRule::new(ViralContent, 1_000, None, 1.0),
            ],
            platforms: vec![
                PlatformMultiplier { platform: Platform::Native, multiplier: 1.0 },
                PlatformMultiplier { platform: Platform::Instagram, multiplier: 1.2 },
                PlatformMultiplier { platform: Platform::TikTok, multiplier: 1.3 },
                PlatformMultiplier { platform: Platform::YouTube, multiplier: 1.4 },
                PlatformMultiplier { platform: Platform::X, multiplier: 1.2 },
                PlatformMultiplier { platform: Platform::Facebook, multiplier: 1.1 },
            ],
            level_bands: vec![
                LevelBand::new("bronze", 1, 1.0, 1.2),
                LevelBand::new("silver", 11, 1.3, 1.8),
                LevelBand::new("gold", 26, 1.9, 2.5),
                LevelBand::new("platinum", 51, 2.6, 3.2),
                LevelBand::new("diamond", 76, 3.3, 4.0),
                LevelBand::new("mythic", 101, 4.1, 5.0),
            ],
            level_multiplier_bounds: Bounds::new(1.0, MAX_LEVEL_MULTIPLIER),
            streak_tiers: vec![
                StreakTier::new(0, 1.0),
                StreakTier::new(3, 1.2),
                StreakTier::new(7, 1.5),
                StreakTier::new(14, 2.0),
                StreakTier::new(30, 2.5),
                StreakTier::new(60, 3.0),
            ],
            streak_bonus_bounds: Bounds::new(1.0, MAX_STREAK_BONUS),
        }
    }
}

impl ProgressionParams {
    pub fn rule(&self, kind: ActivityKind) -> Option<&ActivityRule> {
        self.activities.iter().find(|r| r.kind == kind)
    }

    /// Platform multiplier; unlisted platforms earn the neutral 1.0.
    pub fn platform_multiplier(&self, platform: Platform) -> f64 {
        self.platforms
            .iter()
            .find(|p| p.platform == platform)
            .map_or(1.0, |p| p.multiplier)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("progression.level_base_xp", self.level_base_xp)?;
        if !self.level_growth.is_finite() || self.level_growth < 1.0 {
            return Err(invalid("progression.level_growth", "must be finite and >= 1"));
        }
        if self.max_level == 0 {
            return Err(invalid("progression.max_level", "must be at least 1"));
        }
        check_non_negative("progression.damping_coefficient", self.damping_coefficient)?;
        check_bounds("progression.quality_bounds", &self.quality_bounds)?;
        check_bounds("progression.level_multiplier_bounds", &self.level_multiplier_bounds)?;
        check_bounds("progression.streak_bonus_bounds", &self.streak_bonus_bounds)?;
        check_ascending("progression.streak_tiers", self.streak_tiers.iter().map(|t| t.min_days as f64))?;
        for t in &self.streak_tiers {
            check_positive("progression.streak_tiers.multiplier", t.multiplier)?;
        }
        if self.cap_window_secs == 0 {
            return Err(invalid("progression.cap_window_secs", "must be non-zero"));
        }
        for kind in ActivityKind::ALL {
            let rule = self
                .rule(kind)
                .ok_or_else(|| invalid("progression.activities", format!("missing rule for {kind:?}")))?;
            if !(0.0..=1.0).contains(&rule.quality_weight) {
                return Err(invalid("progression.activities.quality_weight", "must be in [0, 1]"));
            }
        }
        for p in &self.platforms {
            check_positive("progression.platforms.multiplier", p.multiplier)?;
        }
        check_ascending("progression.level_bands", self.level_bands.iter().map(|b| b.min_level as f64))?;
        if self.level_bands.first().is_some_and(|b| b.min_level != 1) {
            return Err(invalid("progression.level_bands", "first band must start at level 1"));
        }
        for b in &self.level_bands {
            check_positive("progression.level_bands.min_multiplier", b.min_multiplier)?;
            if b.max_multiplier < b.min_multiplier {
                return Err(invalid("progression.level_bands", format!("band {} is inverted", b.name)));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    pub catalog: Vec<EffectDefinition>,
    /// Resolved value bounds per metric.
    pub mining_bounds: Bounds,
    pub xp_bounds: Bounds,
    pub network_bounds: Bounds,
}

impl Default for EffectParams {
    fn default() -> Self {
        use EffectOp::*;
        use Metric::*;
        use StackPolicy::*;
        let hours = |h: u64| Some(h * HOUR_SECS);
        Self {
            catalog: vec![
                EffectDefinition::new("double_mining", MiningRate, Multiply, 2.0, hours(24), RejectWhileActive),
                EffectDefinition::new("triple_mining", MiningRate, Multiply, 3.0, hours(12), RejectWhileActive),
                EffectDefinition::new("mining_frenzy", MiningRate, Multiply, 6.0, hours(4), RejectWhileActive),
                EffectDefinition::new("eternal_miner", MiningRate, Multiply, 1.5, hours(24 * 30), ReplaceExisting),
                EffectDefinition::new("mining_boost", MiningRate, Add, 0.2, hours(24), Stackable),
                EffectDefinition::new("xp_double", Xp, Multiply, 2.0, hours(24), RejectWhileActive),
                EffectDefinition::new("referral_boost", Network, Multiply, 1.5, hours(24 * 7), Stackable),
                EffectDefinition::new("network_amplifier", Network, Add, 0.5, hours(24), RejectWhileActive),
                EffectDefinition::new("probation", MiningRate, Set, 0.5, hours(24 * 7), ReplaceExisting),
            ],
            mining_bounds: Bounds::new(0.0, MAX_EFFECT_MULTIPLIER),
            xp_bounds: Bounds::new(0.0, 10.0),
            network_bounds: Bounds::new(0.0, 5.0),
        }
    }
}

impl EffectParams {
    pub fn definition(&self, name: &str) -> Option<&EffectDefinition> {
        self.catalog.iter().find(|d| d.name == name)
    }

    pub fn bounds(&self, metric: Metric) -> Bounds {
        match metric {
            Metric::MiningRate => self.mining_bounds,
            Metric::Xp => self.xp_bounds,
            Metric::Network => self.network_bounds,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for def in &self.catalog {
            def.validate().map_err(|e| invalid("effects.catalog", e.to_string()))?;
        }
        let mut names: Vec<&str> = self.catalog.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(invalid("effects.catalog", "duplicate effect name"));
        }
        check_bounds("effects.mining_bounds", &self.mining_bounds)?;
        check_bounds("effects.xp_bounds", &self.xp_bounds)?;
        check_bounds("effects.network_bounds", &self.network_bounds)
    }
}

// ---------------------------------------------------------------------------
// Mining
// ---------------------------------------------------------------------------

/// One row of the phase table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseParams {
    pub name: String,
    /// Inclusive upper participant bound; `None` for the last phase.
    pub max_participants: Option<u64>,
    /// Tokens per hour.
    pub base_rate: f64,
    pub pioneer_bonus: f64,
    /// Whole tokens per account per day.
    pub daily_cap: f64,
}

impl PhaseParams {
    fn new(name: &str, max_participants: Option<u64>, base_rate: f64, pioneer_bonus: f64, daily_cap: f64) -> Self {
        Self { name: name.to_string(), max_participants, base_rate, pioneer_bonus, daily_cap }
    }
}

/// Mining multiplier for holders staking at least `min_tokens`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingTier {
    pub min_tokens: f64,
    pub multiplier: f64,
}

impl StakingTier {
    fn new(min_tokens: f64, multiplier: f64) -> Self {
        Self { min_tokens, multiplier }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningParams {
    /// Ordered by ascending `max_participants`.
    pub phases: Vec<PhaseParams>,
    pub holdings_regression_coefficient: f64,
    /// Ascending by `min_tokens`; stakes below the first tier earn 1.0.
    pub staking_tiers: Vec<StakingTier>,
    /// Tokens per hour.
    pub rate_ceiling: f64,
    pub rate_cache_ttl_secs: u64,
    pub max_settlement_secs: u64,
}

impl Default for MiningParams {
    fn default() -> Self {
        Self {
            phases: vec![
                PhaseParams::new("pioneer", Some(100_000), 0.1, 2.0, 4.8),
                PhaseParams::new("growth", Some(1_000_000), 0.05, 1.5, 1.8),
                PhaseParams::new("maturity", Some(10_000_000), 0.025, 1.2, 0.72),
                PhaseParams::new("stability", None, 0.01, 1.0, 0.24),
            ],
            holdings_regression_coefficient: HOLDINGS_REGRESSION_COEFFICIENT,
            staking_tiers: vec![
                StakingTier::new(100.0, 1.2),
                StakingTier::new(500.0, 1.35),
                StakingTier::new(1_000.0, 1.5),
                StakingTier::new(5_000.0, 1.75),
                StakingTier::new(10_000.0, 2.0),
            ],
            rate_ceiling: RATE_CEILING_PER_HOUR,
            rate_cache_ttl_secs: 60,
            max_settlement_secs: MAX_SETTLEMENT_SECS,
        }
    }
}

impl MiningParams {
    /// Mining multiplier for `staked` whole tokens.
    pub fn staking_multiplier(&self, staked: f64) -> f64 {
        let starts: Vec<f64> = self.staking_tiers.iter().map(|t| t.min_tokens).collect();
        tier_lookup(staked, &starts).map_or(1.0, |i| self.staking_tiers[i].multiplier)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let Some(last) = self.phases.last() else {
            return Err(invalid("mining.phases", "table must not be empty"));
        };
        if last.max_participants.is_some() {
            return Err(invalid("mining.phases", "last phase must be unbounded"));
        }
        let bounded = &self.phases[..self.phases.len() - 1];
        if bounded.iter().any(|p| p.max_participants.is_none()) {
            return Err(invalid("mining.phases", "only the last phase may be unbounded"));
        }
        if !bounded.is_empty() {
            check_ascending(
                "mining.phases",
                bounded.iter().filter_map(|p| p.max_participants).map(|m| m as f64),
            )?;
        }
        for p in &self.phases {
            check_positive("mining.phases.base_rate", p.base_rate)?;
            check_positive("mining.phases.pioneer_bonus", p.pioneer_bonus)?;
            check_positive("mining.phases.daily_cap", p.daily_cap)?;
        }
        check_non_negative("mining.holdings_regression_coefficient", self.holdings_regression_coefficient)?;
        check_ascending("mining.staking_tiers", self.staking_tiers.iter().map(|t| t.min_tokens))?;
        for t in &self.staking_tiers {
            check_positive("mining.staking_tiers.multiplier", t.multiplier)?;
        }
        check_positive("mining.rate_ceiling", self.rate_ceiling)?;
        if self.max_settlement_secs == 0 {
            return Err(invalid("mining.max_settlement_secs", "must be non-zero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Upstream collaborators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamParams {
    /// Per-call timeout for identity, behaviour and quality collaborators.
    pub timeout_ms: u64,
    /// Pause before the single retry of a timed-out call.
    pub retry_backoff_ms: u64,
}

impl Default for UpstreamParams {
    fn default() -> Self {
        Self { timeout_ms: 500, retry_backoff_ms: 50 }
    }
}

impl UpstreamParams {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(invalid("upstream.timeout_ms", "must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        RewardParams::default().validate().unwrap();
    }

    #[test]
    fn default_phase_table() {
        let m = MiningParams::default();
        assert_eq!(m.phases.len(), 4);
        assert_eq!(m.phases[0].base_rate, 0.1);
        assert_eq!(m.phases[0].pioneer_bonus, 2.0);
        assert_eq!(m.phases[3].max_participants, None);
    }

    #[test]
    fn default_trust_thresholds() {
        let t = TrustParams::default();
        assert_eq!(t.min_human_probability, 0.7);
        assert_eq!(t.confident_human_probability, 0.9);
        assert_eq!(t.ttl_secs, 300);
        assert_eq!(t.status_multipliers.get(VerificationStatus::Suspended), 0.0);
        assert_eq!(t.tier_multipliers.get(VerificationTier::None), None);
    }

    #[test]
    fn every_activity_has_a_rule() {
        let p = ProgressionParams::default();
        for kind in ActivityKind::ALL {
            assert!(p.rule(kind).is_some(), "{kind:?}");
        }
    }

    #[test]
    fn unlisted_platform_is_neutral() {
        let p = ProgressionParams { platforms: vec![], ..Default::default() };
        assert_eq!(p.platform_multiplier(Platform::TikTok), 1.0);
    }

    #[test]
    fn rejects_inverted_probabilities() {
        let mut params = RewardParams::default();
        params.trust.min_human_probability = 0.95;
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("trust.min_human_probability"));
    }

    #[test]
    fn rejects_unsorted_rp_tiers() {
        let mut params = RewardParams::default();
        params.network.rp_tiers.swap(1, 2);
        assert!(params.validate().is_err());
    }

    #[test]
    fn staking_tiers_pick_highest_reached() {
        let m = MiningParams::default();
        assert_eq!(m.staking_multiplier(0.0), 1.0);
        assert_eq!(m.staking_multiplier(99.9), 1.0);
        assert_eq!(m.staking_multiplier(100.0), 1.2);
        assert_eq!(m.staking_multiplier(4_999.0), 1.5);
        assert_eq!(m.staking_multiplier(1e9), 2.0);
    }

    #[test]
    fn rejects_unsorted_streak_tiers() {
        let mut params = RewardParams::default();
        params.progression.streak_tiers.swap(2, 3);
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("progression.streak_tiers"));
    }

    #[test]
    fn rejects_bounded_last_phase() {
        let mut params = RewardParams::default();
        params.mining.phases.pop();
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_effect_names() {
        let mut params = RewardParams::default();
        let dup = params.effects.catalog[0].clone();
        params.effects.catalog.push(dup);
        assert!(params.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let params: RewardParams =
            serde_json::from_str(r#"{"mining": {"rate_ceiling": 2.5}}"#).unwrap();
        assert_eq!(params.mining.rate_ceiling, 2.5);
        assert_eq!(params.mining.phases.len(), 4);
        assert_eq!(params.trust, TrustParams::default());
    }
}
