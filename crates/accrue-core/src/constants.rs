//! Protocol constants. All token amounts in micro-tokens (1 token = 10^6 micro).
//!
//! These are the defaults baked into [`RewardParams::default`](crate::params::RewardParams).
//! Deployments override them through configuration; nothing in the
//! computation path reads a constant directly when a parameter exists.

/// Micro-tokens per whole token.
pub const MICRO: u64 = 1_000_000;

/// Seconds in one hour.
pub const HOUR_SECS: u64 = 3_600;

/// Seconds in one day.
pub const DAY_SECS: u64 = 86_400;

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

/// Smallest value [`exponential_regression`](crate::primitives::exponential_regression)
/// ever returns. Keeps every regression factor strictly positive.
pub const REGRESSION_FLOOR: f64 = 0.0001;

/// Holdings regression coefficient: `e^(-0.001 × tokens_mined)`.
pub const HOLDINGS_REGRESSION_COEFFICIENT: f64 = 0.001;

/// Network-size regression coefficient: `e^(-0.0001 × members)`.
pub const NETWORK_REGRESSION_COEFFICIENT: f64 = 0.0001;

/// Network regression never drops below 10%.
pub const NETWORK_REGRESSION_FLOOR: f64 = 0.1;

/// Level damping coefficient applied to XP gains: `e^(-0.01 × level)`.
pub const LEVEL_DAMPING_COEFFICIENT: f64 = 0.01;

// ---------------------------------------------------------------------------
// Trust
// ---------------------------------------------------------------------------

/// Human probability below which mining is refused outright.
pub const MIN_HUMAN_PROBABILITY: f64 = 0.7;

/// Human probability at or above which no behaviour penalty applies.
pub const CONFIDENT_HUMAN_PROBABILITY: f64 = 0.9;

/// Floor of the behaviour penalty inside the grey zone.
pub const MIN_BEHAVIOR_PENALTY: f64 = 0.5;

/// Multiplier granted to accounts with strong authentication enabled.
pub const STRONG_AUTH_BONUS: f64 = 1.1;

/// Upper bound on the final trust multiplier.
pub const MAX_TRUST_MULTIPLIER: f64 = 2.5;

/// A trust assessment older than this must be refreshed before use.
pub const TRUST_TTL_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Referral levels that earn points (L1, L2, L3).
pub const REFERRAL_DEPTH: usize = 3;

/// Referral points earned per member at each level.
pub const LEVEL_WEIGHTS: [f64; REFERRAL_DEPTH] = [1.0, 0.3, 0.1];

/// Base referral points per network member.
pub const POINTS_PER_MEMBER: f64 = 100.0;

/// Weight of a dormant member relative to an active one.
pub const DORMANT_WEIGHT: f64 = 0.2;

/// A member counts as active if it produced activity within this window.
pub const ACTIVE_WINDOW_SECS: u64 = 30 * DAY_SECS;

/// Upper bound on the network multiplier.
pub const MAX_NETWORK_MULTIPLIER: f64 = 4.0;

/// Referrals from one device fingerprint allowed inside [`DEVICE_BURST_WINDOW_SECS`].
pub const DEVICE_BURST_LIMIT: usize = 5;

/// Sliding window for device-burst detection.
pub const DEVICE_BURST_WINDOW_SECS: u64 = HOUR_SECS;

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// XP required to go from level 1 to level 2.
pub const LEVEL_BASE_XP: f64 = 100.0;

/// Growth of the per-level XP requirement.
pub const LEVEL_GROWTH: f64 = 1.15;

/// Highest reachable level.
pub const MAX_LEVEL: u32 = 150;

/// Lowest accepted content-quality score.
pub const MIN_QUALITY: f64 = 0.5;

/// Highest accepted content-quality score.
pub const MAX_QUALITY: f64 = 2.0;

/// Upper bound on the level-band mining multiplier.
pub const MAX_LEVEL_MULTIPLIER: f64 = 5.0;

/// Upper bound on the daily-streak XP bonus.
pub const MAX_STREAK_BONUS: f64 = 3.0;

// ---------------------------------------------------------------------------
// Mining
// ---------------------------------------------------------------------------

/// Absolute ceiling on the final mining rate, tokens per hour.
pub const RATE_CEILING_PER_HOUR: f64 = 10.0;

/// Upper bound on the resolved mining-rate effect.
pub const MAX_EFFECT_MULTIPLIER: f64 = 20.0;

/// Longest interval settled in one call.
pub const MAX_SETTLEMENT_SECS: u64 = DAY_SECS;
