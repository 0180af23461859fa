//! XP progression ledger.
//!
//! Converts qualifying activities into XP with per-activity base values,
//! platform and quality multipliers, level damping and rolling daily caps.
//! The ledger itself is stateless apart from its parameters; per-account
//! sliding windows live in [`ProgressionState`], owned by the caller and
//! mutated under the caller's per-account lock.
//!
//! ```text
//! xp = floor(base × platform × (1 + (q − 1) × weight) × e^(−0.01 × level) × streak × xp_effect)
//! ```
//!
//! `streak` is the tier multiplier for the number of consecutive UTC days
//! the account has been active, today included.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::DAY_SECS;
use crate::error::ProgressionError;
use crate::params::ProgressionParams;
use crate::primitives::{clamp, exponential_regression, tier_lookup};
use crate::types::{Account, Timestamp};

// ---------------------------------------------------------------------------
// Activity taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    OriginalPost,
    PhotoPost,
    VideoPost,
    Story,
    Comment,
    Like,
    Share,
    Follow,
    DailyLogin,
    DailyQuest,
    Milestone,
    ViralContent,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 12] = [
        ActivityKind::OriginalPost,
        ActivityKind::PhotoPost,
        ActivityKind::VideoPost,
        ActivityKind::Story,
        ActivityKind::Comment,
        ActivityKind::Like,
        ActivityKind::Share,
        ActivityKind::Follow,
        ActivityKind::DailyLogin,
        ActivityKind::DailyQuest,
        ActivityKind::Milestone,
        ActivityKind::ViralContent,
    ];

    /// Whether the activity carries content a quality model can score.
    pub fn is_content(self) -> bool {
        matches!(
            self,
            ActivityKind::OriginalPost
                | ActivityKind::PhotoPost
                | ActivityKind::VideoPost
                | ActivityKind::Story
                | ActivityKind::Comment
                | ActivityKind::ViralContent
        )
    }
}

/// Where the activity happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Native,
    Instagram,
    #[serde(rename = "tiktok")]
    TikTok,
    #[serde(rename = "youtube")]
    YouTube,
    X,
    Facebook,
}

/// One qualifying activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub platform: Platform,
    pub at: Timestamp,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub from: u32,
    pub to: u32,
    pub at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XpResult {
    pub xp_gained: u64,
    pub total_xp: u64,
    pub level: u32,
    pub level_up: Option<LevelUp>,
    /// Activity was over its daily cap: recorded, but earned nothing.
    pub capped: bool,
    /// Activities of this kind inside the cap window, including this one.
    pub window_count: usize,
    /// Consecutive active days, today included.
    pub streak_days: u32,
    pub streak_bonus: f64,
}

// ---------------------------------------------------------------------------
// Per-account state
// ---------------------------------------------------------------------------

/// Rolling activity windows for one account.
#[derive(Debug, Clone, Default)]
pub struct ProgressionState {
    /// `(at, awarded)` per kind; only awarded entries count toward the cap.
    windows: HashMap<ActivityKind, VecDeque<(Timestamp, bool)>>,
    over_cap: u64,
    /// UTC day index of the last recorded activity.
    last_active_day: Option<u64>,
    streak_days: u32,
    best_streak: u32,
}

impl ProgressionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total activities recorded past their cap, for abuse analysis.
    pub fn over_cap_total(&self) -> u64 {
        self.over_cap
    }

    /// Consecutive active days ending at the last recorded activity.
    pub fn streak_days(&self) -> u32 {
        self.streak_days
    }

    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    /// Count the UTC day of `at` toward the streak. A skipped day restarts
    /// it at 1; activity timestamped before the last active day is ignored.
    fn mark_active(&mut self, at: Timestamp) {
        let day = at / DAY_SECS;
        match self.last_active_day {
            Some(last) if day <= last => return,
            Some(last) if day == last + 1 => self.streak_days += 1,
            _ => self.streak_days = 1,
        }
        self.last_active_day = Some(day);
        self.best_streak = self.best_streak.max(self.streak_days);
    }

    /// Activities of `kind` still inside the window at `now`.
    pub fn window_count(&self, kind: ActivityKind, now: Timestamp, window_secs: u64) -> usize {
        self.windows
            .get(&kind)
            .map_or(0, |q| q.iter().filter(|(t, _)| t.saturating_add(window_secs) > now).count())
    }

    fn prune(queue: &mut VecDeque<(Timestamp, bool)>, now: Timestamp, window_secs: u64) {
        while queue.front().is_some_and(|(t, _)| t.saturating_add(window_secs) <= now) {
            queue.pop_front();
        }
    }
}

// ---------------------------------------------------------------------------
// Level curve
// ---------------------------------------------------------------------------

/// Cumulative XP thresholds: `thresholds[n]` is the XP needed for level `n + 1`.
#[derive(Debug, Clone)]
pub struct LevelCurve {
    thresholds: Vec<f64>,
}

impl LevelCurve {
    pub fn new(base_xp: f64, growth: f64, max_level: u32) -> Self {
        let mut thresholds = Vec::with_capacity(max_level as usize);
        let mut total = 0.0;
        let mut step = base_xp;
        thresholds.push(0.0);
        for _ in 1..max_level {
            total += step;
            thresholds.push(total.round());
            step *= growth;
        }
        Self { thresholds }
    }

    pub fn max_level(&self) -> u32 {
        self.thresholds.len() as u32
    }

    pub fn level_for_xp(&self, xp: u64) -> u32 {
        tier_lookup(xp as f64, &self.thresholds).map_or(1, |i| i as u32 + 1)
    }

    /// Cumulative XP at which `level` is reached; `None` past the max level.
    pub fn xp_for_level(&self, level: u32) -> Option<u64> {
        let idx = level.checked_sub(1)? as usize;
        self.thresholds.get(idx).map(|t| *t as u64)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProgressionLedger {
    params: ProgressionParams,
    curve: LevelCurve,
    band_starts: Vec<f64>,
}

impl Default for ProgressionLedger {
    fn default() -> Self {
        Self::new(ProgressionParams::default())
    }
}

impl ProgressionLedger {
    pub fn new(params: ProgressionParams) -> Self {
        let curve = LevelCurve::new(params.level_base_xp, params.level_growth, params.max_level);
        let band_starts = params.level_bands.iter().map(|b| b.min_level as f64).collect();
        Self { params, curve, band_starts }
    }

    pub fn params(&self) -> &ProgressionParams {
        &self.params
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    pub fn level_for_xp(&self, xp: u64) -> u32 {
        self.curve.level_for_xp(xp)
    }

    /// XP bonus for a streak of `days` consecutive active days.
    ///
    /// | Days   | Bonus |
    /// |--------|-------|
    /// | 0–2    | 1.0   |
    /// | 3–6    | 1.2   |
    /// | 7–13   | 1.5   |
    /// | 14–29  | 2.0   |
    /// | 30–59  | 2.5   |
    /// | 60+    | 3.0   |
    pub fn streak_bonus(&self, days: u32) -> f64 {
        let tiers = &self.params.streak_tiers;
        let idx = tiers.partition_point(|t| t.min_days <= days);
        let value = idx.checked_sub(1).map_or(1.0, |i| tiers[i].multiplier);
        self.params.streak_bonus_bounds.apply(value)
    }

    /// Mining multiplier for `level`, interpolated linearly inside its band.
    ///
    /// | Band     | Levels  | Multiplier |
    /// |----------|---------|------------|
    /// | Bronze   | 1–10    | 1.0–1.2    |
    /// | Silver   | 11–25   | 1.3–1.8    |
    /// | Gold     | 26–50   | 1.9–2.5    |
    /// | Platinum | 51–75   | 2.6–3.2    |
    /// | Diamond  | 76–100  | 3.3–4.0    |
    /// | Mythic   | 101+    | 4.1–5.0    |
    pub fn level_multiplier(&self, level: u32) -> f64 {
        let bounds = self.params.level_multiplier_bounds;
        let Some(idx) = tier_lookup(level as f64, &self.band_starts) else {
            return bounds.min;
        };
        let band = &self.params.level_bands[idx];
        let band_end = self
            .params
            .level_bands
            .get(idx + 1)
            .map_or(self.curve.max_level(), |next| next.min_level.saturating_sub(1));
        let span = band_end.saturating_sub(band.min_level);
        let position = if span == 0 {
            0.0
        } else {
            (level.min(band_end) - band.min_level) as f64 / span as f64
        };
        let value = band.min_multiplier + (band.max_multiplier - band.min_multiplier) * position;
        bounds.apply(value)
    }

    /// Record `activity` for `account` and credit the resulting XP.
    ///
    /// `quality` is clamped into the configured bounds; `xp_multiplier` is the
    /// resolved XP effect. Over-cap activity earns nothing but is recorded.
    pub fn apply_activity(
        &self,
        account: &mut Account,
        state: &mut ProgressionState,
        activity: &Activity,
        quality: f64,
        xp_multiplier: f64,
    ) -> Result<XpResult, ProgressionError> {
        if !account.status.is_active() {
            return Err(ProgressionError::Inactive { account: account.id, status: account.status });
        }
        if quality.is_nan() {
            return Err(ProgressionError::InvalidQuality { account: account.id, quality });
        }
        if !xp_multiplier.is_finite() || xp_multiplier < 0.0 {
            return Err(ProgressionError::InvalidMultiplier { account: account.id, multiplier: xp_multiplier });
        }
        let rule = self.params.rule(activity.kind).ok_or(ProgressionError::NoRule(activity.kind))?;

        state.mark_active(activity.at);
        let streak_days = state.streak_days;
        let streak_bonus = self.streak_bonus(streak_days);

        let window = self.params.cap_window_secs;
        let queue = state.windows.entry(activity.kind).or_default();
        ProgressionState::prune(queue, activity.at, window);
        let awarded = queue.iter().filter(|(_, awarded)| *awarded).count();
        let capped = rule.daily_cap.is_some_and(|cap| awarded >= cap as usize);
        queue.push_back((activity.at, !capped));
        let window_count = queue.len();

        let level_before = self.level_for_xp(account.cumulative_xp);
        let xp_gained = if capped {
            state.over_cap += 1;
            debug!(
                account = %account.id,
                kind = ?activity.kind,
                count = window_count,
                "progression: daily cap reached, no xp awarded"
            );
            0
        } else {
            let quality = self.params.quality_bounds.apply(quality);
            let effective_quality = 1.0 + (quality - 1.0) * rule.quality_weight;
            let damping = exponential_regression(level_before as f64, self.params.damping_coefficient);
            let raw = rule.base_xp as f64
                * self.params.platform_multiplier(activity.platform)
                * effective_quality
                * damping
                * streak_bonus
                * xp_multiplier;
            clamp(raw, 0.0, u64::MAX as f64).floor() as u64
        };

        account.cumulative_xp = account.cumulative_xp.saturating_add(xp_gained);
        let level = self.level_for_xp(account.cumulative_xp);
        let level_up = (level > level_before).then(|| {
            info!(account = %account.id, from = level_before, to = level, "progression: level up");
            LevelUp { from: level_before, to: level, at: activity.at }
        });

        Ok(XpResult {
            xp_gained,
            total_xp: account.cumulative_xp,
            level,
            level_up,
            capped,
            window_count,
            streak_days,
            streak_bonus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DAY_SECS;
    use crate::types::{AccountId, AccountStatus};
    use proptest::prelude::*;

    fn activity(kind: ActivityKind, at: Timestamp) -> Activity {
        Activity { kind, platform: Platform::Native, at }
    }

    // --- level curve ---

    #[test]
    fn curve_starts_at_level_one() {
        let curve = LevelCurve::new(100.0, 1.15, 150);
        assert_eq!(curve.level_for_xp(0), 1);
        assert_eq!(curve.level_for_xp(99), 1);
        assert_eq!(curve.level_for_xp(100), 2);
        // 100 + 115 = 215
        assert_eq!(curve.level_for_xp(214), 2);
        assert_eq!(curve.level_for_xp(215), 3);
    }

    #[test]
    fn curve_caps_at_max_level() {
        let curve = LevelCurve::new(100.0, 1.15, 150);
        assert_eq!(curve.level_for_xp(u64::MAX), 150);
        assert_eq!(curve.xp_for_level(1), Some(0));
        assert_eq!(curve.xp_for_level(151), None);
        assert_eq!(curve.xp_for_level(0), None);
    }

    // --- level multiplier ---

    #[test]
    fn band_edges_interpolate() {
        let ledger = ProgressionLedger::default();
        assert!((ledger.level_multiplier(1) - 1.0).abs() < 1e-12);
        assert!((ledger.level_multiplier(10) - 1.2).abs() < 1e-12);
        assert!((ledger.level_multiplier(11) - 1.3).abs() < 1e-12);
        assert!((ledger.level_multiplier(25) - 1.8).abs() < 1e-12);
        assert!((ledger.level_multiplier(150) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn level_multiplier_below_first_band() {
        let ledger = ProgressionLedger::default();
        assert_eq!(ledger.level_multiplier(0), 1.0);
    }

    // --- apply_activity ---

    #[test]
    fn video_on_youtube_at_level_one() {
        let ledger = ProgressionLedger::default();
        let mut acct = Account::new(AccountId(1), 0);
        let mut state = ProgressionState::new();
        let act = Activity { kind: ActivityKind::VideoPost, platform: Platform::YouTube, at: 10 };
        let res = ledger.apply_activity(&mut acct, &mut state, &act, 1.5, 1.0).unwrap();
        // 150 × 1.4 × 1.5 × e^-0.01 = 311.86…
        assert_eq!(res.xp_gained, 311);
        assert_eq!(acct.cumulative_xp, 311);
        assert_eq!(res.level, 3);
        assert_eq!(res.level_up, Some(LevelUp { from: 1, to: 3, at: 10 }));
    }

    #[test]
    fn quality_is_clamped() {
        let ledger = ProgressionLedger::default();
        let mut a = Account::new(AccountId(1), 0);
        let mut b = Account::new(AccountId(2), 0);
        let mut sa = ProgressionState::new();
        let mut sb = ProgressionState::new();
        let act = activity(ActivityKind::OriginalPost, 0);
        let ra = ledger.apply_activity(&mut a, &mut sa, &act, 9.0, 1.0).unwrap();
        let rb = ledger.apply_activity(&mut b, &mut sb, &act, 2.0, 1.0).unwrap();
        assert_eq!(ra.xp_gained, rb.xp_gained);
    }

    #[test]
    fn nan_quality_rejected_without_recording() {
        let ledger = ProgressionLedger::default();
        let mut acct = Account::new(AccountId(1), 0);
        let mut state = ProgressionState::new();
        let act = activity(ActivityKind::Comment, 0);
        assert!(ledger.apply_activity(&mut acct, &mut state, &act, f64::NAN, 1.0).is_err());
        assert_eq!(state.window_count(ActivityKind::Comment, 0, DAY_SECS), 0);
    }

    #[test]
    fn daily_cap_records_but_awards_nothing() {
        let ledger = ProgressionLedger::default();
        let mut acct = Account::new(AccountId(1), 0);
        let mut state = ProgressionState::new();
        for i in 0..3 {
            let r = ledger
                .apply_activity(&mut acct, &mut state, &activity(ActivityKind::DailyQuest, i), 1.0, 1.0)
                .unwrap();
            assert!(!r.capped);
        }
        let xp = acct.cumulative_xp;
        let r = ledger
            .apply_activity(&mut acct, &mut state, &activity(ActivityKind::DailyQuest, 5), 1.0, 1.0)
            .unwrap();
        assert!(r.capped);
        assert_eq!(r.xp_gained, 0);
        assert_eq!(r.window_count, 4);
        assert_eq!(acct.cumulative_xp, xp);
        assert_eq!(state.over_cap_total(), 1);
    }

    #[test]
    fn cap_window_rolls() {
        let ledger = ProgressionLedger::default();
        let mut acct = Account::new(AccountId(1), 0);
        let mut state = ProgressionState::new();
        let login = |at| activity(ActivityKind::DailyLogin, at);
        assert!(!ledger.apply_activity(&mut acct, &mut state, &login(100), 1.0, 1.0).unwrap().capped);
        assert!(ledger.apply_activity(&mut acct, &mut state, &login(100 + DAY_SECS - 1), 1.0, 1.0).unwrap().capped);
        assert!(!ledger.apply_activity(&mut acct, &mut state, &login(100 + DAY_SECS), 1.0, 1.0).unwrap().capped);
    }

    #[test]
    fn xp_effect_multiplies() {
        let ledger = ProgressionLedger::default();
        let mut a = Account::new(AccountId(1), 0);
        let mut s = ProgressionState::new();
        let r = ledger
            .apply_activity(&mut a, &mut s, &activity(ActivityKind::Milestone, 0), 1.0, 2.0)
            .unwrap();
        // 500 × 2 × e^-0.01 = 990.04…
        assert_eq!(r.xp_gained, 990);
    }

    #[test]
    fn streak_bonus_tiers() {
        let ledger = ProgressionLedger::default();
        assert_eq!(ledger.streak_bonus(0), 1.0);
        assert_eq!(ledger.streak_bonus(2), 1.0);
        assert_eq!(ledger.streak_bonus(3), 1.2);
        assert_eq!(ledger.streak_bonus(13), 1.5);
        assert_eq!(ledger.streak_bonus(14), 2.0);
        assert_eq!(ledger.streak_bonus(59), 2.5);
        assert_eq!(ledger.streak_bonus(400), 3.0);
    }

    #[test]
    fn streak_scales_xp_and_resets_after_a_gap() {
        let ledger = ProgressionLedger::default();
        let mut acct = Account::new(AccountId(1), 0);
        let mut state = ProgressionState::new();
        let mut last = None;
        for day in 0..3 {
            // Two logins on the same day count once.
            ledger.apply_activity(&mut acct, &mut state, &activity(ActivityKind::DailyLogin, day * DAY_SECS), 1.0, 1.0).unwrap();
            let r = ledger
                .apply_activity(&mut acct, &mut state, &activity(ActivityKind::Milestone, day * DAY_SECS + 60), 1.0, 1.0)
                .unwrap();
            last = Some(r);
        }
        let third = last.unwrap();
        assert_eq!(third.streak_days, 3);
        assert_eq!(third.streak_bonus, 1.2);
        let level = ledger.level_for_xp(third.total_xp - third.xp_gained);
        let expected = (500.0 * exponential_regression(level as f64, 0.01) * 1.2).floor() as u64;
        assert_eq!(third.xp_gained, expected);

        // Day 4 skipped: the streak restarts on day 5.
        let r = ledger
            .apply_activity(&mut acct, &mut state, &activity(ActivityKind::Milestone, 4 * DAY_SECS), 1.0, 1.0)
            .unwrap();
        assert_eq!(r.streak_days, 1);
        assert_eq!(r.streak_bonus, 1.0);
        assert_eq!(state.best_streak(), 3);
    }

    #[test]
    fn suspended_account_rejected() {
        let ledger = ProgressionLedger::default();
        let mut acct = Account::new(AccountId(1), 0);
        acct.status = AccountStatus::Suspended;
        let mut state = ProgressionState::new();
        let err = ledger
            .apply_activity(&mut acct, &mut state, &activity(ActivityKind::Like, 0), 1.0, 1.0)
            .unwrap_err();
        assert!(matches!(err, ProgressionError::Inactive { .. }));
    }

    proptest! {
        #[test]
        fn xp_and_level_never_decrease(
            events in prop::collection::vec((0usize..12, 0.0f64..3.0, 0u64..200_000, 0.0f64..3.0), 1..80)
        ) {
            let ledger = ProgressionLedger::default();
            let mut acct = Account::new(AccountId(1), 0);
            let mut state = ProgressionState::new();
            let mut last_level = 1;
            let mut last_xp = 0;
            let mut sorted = events;
            sorted.sort_by_key(|e| e.2);
            for (kind, q, at, mult) in sorted {
                let act = activity(ActivityKind::ALL[kind], at);
                let r = ledger.apply_activity(&mut acct, &mut state, &act, q, mult).unwrap();
                prop_assert!(r.total_xp >= last_xp);
                prop_assert!(r.level >= last_level);
                last_xp = r.total_xp;
                last_level = r.level;
            }
        }
    }
}
