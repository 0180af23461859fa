//! The mining rate engine.
//!
//! [`MiningRateEngine`] owns the account registry and the referral graph and
//! drives the collaborators. Every rate is the product of eight factors:
//!
//! | Factor        | Source                                                   |
//! |---------------|----------------------------------------------------------|
//! | `base`        | phase table, by participant count                        |
//! | `pioneer`     | phase table                                              |
//! | `trust`       | [`TrustScorer`] over identity + behaviour collaborators  |
//! | `network`     | [`ReferralGraph`] snapshot × network effects, flag-capped |
//! | `xp_level`    | level band of the account's XP                           |
//! | `mining_effect` | active mining-rate effects                             |
//! | `holdings`    | `e^(−c × mined tokens)`                                  |
//! | `staking`     | staking tier of the account's staked tokens              |
//!
//! The product is clamped to `mining.rate_ceiling`.
//!
//! Rate computation snapshots account state under the account lock, computes
//! without it and re-validates suspension before returning anything non-zero.
//! No `parking_lot` guard is ever held across an `.await`.

use std::sync::Arc;

use accrue_core::constants::{DAY_SECS, HOUR_SECS, MICRO};
use accrue_core::effects::{EffectId, Metric};
use accrue_core::error::{AccrueError, EffectError, ProgressionError, ReferralError, TrustError};
use accrue_core::params::RewardParams;
use accrue_core::primitives::{clamp, combine, exponential_regression};
use accrue_core::progression::{Activity, ProgressionLedger, XpResult};
use accrue_core::traits::{BehaviorProvider, IdentityProvider, QualityProvider, SettlementSink};
use accrue_core::trust::{TrustAssessment, TrustScorer};
use accrue_core::types::{Account, AccountId, AccountStatus, ContentRef, SettlementRecord, Timestamp};
use accrue_graph::{DeviceFingerprint, NetworkSnapshot, ReferralGraph};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::breakdown::{CeilingHit, Factor, RateBreakdown, ZeroReason};
use crate::leaderboard::{self, LeaderboardEntry, LeaderboardKind};
use crate::phase::PhaseTable;
use crate::registry::{AccountRegistry, CachedRate};
use crate::upstream;

/// External services the engine consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub behavior: Arc<dyn BehaviorProvider>,
    pub quality: Arc<dyn QualityProvider>,
    pub settlement: Arc<dyn SettlementSink>,
}

/// Result of one [`MiningRateEngine::settle`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementOutcome {
    pub account: AccountId,
    pub from: Timestamp,
    pub to: Timestamp,
    /// Micro-tokens credited by this settlement.
    pub amount: u64,
    pub rate_per_hour: f64,
    /// Cumulative mined micro-tokens after the credit.
    pub total_mined: u64,
}

pub struct MiningRateEngine {
    params: RewardParams,
    trust: TrustScorer,
    ledger: ProgressionLedger,
    phases: PhaseTable,
    registry: AccountRegistry,
    graph: ReferralGraph,
    collaborators: Collaborators,
}

impl MiningRateEngine {
    /// Build an engine after validating `params`.
    pub fn new(params: RewardParams, collaborators: Collaborators) -> Result<Self, AccrueError> {
        params.validate()?;
        let phases = PhaseTable::new(&params.mining)?;
        Ok(Self {
            trust: TrustScorer::new(params.trust.clone()),
            ledger: ProgressionLedger::new(params.progression.clone()),
            graph: ReferralGraph::new(params.network.clone()),
            registry: AccountRegistry::new(),
            phases,
            params,
            collaborators,
        })
    }

    pub fn params(&self) -> &RewardParams {
        &self.params
    }

    pub fn graph(&self) -> &ReferralGraph {
        &self.graph
    }

    pub fn ledger(&self) -> &ProgressionLedger {
        &self.ledger
    }

    /// Registered accounts, in any status.
    pub fn participants(&self) -> u64 {
        self.registry.len() as u64
    }

    // -------------------------------------------------------------------------
    // Accounts and referrals
    // -------------------------------------------------------------------------

    pub fn register_account(
        &self,
        id: AccountId,
        now: Timestamp,
        fingerprint: Option<DeviceFingerprint>,
    ) -> Result<(), AccrueError> {
        self.registry.insert(Account::new(id, now))?;
        self.registry.with_record(id, |r| r.session = fingerprint)?;
        self.graph.register_account(id, fingerprint)?;
        debug!(account = %id, "engine: account registered");
        Ok(())
    }

    /// Note the device `id` is now using.
    ///
    /// A new device drops the stored trust assessment, so the next rate
    /// computation asks the behaviour model about that session.
    pub fn record_session(&self, id: AccountId, session: DeviceFingerprint) -> Result<(), AccrueError> {
        self.registry.with_record(id, |r| {
            if r.session != Some(session) {
                r.session = Some(session);
                r.trust = None;
                r.touch();
                debug!(account = %id, session = %session, "engine: session changed");
            }
        })
    }

    /// Record that `referrer` invited `referee`. Both must be registered.
    pub fn register_referral(
        &self,
        referrer: AccountId,
        referee: AccountId,
        at: Timestamp,
    ) -> Result<(), AccrueError> {
        self.registry.get(referrer)?;
        self.registry.get(referee)?;
        self.graph.register_referral(referrer, referee, at)?;
        self.invalidate_upline(referee);
        Ok(())
    }

    /// Drop cached rates of every account whose network contains `id`.
    fn invalidate_upline(&self, id: AccountId) {
        let Ok(path) = self.graph.referral_path(id) else { return };
        for ancestor in path {
            if let Err(error) = self.registry.with_record(ancestor, |r| r.touch()) {
                debug!(account = %ancestor, %error, "engine: upline account not registered, nothing to invalidate");
            }
        }
    }

    /// Move the account to `next`. Returns the previous status.
    pub fn set_account_status(&self, id: AccountId, next: AccountStatus) -> Result<AccountStatus, AccrueError> {
        let previous = self.registry.with_record(id, |r| {
            let previous = r.account.transition(next)?;
            r.touch();
            Ok::<_, AccrueError>(previous)
        })??;
        info!(account = %id, from = ?previous, to = ?next, "engine: account status changed");
        Ok(previous)
    }

    /// Record the micro-tokens `id` currently has staked.
    pub fn set_staked(&self, id: AccountId, micro_tokens: u64) -> Result<(), AccrueError> {
        self.registry.with_record(id, |r| {
            if r.account.staked != micro_tokens {
                r.account.staked = micro_tokens;
                r.touch();
                debug!(account = %id, staked = micro_tokens, "engine: stake updated");
            }
        })
    }

    /// Clear abuse flags after operator review.
    pub fn clear_flags(&self, id: AccountId) -> Result<usize, AccrueError> {
        let cleared = self.graph.clear_flags(id)?;
        self.registry.with_record(id, |r| r.touch())?;
        Ok(cleared)
    }

    // -------------------------------------------------------------------------
    // Trust
    // -------------------------------------------------------------------------

    /// Pull identity and behaviour, re-score trust and store the result.
    ///
    /// A failed assessment clears any stored one, so the next rate
    /// computation asks again instead of using old trust.
    pub async fn refresh_verification(&self, id: AccountId, now: Timestamp) -> Result<TrustAssessment, AccrueError> {
        let handle = self.registry.get(id)?;
        let policy = &self.params.upstream;
        let identity = &self.collaborators.identity;
        let behavior = &self.collaborators.behavior;

        let session = handle.record.lock().session;

        let record = upstream::call("identity", policy, || identity.verification(id))
            .await
            .map_err(|e| AccrueError::upstream(id, e))?;
        let probability = upstream::call("behavior", policy, || behavior.human_probability(id, session.as_ref()))
            .await
            .map_err(|e| AccrueError::upstream(id, e))?;

        let mut rec = handle.record.lock();
        rec.account.apply_verification(record);
        rec.touch();
        let assessed = self.trust.assess(&rec.account, probability, now);
        match assessed {
            Ok(assessment) => {
                if let Some(penalty) = assessment.behavior_penalty {
                    rec.account.behavior_penalty = penalty;
                }
                rec.trust = Some(assessment);
                debug!(account = %id, multiplier = assessment.multiplier, "engine: trust refreshed");
                Ok(assessment)
            }
            Err(e) => {
                rec.trust = None;
                warn!(account = %id, error = %e, "engine: trust assessment failed");
                Err(e.into())
            }
        }
    }

    /// Stored assessment, if still usable at `now`.
    pub fn trust_assessment(&self, id: AccountId, now: Timestamp) -> Result<TrustAssessment, AccrueError> {
        let stored = self.registry.with_record(id, |r| r.trust)?;
        let assessment = stored.ok_or(AccrueError::MissingInput { account: id, input: "trust assessment" })?;
        assessment.ensure_fresh(now, self.params.trust.ttl_secs)?;
        Ok(assessment)
    }

    async fn fresh_trust(&self, id: AccountId, now: Timestamp) -> Result<TrustAssessment, AccrueError> {
        match self.trust_assessment(id, now) {
            Ok(assessment) => Ok(assessment),
            Err(AccrueError::MissingInput { .. }) | Err(AccrueError::Trust(TrustError::StaleAssessment { .. })) => {
                self.refresh_verification(id, now).await
            }
            Err(e) => Err(e),
        }
    }

    // -------------------------------------------------------------------------
    // Progression and effects
    // -------------------------------------------------------------------------

    /// Record an activity and credit XP.
    ///
    /// Content activities are scored by the quality collaborator. A failed
    /// score falls back to 1.0 only for best-effort providers.
    pub async fn apply_activity(
        &self,
        id: AccountId,
        activity: Activity,
        content_id: Option<&str>,
    ) -> Result<XpResult, AccrueError> {
        let handle = self.registry.get(id)?;
        {
            let rec = handle.record.lock();
            if !rec.account.status.is_active() {
                return Err(AccrueError::AccountSuspended { account: id, status: rec.account.status });
            }
        }

        let quality = if activity.kind.is_content() {
            let content = ContentRef {
                account: id,
                kind: activity.kind,
                platform: activity.platform,
                content_id: content_id.unwrap_or_default().to_string(),
            };
            let provider = &self.collaborators.quality;
            match upstream::call("quality", &self.params.upstream, || provider.score(&content)).await {
                Ok(score) => score,
                Err(e) if provider.is_best_effort() => {
                    warn!(account = %id, error = %e, "engine: quality score unavailable, using neutral score");
                    1.0
                }
                Err(e) => return Err(AccrueError::upstream(id, e)),
            }
        } else {
            1.0
        };

        let result = {
            let mut guard = handle.record.lock();
            let rec = &mut *guard;
            let xp_effect = self.params.effects.xp_bounds.apply(rec.effects.current_multiplier(Metric::Xp, activity.at));
            let result = self
                .ledger
                .apply_activity(&mut rec.account, &mut rec.progression, &activity, quality, xp_effect)
                .map_err(|e| match e {
                    ProgressionError::Inactive { account, status } => AccrueError::AccountSuspended { account, status },
                    other => other.into(),
                })?;
            rec.touch();
            result
        };

        self.graph.record_activity(id, activity.at)?;
        self.invalidate_upline(id);
        Ok(result)
    }

    /// Activate the catalog effect `name` for `id`.
    pub fn activate_effect(&self, id: AccountId, name: &str, at: Timestamp) -> Result<EffectId, AccrueError> {
        let definition = self
            .params
            .effects
            .definition(name)
            .ok_or_else(|| EffectError::UnknownEffect(name.to_string()))?;
        let handle = self.registry.get(id)?;
        let mut rec = handle.record.lock();
        if !rec.account.status.is_active() {
            return Err(AccrueError::AccountSuspended { account: id, status: rec.account.status });
        }
        let effect = rec.effects.activate(definition, at)?;
        rec.touch();
        debug!(account = %id, effect = name, id = effect, "engine: effect activated");
        Ok(effect)
    }

    pub fn cancel_effect(&self, id: AccountId, effect: EffectId) -> Result<(), AccrueError> {
        self.registry.with_record(id, |r| {
            r.effects.cancel(effect)?;
            r.touch();
            Ok::<_, AccrueError>(())
        })?
    }

    /// Drop expired and cancelled effects on every account.
    pub fn prune_expired_effects(&self, at: Timestamp) -> usize {
        self.registry
            .handles()
            .iter()
            .map(|h| h.record.lock().effects.prune_expired(at))
            .sum()
    }

    /// Drop device-burst history that can no longer raise a flag.
    pub fn prune_abuse_windows(&self, at: Timestamp) -> usize {
        self.graph.prune_abuse_windows(at)
    }

    // -------------------------------------------------------------------------
    // Rate
    // -------------------------------------------------------------------------

    /// Current mining rate of `id` with the full factor breakdown.
    pub async fn compute_rate(&self, id: AccountId, now: Timestamp) -> Result<RateBreakdown, AccrueError> {
        let handle = self.registry.get(id)?;
        {
            let rec = handle.record.lock();
            if let Some(cached) = rec.cached(now) {
                let mut breakdown = cached.clone();
                breakdown.cached = true;
                return Ok(breakdown);
            }
            if !rec.account.status.is_active() {
                let reason = ZeroReason::AccountInactive { status: rec.account.status };
                return Ok(RateBreakdown::zero(id, now, reason));
            }
        }

        let trust = self.fresh_trust(id, now).await?;
        if trust.is_zero() {
            let mut breakdown = RateBreakdown::zero(id, now, ZeroReason::VerificationSuspended);
            breakdown.trust = Some(trust);
            return Ok(breakdown);
        }

        let (cumulative_xp, cumulative_mined, staked, mining_effect, network_effect, version) = {
            let rec = handle.record.lock();
            (
                rec.account.cumulative_xp,
                rec.account.cumulative_mined,
                rec.account.staked,
                rec.effects.current_multiplier(Metric::MiningRate, now),
                rec.effects.current_multiplier(Metric::Network, now),
                rec.version,
            )
        };

        let network = self.graph.compute_network_multiplier(id, now).map_err(|e| match e {
            ReferralError::UnknownAccount(_) => AccrueError::MissingInput { account: id, input: "referral network" },
            other => other.into(),
        })?;

        let participants = self.participants();
        let phase = self.phases.phase_for(participants);
        let effects = &self.params.effects;

        let network_raw = network.multiplier * effects.network_bounds.apply(network_effect);
        let mut network_applied = self.params.network.multiplier_bounds.apply(network_raw);
        if network.is_flagged() {
            network_applied = network_applied.min(1.0);
        }
        let level = self.ledger.level_for_xp(cumulative_xp);
        let mined_tokens = cumulative_mined as f64 / MICRO as f64;
        let staking = self.params.mining.staking_multiplier(staked as f64 / MICRO as f64);

        let factors = vec![
            Factor::new("base", phase.base_rate, phase.base_rate),
            Factor::new("pioneer", phase.pioneer_bonus, phase.pioneer_bonus),
            Factor::new("trust", trust.multiplier, trust.multiplier),
            Factor::new("network", network_raw, network_applied),
            Factor::new("xp_level", self.ledger.level_multiplier(level), self.ledger.level_multiplier(level)),
            Factor::new("mining_effect", mining_effect, effects.mining_bounds.apply(mining_effect)),
            Factor::new(
                "holdings",
                exponential_regression(mined_tokens, self.params.mining.holdings_regression_coefficient),
                exponential_regression(mined_tokens, self.params.mining.holdings_regression_coefficient),
            ),
            Factor::new("staking", staking, staking),
        ];
        let applied: Vec<f64> = factors.iter().map(|f| f.applied).collect();
        let computed = clamp(combine(&applied), 0.0, f64::MAX);
        let limit = self.params.mining.rate_ceiling;
        let ceiling = (computed > limit).then(|| {
            debug!(account = %id, computed, limit, "engine: rate ceiling exceeded");
            CeilingHit { computed, limit }
        });

        let breakdown = RateBreakdown {
            account: id,
            computed_at: now,
            rate_per_hour: computed.min(limit),
            phase: Some(phase.name.clone()),
            participants,
            factors,
            ceiling,
            zero_reason: None,
            trust: Some(trust),
            network: Some(network),
            cached: false,
        };

        let mut rec = handle.record.lock();
        if rec.account.is_mining_blocked() {
            warn!(account = %id, status = ?rec.account.status, "engine: suspended during rate computation");
            let mut zero = RateBreakdown::zero(id, now, ZeroReason::SuspendedDuringComputation);
            zero.trust = Some(trust);
            return Ok(zero);
        }
        if rec.version == version {
            let valid_until = now
                .saturating_add(self.params.mining.rate_cache_ttl_secs)
                .min(trust.expires_at(self.params.trust.ttl_secs));
            rec.cached_rate = Some(CachedRate { breakdown: breakdown.clone(), valid_until });
        }
        debug!(account = %id, rate = breakdown.rate_per_hour, level, "engine: rate computed");
        Ok(breakdown)
    }

    // -------------------------------------------------------------------------
    // Settlement
    // -------------------------------------------------------------------------

    /// Accrue mining since the last settlement and hand it to the sink.
    ///
    /// Elapsed time is capped at `mining.max_settlement_secs`. Everything
    /// settled in the rolling day ending at `now` counts against the phase
    /// daily cap, so splitting a day into many settlements never mints more
    /// than one long settlement. The mined total only moves after the sink
    /// accepted the record; a rejected submission leaves the account untouched.
    pub async fn settle(&self, id: AccountId, now: Timestamp) -> Result<SettlementOutcome, AccrueError> {
        let handle = self.registry.get(id)?;
        let _settling = handle.settle.lock().await;

        let (from, total, settled_today) = {
            let rec = handle.record.lock();
            (rec.account.last_settled_at, rec.account.cumulative_mined, rec.settled_within(now, DAY_SECS))
        };
        if now <= from {
            return Ok(SettlementOutcome { account: id, from, to: from, amount: 0, rate_per_hour: 0.0, total_mined: total });
        }

        let breakdown = self.compute_rate(id, now).await?;
        let elapsed = (now - from).min(self.params.mining.max_settlement_secs);
        let phase = self.phases.phase_for(self.participants());
        let tokens = breakdown.rate_per_hour * elapsed as f64 / HOUR_SECS as f64;
        let earned = clamp(tokens * MICRO as f64, 0.0, u64::MAX as f64).floor() as u64;
        let daily_cap = clamp(phase.daily_cap * MICRO as f64, 0.0, u64::MAX as f64).floor() as u64;
        let amount = earned.min(daily_cap.saturating_sub(settled_today));
        if amount < earned {
            debug!(account = %id, earned, amount, settled_today, daily_cap, "engine: daily cap reached");
        }

        if amount > 0 {
            {
                let rec = handle.record.lock();
                if rec.account.is_mining_blocked() {
                    return Err(AccrueError::AccountSuspended { account: id, status: rec.account.status });
                }
            }
            let record = SettlementRecord {
                account: id,
                amount,
                rate_per_hour: breakdown.rate_per_hour,
                from,
                to: now,
                phase: phase.name.clone(),
            };
            let sink = &self.collaborators.settlement;
            upstream::call("settlement", &self.params.upstream, || sink.submit(record.clone()))
                .await
                .map_err(|e| AccrueError::upstream(id, e))?;
        }

        let total_mined = {
            let mut rec = handle.record.lock();
            rec.account.credit_mined(amount);
            if amount > 0 {
                rec.record_settlement(now, amount, DAY_SECS);
            }
            rec.account.last_settled_at = now;
            rec.touch();
            rec.account.cumulative_mined
        };
        if amount > 0 {
            info!(account = %id, amount, from, to = now, "engine: mining settled");
        }
        Ok(SettlementOutcome { account: id, from, to: now, amount, rate_per_hour: breakdown.rate_per_hour, total_mined })
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn account(&self, id: AccountId) -> Result<Account, AccrueError> {
        self.registry.with_record(id, |r| r.account.clone())
    }

    pub fn network_snapshot(&self, id: AccountId, now: Timestamp) -> Result<NetworkSnapshot, AccrueError> {
        Ok(self.graph.compute_network_multiplier(id, now)?)
    }

    /// Over-cap activities recorded for `id`.
    pub fn over_cap_total(&self, id: AccountId) -> Result<u64, AccrueError> {
        self.registry.with_record(id, |r| r.progression.over_cap_total())
    }

    pub fn leaderboard(&self, kind: LeaderboardKind, limit: usize, now: Timestamp) -> Vec<LeaderboardEntry> {
        leaderboard::project(&self.registry, kind, limit, now)
    }
}
