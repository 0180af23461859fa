//! Referral graph and network multiplier.
//!
//! # Locking
//!
//! Nodes live in a `DashMap<AccountId, Arc<Mutex<ReferralNode>>>`. Reads lock
//! one node at a time and never hold two locks. Registration is the only
//! operation that holds several: it reads the referrer's ancestor chain
//! without locks, then locks the chain plus the referee in ascending
//! [`AccountId`] order, re-validates the chain and commits. A chain that
//! changed in between is retried, up to `max_register_attempts` times.
//!
//! # Multiplier
//!
//! ```text
//! rp         = Σ_level weight[level] × Σ_member points × (1 | dormant_weight)
//! tier       = tier_lookup(rp, rp_tiers)
//! multiplier = clamp(1 + (tier − 1) × active_ratio × e^(−c × size), 1, 4)
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use accrue_core::constants::REFERRAL_DEPTH;
use accrue_core::error::ReferralError;
use accrue_core::fingerprint::DeviceFingerprint;
use accrue_core::params::NetworkParams;
use accrue_core::primitives::{exponential_regression_floored, tier_lookup};
use accrue_core::types::{AccountId, Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::abuse::{AbuseFlag, AbuseMonitor, NetworkStats};

#[derive(Debug, Clone)]
struct ReferralNode {
    referrer: Option<AccountId>,
    referees: Vec<AccountId>,
    last_active_at: Option<Timestamp>,
    fingerprint: Option<DeviceFingerprint>,
    flags: BTreeSet<AbuseFlag>,
}

impl ReferralNode {
    fn new(fingerprint: Option<DeviceFingerprint>) -> Self {
        Self {
            referrer: None,
            referees: Vec::new(),
            last_active_at: None,
            fingerprint,
            flags: BTreeSet::new(),
        }
    }
}

/// Derived view of one account's referral network. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub account: AccountId,
    /// Members at L1, L2, L3.
    pub level_counts: [usize; REFERRAL_DEPTH],
    pub active_counts: [usize; REFERRAL_DEPTH],
    pub total_size: usize,
    pub active_ratio: f64,
    pub rp_total: f64,
    pub tier: String,
    pub tier_multiplier: f64,
    pub regression: f64,
    /// `1 + (tier − 1) × active_ratio × regression`, before clamping.
    pub raw_multiplier: f64,
    /// Clamped multiplier, before effects and flag capping.
    pub multiplier: f64,
    pub flags: BTreeSet<AbuseFlag>,
    pub computed_at: Timestamp,
}

impl NetworkSnapshot {
    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// Referral forest with per-node locks.
pub struct ReferralGraph {
    params: NetworkParams,
    tier_bounds: Vec<f64>,
    nodes: DashMap<AccountId, Arc<Mutex<ReferralNode>>>,
    monitor: AbuseMonitor,
}

impl ReferralGraph {
    pub fn new(params: NetworkParams) -> Self {
        let tier_bounds = params.tier_bounds();
        let monitor = AbuseMonitor::new(&params);
        Self { params, tier_bounds, nodes: DashMap::new(), monitor }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: AccountId) -> Result<Arc<Mutex<ReferralNode>>, ReferralError> {
        self.nodes
            .get(&id)
            .map(|n| Arc::clone(n.value()))
            .ok_or(ReferralError::UnknownAccount(id))
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Add an account with no referrer.
    pub fn register_account(
        &self,
        id: AccountId,
        fingerprint: Option<DeviceFingerprint>,
    ) -> Result<(), ReferralError> {
        match self.nodes.entry(id) {
            Entry::Occupied(_) => Err(ReferralError::DuplicateAccount(id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(ReferralNode::new(fingerprint))));
                Ok(())
            }
        }
    }

    /// `start` followed by its ancestors, read without holding more than one lock.
    fn ancestor_chain(&self, start: AccountId) -> Result<Vec<AccountId>, ReferralError> {
        let mut chain = vec![start];
        let mut current = start;
        // A forest has no path longer than the node count.
        let limit = self.nodes.len() + 1;
        while chain.len() <= limit {
            let parent = self.node(current)?.lock().referrer;
            let Some(parent) = parent else { break };
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// Create the edge `referrer → referee`.
    ///
    /// Rejected, with no mutation, when it is a self edge, when the referee
    /// already has a referrer, or when the referee is an ancestor of the
    /// referrer.
    pub fn register_referral(
        &self,
        referrer: AccountId,
        referee: AccountId,
        at: Timestamp,
    ) -> Result<(), ReferralError> {
        if referrer == referee {
            return Err(ReferralError::SelfReferral(referrer));
        }
        self.node(referee)?;

        let attempts = self.params.max_register_attempts;
        for attempt in 1..=attempts {
            let chain = self.ancestor_chain(referrer)?;
            if chain.contains(&referee) {
                debug!(%referrer, %referee, "graph: referral would close a cycle");
                return Err(ReferralError::CircularReferral { referrer, referee });
            }

            let mut handles = Vec::with_capacity(chain.len() + 1);
            for id in chain.iter().copied().chain(std::iter::once(referee)) {
                handles.push((id, self.node(id)?));
            }
            handles.sort_by_key(|(id, _)| *id);
            let slot = |id: AccountId| handles.binary_search_by_key(&id, |(k, _)| *k).ok();
            let mut guards: Vec<_> = handles.iter().map(|(_, h)| h.lock()).collect();

            // Under the locks: the chain must still be exactly what we read.
            let unchanged = chain.iter().enumerate().all(|(i, id)| {
                slot(*id).is_some_and(|pos| guards[pos].referrer == chain.get(i + 1).copied())
            });
            if !unchanged {
                debug!(%referrer, %referee, attempt, "graph: ancestor chain changed, retrying");
                continue;
            }

            let (Some(referee_pos), Some(referrer_pos)) = (slot(referee), slot(referrer)) else {
                continue;
            };
            if let Some(existing) = guards[referee_pos].referrer {
                return Err(ReferralError::AlreadyReferred { referee, existing });
            }

            guards[referee_pos].referrer = Some(referrer);
            guards[referrer_pos].referees.push(referee);
            let fingerprint = guards[referee_pos].fingerprint;
            drop(guards);

            debug!(%referrer, %referee, at, "graph: referral registered");
            if let Some(fp) = fingerprint {
                for flagged in self.monitor.record_referral(referrer, fp, at) {
                    self.raise_flag(flagged, AbuseFlag::DeviceBurst);
                }
            }
            return Ok(());
        }

        warn!(%referrer, %referee, attempts, "graph: referral registration contended");
        Err(ReferralError::Contended { referrer, referee, attempts })
    }

    // -------------------------------------------------------------------------
    // Activity and flags
    // -------------------------------------------------------------------------

    /// Mark `id` as active at `at`. Older timestamps never move activity back.
    pub fn record_activity(&self, id: AccountId, at: Timestamp) -> Result<(), ReferralError> {
        let node = self.node(id)?;
        let mut node = node.lock();
        node.last_active_at = Some(node.last_active_at.map_or(at, |prev| prev.max(at)));
        Ok(())
    }

    fn raise_flag(&self, id: AccountId, flag: AbuseFlag) {
        if let Ok(node) = self.node(id) {
            if node.lock().flags.insert(flag) {
                warn!(account = %id, ?flag, "graph: abuse flag raised");
            }
        }
    }

    pub fn flags(&self, id: AccountId) -> Result<BTreeSet<AbuseFlag>, ReferralError> {
        Ok(self.node(id)?.lock().flags.clone())
    }

    /// Forget device-burst history older than the burst window.
    pub fn prune_abuse_windows(&self, now: Timestamp) -> usize {
        let dropped = self.monitor.prune(now);
        if dropped > 0 {
            debug!(dropped, "graph: stale burst entries pruned");
        }
        dropped
    }

    /// Clear all abuse flags after review. Returns how many were cleared.
    pub fn clear_flags(&self, id: AccountId) -> Result<usize, ReferralError> {
        let node = self.node(id)?;
        let cleared = std::mem::take(&mut node.lock().flags).len();
        if cleared > 0 {
            info!(account = %id, cleared, "graph: abuse flags cleared");
        }
        Ok(cleared)
    }

    pub fn referrer_of(&self, id: AccountId) -> Result<Option<AccountId>, ReferralError> {
        Ok(self.node(id)?.lock().referrer)
    }

    /// Upline of `id`: L1 referrer first, at most [`REFERRAL_DEPTH`] entries.
    pub fn referral_path(&self, id: AccountId) -> Result<Vec<AccountId>, ReferralError> {
        let mut chain = self.ancestor_chain(id)?;
        chain.remove(0);
        chain.truncate(REFERRAL_DEPTH);
        Ok(chain)
    }

    /// Direct referees of `id`.
    pub fn referees_of(&self, id: AccountId) -> Result<Vec<AccountId>, ReferralError> {
        Ok(self.node(id)?.lock().referees.clone())
    }

    // -------------------------------------------------------------------------
    // Network multiplier
    // -------------------------------------------------------------------------

    fn is_active(&self, last_active_at: Option<Timestamp>, now: Timestamp) -> bool {
        last_active_at.is_some_and(|t| t.saturating_add(self.params.active_window_secs) > now)
    }

    /// Walk L1..L3 below `id` and derive its multiplier and abuse flags.
    ///
    /// Newly detected shape flags are persisted on the node.
    pub fn compute_network_multiplier(
        &self,
        id: AccountId,
        now: Timestamp,
    ) -> Result<NetworkSnapshot, ReferralError> {
        let root = self.node(id)?;
        let mut frontier = root.lock().referees.clone();

        let mut level_counts = [0usize; REFERRAL_DEPTH];
        let mut active_counts = [0usize; REFERRAL_DEPTH];
        let mut rp_total = 0.0;
        let mut stats = NetworkStats::default();

        for level in 0..REFERRAL_DEPTH {
            let mut next = Vec::new();
            let mut level_points = 0.0;
            for member in frontier {
                // Members registered concurrently may not be visible yet.
                let Ok(handle) = self.node(member) else { continue };
                let node = handle.lock();
                let active = self.is_active(node.last_active_at, now);

                level_counts[level] += 1;
                stats.total += 1;
                if active {
                    active_counts[level] += 1;
                    stats.active += 1;
                }
                if let Some(fp) = node.fingerprint {
                    *stats.fingerprints.entry(fp).or_default() += 1;
                }
                if !node.referees.is_empty() {
                    stats.recruiters += 1;
                    if node.last_active_at.is_none() {
                        stats.idle_recruiters += 1;
                    }
                }
                level_points += self.params.points_per_member
                    * if active { 1.0 } else { self.params.dormant_weight };
                next.extend(node.referees.iter().copied());
            }
            rp_total += self.params.level_weights[level] * level_points;
            frontier = next;
        }

        let tier_idx = tier_lookup(rp_total, &self.tier_bounds).unwrap_or(0);
        let tier = &self.params.rp_tiers[tier_idx];
        let active_ratio = stats.active_ratio();
        let regression = exponential_regression_floored(
            stats.total as f64,
            self.params.regression_coefficient,
            self.params.regression_floor,
        );
        let raw_multiplier = 1.0 + (tier.multiplier - 1.0) * active_ratio * regression;
        let multiplier = self.params.multiplier_bounds.apply(raw_multiplier);

        let detected = self.monitor.evaluate(&stats);
        let flags = {
            let mut node = root.lock();
            for flag in &detected {
                if node.flags.insert(*flag) {
                    warn!(account = %id, ?flag, size = stats.total, active_ratio, "graph: abuse flag raised");
                }
            }
            node.flags.clone()
        };

        debug!(account = %id, rp_total, tier = %tier.name, multiplier, size = stats.total, "graph: network multiplier");

        Ok(NetworkSnapshot {
            account: id,
            level_counts,
            active_counts,
            total_size: stats.total,
            active_ratio,
            rp_total,
            tier: tier.name.clone(),
            tier_multiplier: tier.multiplier,
            regression,
            raw_multiplier,
            multiplier,
            flags,
            computed_at: now,
        })
    }
}
