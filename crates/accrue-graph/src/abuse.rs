//! Referral abuse detection.
//!
//! Flags never reject a referral and never ban an account. They only cap the
//! flagged account's network multiplier at 1.0 until an operator clears them.
//!
//! | Flag                 | Trigger                                                    |
//! |----------------------|------------------------------------------------------------|
//! | `DeviceBurst`        | > N referees from one fingerprint inside the burst window  |
//! | `FingerprintCluster` | one fingerprint covers ≥ `cluster_share` of the network    |
//! | `ReferralOnlyChain`  | every recruiting member has no activity of its own         |
//! | `LowActivityRatio`   | large network with active / total below the threshold      |

use std::collections::{BTreeSet, HashMap, VecDeque};

use accrue_core::fingerprint::DeviceFingerprint;
use accrue_core::params::NetworkParams;
use accrue_core::types::{AccountId, Timestamp};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbuseFlag {
    DeviceBurst,
    FingerprintCluster,
    ReferralOnlyChain,
    LowActivityRatio,
}

/// Aggregate view of one account's L1–L3 network used for flag evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkStats {
    pub total: usize,
    pub active: usize,
    /// Members per fingerprint. Members without a fingerprint are not counted.
    pub fingerprints: HashMap<DeviceFingerprint, usize>,
    /// Members that referred someone.
    pub recruiters: usize,
    /// Recruiters that never produced activity themselves.
    pub idle_recruiters: usize,
}

impl NetworkStats {
    pub fn active_ratio(&self) -> f64 {
        if self.total == 0 { 1.0 } else { self.active as f64 / self.total as f64 }
    }

    /// Largest share of the network held by a single fingerprint.
    pub fn max_fingerprint_share(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let max = self.fingerprints.values().copied().max().unwrap_or(0);
        max as f64 / self.total as f64
    }
}

/// Tracks referral bursts per fingerprint and evaluates network-shape flags.
pub struct AbuseMonitor {
    burst_limit: usize,
    burst_window_secs: u64,
    cluster_min_members: usize,
    cluster_share: f64,
    low_activity_min_members: usize,
    low_activity_ratio: f64,
    /// Recent `(at, referrer)` per referee fingerprint.
    bursts: DashMap<DeviceFingerprint, VecDeque<(Timestamp, AccountId)>>,
}

impl AbuseMonitor {
    pub fn new(params: &NetworkParams) -> Self {
        Self {
            burst_limit: params.device_burst_limit,
            burst_window_secs: params.device_burst_window_secs,
            cluster_min_members: params.cluster_min_members,
            cluster_share: params.cluster_share,
            low_activity_min_members: params.low_activity_min_members,
            low_activity_ratio: params.low_activity_ratio,
            bursts: DashMap::new(),
        }
    }

    /// Record a referral whose referee signed up from `fingerprint`.
    ///
    /// Returns the referrers to flag with [`AbuseFlag::DeviceBurst`]: every
    /// referrer that received a referee from this fingerprint inside the
    /// window, once the window holds more than the limit. Empty otherwise.
    pub fn record_referral(
        &self,
        referrer: AccountId,
        fingerprint: DeviceFingerprint,
        at: Timestamp,
    ) -> Vec<AccountId> {
        let mut entry = self.bursts.entry(fingerprint).or_default();
        let window = self.burst_window_secs;
        while entry.front().is_some_and(|(t, _)| t.saturating_add(window) <= at) {
            entry.pop_front();
        }
        entry.push_back((at, referrer));

        if entry.len() <= self.burst_limit {
            return Vec::new();
        }
        debug!(
            %fingerprint,
            count = entry.len(),
            limit = self.burst_limit,
            "abuse: device burst detected"
        );
        let mut referrers: Vec<AccountId> = entry.iter().map(|(_, r)| *r).collect();
        referrers.sort_unstable();
        referrers.dedup();
        referrers
    }

    /// Referrals from `fingerprint` still inside the burst window at `now`.
    pub fn burst_count(&self, fingerprint: &DeviceFingerprint, now: Timestamp) -> usize {
        self.bursts.get(fingerprint).map_or(0, |q| {
            q.iter().filter(|(t, _)| t.saturating_add(self.burst_window_secs) > now).count()
        })
    }

    /// Drop burst entries that left the window by `now`, and fingerprints
    /// left with none. Returns how many entries were dropped.
    pub fn prune(&self, now: Timestamp) -> usize {
        let window = self.burst_window_secs;
        let mut dropped = 0;
        self.bursts.retain(|_, queue| {
            while queue.front().is_some_and(|(t, _)| t.saturating_add(window) <= now) {
                queue.pop_front();
                dropped += 1;
            }
            !queue.is_empty()
        });
        dropped
    }

    /// Fingerprints with at least one referral still tracked.
    pub fn tracked_fingerprints(&self) -> usize {
        self.bursts.len()
    }

    /// Flags implied by the shape of a network.
    pub fn evaluate(&self, stats: &NetworkStats) -> BTreeSet<AbuseFlag> {
        let mut flags = BTreeSet::new();
        if stats.total >= self.cluster_min_members {
            if stats.max_fingerprint_share() >= self.cluster_share {
                flags.insert(AbuseFlag::FingerprintCluster);
            }
            if stats.recruiters > 0 && stats.idle_recruiters == stats.recruiters {
                flags.insert(AbuseFlag::ReferralOnlyChain);
            }
        }
        if stats.total >= self.low_activity_min_members && stats.active_ratio() < self.low_activity_ratio {
            flags.insert(AbuseFlag::LowActivityRatio);
        }
        flags
    }
}
