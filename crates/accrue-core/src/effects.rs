//! Time-bounded effects (boost items, probation) and their resolution.
//!
//! Pure computation: no storage, no IO. Each account owns one
//! [`EffectStack`]; expiry is lazy, so an instance simply stops contributing
//! once `started_at + duration` has passed. [`EffectStack::prune_expired`]
//! reclaims memory and is never required for correctness.
//!
//! Resolution for a metric at time `t`:
//!
//! ```text
//! value = (1 + Σ add) × Π multiply
//! if any Set is active: value = magnitude of the latest-started Set
//! ```
//!
//! Ties between Sets with the same start time go to the later activation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EffectError;
use crate::types::{AccountId, Timestamp};

/// Instance identifier, unique within one account's stack.
pub type EffectId = u64;

/// Quantity an effect modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    MiningRate,
    Xp,
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOp {
    Add,
    Multiply,
    Set,
}

/// What happens when an effect is activated while one of the same type is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackPolicy {
    #[default]
    Stackable,
    RejectWhileActive,
    ReplaceExisting,
}

/// Catalog entry describing an activatable effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDefinition {
    pub name: String,
    pub metric: Metric,
    pub op: EffectOp,
    pub magnitude: f64,
    /// `None` for permanent effects.
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub policy: StackPolicy,
}

impl EffectDefinition {
    pub fn new(
        name: &str,
        metric: Metric,
        op: EffectOp,
        magnitude: f64,
        duration_secs: Option<u64>,
        policy: StackPolicy,
    ) -> Self {
        Self { name: name.to_string(), metric, op, magnitude, duration_secs, policy }
    }

    /// `Multiply > 0`, `Set ≥ 0`, finite magnitudes, non-zero durations.
    pub fn validate(&self) -> Result<(), EffectError> {
        let m = self.magnitude;
        let ok = m.is_finite()
            && match self.op {
                EffectOp::Add => true,
                EffectOp::Multiply => m > 0.0,
                EffectOp::Set => m >= 0.0,
            };
        if !ok {
            return Err(EffectError::InvalidMagnitude { effect: self.name.clone(), magnitude: m });
        }
        if self.duration_secs == Some(0) {
            return Err(EffectError::ZeroDuration(self.name.clone()));
        }
        Ok(())
    }
}

/// One activation of an [`EffectDefinition`]. Immutable apart from `cancelled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectInstance {
    pub id: EffectId,
    pub account: AccountId,
    pub name: String,
    pub metric: Metric,
    pub op: EffectOp,
    pub magnitude: f64,
    pub started_at: Timestamp,
    pub duration_secs: Option<u64>,
    /// Monotonic activation counter; tie-break for simultaneous Sets.
    pub sequence: u64,
    pub cancelled: bool,
}

impl EffectInstance {
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.duration_secs.map(|d| self.started_at.saturating_add(d))
    }

    /// Live on `[started_at, expires_at)` unless cancelled.
    pub fn is_active(&self, at: Timestamp) -> bool {
        !self.cancelled && self.started_at <= at && self.expires_at().is_none_or(|end| at < end)
    }

    fn is_expired(&self, at: Timestamp) -> bool {
        self.cancelled || self.expires_at().is_some_and(|end| at >= end)
    }
}

/// Active and pending effects for one account.
#[derive(Debug, Clone)]
pub struct EffectStack {
    account: AccountId,
    instances: Vec<EffectInstance>,
    next_sequence: u64,
}

impl EffectStack {
    pub fn new(account: AccountId) -> Self {
        Self { account, instances: Vec::new(), next_sequence: 0 }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Activate `def` starting at `at`, honouring its stacking policy.
    pub fn activate(&mut self, def: &EffectDefinition, at: Timestamp) -> Result<EffectId, EffectError> {
        def.validate()?;

        match def.policy {
            StackPolicy::Stackable => {}
            StackPolicy::RejectWhileActive => {
                if let Some(live) = self.instances.iter().find(|i| i.name == def.name && i.is_active(at)) {
                    return Err(EffectError::EffectAlreadyActive {
                        account: self.account,
                        effect: def.name.clone(),
                        expires_at: live.expires_at(),
                    });
                }
            }
            StackPolicy::ReplaceExisting => {
                for inst in self.instances.iter_mut().filter(|i| i.name == def.name && i.is_active(at)) {
                    inst.cancelled = true;
                    debug!(account = %self.account, effect = %def.name, id = inst.id, "effects: replaced");
                }
            }
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.instances.push(EffectInstance {
            id: sequence,
            account: self.account,
            name: def.name.clone(),
            metric: def.metric,
            op: def.op,
            magnitude: def.magnitude,
            started_at: at,
            duration_secs: def.duration_secs,
            sequence,
            cancelled: false,
        });
        debug!(account = %self.account, effect = %def.name, id = sequence, at, "effects: activated");
        Ok(sequence)
    }

    /// Cancel an instance. Cancelling twice is a no-op.
    pub fn cancel(&mut self, id: EffectId) -> Result<(), EffectError> {
        let inst = self
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(EffectError::NotFound(id))?;
        inst.cancelled = true;
        Ok(())
    }

    /// Instances contributing at `at`.
    pub fn active(&self, at: Timestamp) -> impl Iterator<Item = &EffectInstance> {
        self.instances.iter().filter(move |i| i.is_active(at))
    }

    /// Resolved multiplier for `metric` at `at`. `1.0` when nothing applies.
    pub fn current_multiplier(&self, metric: Metric, at: Timestamp) -> f64 {
        let mut add = 0.0;
        let mut product = 1.0;
        let mut latest_set: Option<&EffectInstance> = None;

        for inst in self.active(at).filter(|i| i.metric == metric) {
            match inst.op {
                EffectOp::Add => add += inst.magnitude,
                EffectOp::Multiply => product *= inst.magnitude,
                EffectOp::Set => {
                    let newer = latest_set
                        .is_none_or(|s| (inst.started_at, inst.sequence) > (s.started_at, s.sequence));
                    if newer {
                        latest_set = Some(inst);
                    }
                }
            }
        }

        match latest_set {
            Some(set) => set.magnitude,
            None => ((1.0 + add) * product).max(0.0),
        }
    }

    /// Drop expired and cancelled instances. Returns how many were removed.
    pub fn prune_expired(&mut self, at: Timestamp) -> usize {
        let before = self.instances.len();
        self.instances.retain(|i| !i.is_expired(at));
        before - self.instances.len()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
