//! Account model shared by every Accrue component.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AccrueError;
use crate::progression::{ActivityKind, Platform};

/// Unix time in whole seconds.
pub type Timestamp = u64;

/// Opaque account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct-{}", self.0)
    }
}

/// Depth of identity verification an account has completed.
///
/// Ordered: `None < Basic < Standard < Premium < Enterprise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationTier {
    #[default]
    None,
    /// Phone and email confirmed.
    Basic,
    /// Government ID checked.
    Standard,
    /// ID plus liveness.
    Premium,
    /// Business verification.
    Enterprise,
}

/// Outcome of the most recent verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
    Rejected,
    Suspended,
}

/// Lifecycle status of an account. Accounts are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Banned,
}

impl AccountStatus {
    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// `Banned` is terminal; everything else may move freely.
    pub fn can_transition_to(self, next: AccountStatus) -> bool {
        !matches!(self, AccountStatus::Banned) || next == AccountStatus::Banned
    }

    pub fn is_active(self) -> bool {
        self == AccountStatus::Active
    }
}

/// Identity verification data as reported by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub tier: VerificationTier,
    pub status: VerificationStatus,
    /// Second factor or hardware key enrolled.
    pub strong_auth: bool,
}

/// A participant in the reward system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub verification_tier: VerificationTier,
    pub verification_status: VerificationStatus,
    pub strong_auth: bool,
    /// Never decreases.
    pub cumulative_xp: u64,
    /// Micro-tokens; never decreases.
    pub cumulative_mined: u64,
    /// Micro-tokens the holder has locked in staking.
    #[serde(default)]
    pub staked: u64,
    pub status: AccountStatus,
    /// Last behaviour penalty in `[0.5, 1.0]` produced by the trust scorer.
    pub behavior_penalty: f64,
    pub created_at: Timestamp,
    /// Time up to which mining has been settled.
    pub last_settled_at: Timestamp,
}

impl Account {
    /// Fresh, unverified, active account.
    pub fn new(id: AccountId, created_at: Timestamp) -> Self {
        Self {
            id,
            verification_tier: VerificationTier::None,
            verification_status: VerificationStatus::Unverified,
            strong_auth: false,
            cumulative_xp: 0,
            cumulative_mined: 0,
            staked: 0,
            status: AccountStatus::Active,
            behavior_penalty: 1.0,
            created_at,
            last_settled_at: created_at,
        }
    }

    /// Overwrite verification fields with a collaborator record.
    pub fn apply_verification(&mut self, record: VerificationRecord) {
        self.verification_tier = record.tier;
        self.verification_status = record.status;
        self.strong_auth = record.strong_auth;
    }

    /// Move to `next`, rejecting transitions out of `Banned`.
    pub fn transition(&mut self, next: AccountStatus) -> Result<AccountStatus, AccrueError> {
        if !self.status.can_transition_to(next) {
            return Err(AccrueError::InvalidStatusTransition {
                account: self.id,
                from: self.status,
                to: next,
            });
        }
        let previous = self.status;
        self.status = next;
        Ok(previous)
    }

    /// Add mined micro-tokens, saturating.
    pub fn credit_mined(&mut self, amount: u64) {
        self.cumulative_mined = self.cumulative_mined.saturating_add(amount);
    }

    /// Whether mining must be forced to zero regardless of other inputs.
    pub fn is_mining_blocked(&self) -> bool {
        !self.status.is_active() || self.verification_status == VerificationStatus::Suspended
    }
}

/// Reference to a piece of content handed to the quality collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub account: AccountId,
    pub kind: ActivityKind,
    pub platform: Platform,
    pub content_id: String,
}

/// Accrued mining handed to the settlement collaborator. Amounts in micro-tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub account: AccountId,
    pub amount: u64,
    pub rate_per_hour: f64,
    pub from: Timestamp,
    pub to: Timestamp,
    pub phase: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_display() {
        assert_eq!(AccountId(42).to_string(), "acct-42");
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(VerificationTier::None < VerificationTier::Basic);
        assert!(VerificationTier::Premium < VerificationTier::Enterprise);
    }

    #[test]
    fn new_account_defaults() {
        let acct = Account::new(AccountId(1), 100);
        assert_eq!(acct.status, AccountStatus::Active);
        assert_eq!(acct.verification_tier, VerificationTier::None);
        assert_eq!(acct.last_settled_at, 100);
        assert_eq!(acct.behavior_penalty, 1.0);
    }

    #[test]
    fn suspend_and_reactivate() {
        let mut acct = Account::new(AccountId(1), 0);
        assert_eq!(acct.transition(AccountStatus::Suspended).unwrap(), AccountStatus::Active);
        assert!(acct.is_mining_blocked());
        acct.transition(AccountStatus::Active).unwrap();
        assert!(!acct.is_mining_blocked());
    }

    #[test]
    fn banned_is_terminal() {
        let mut acct = Account::new(AccountId(7), 0);
        acct.transition(AccountStatus::Banned).unwrap();
        let err = acct.transition(AccountStatus::Active).unwrap_err();
        assert!(matches!(err, AccrueError::InvalidStatusTransition { .. }));
        assert_eq!(acct.status, AccountStatus::Banned);
        // Re-banning is a no-op, not an error.
        assert!(acct.transition(AccountStatus::Banned).is_ok());
    }

    #[test]
    fn suspended_verification_blocks_mining() {
        let mut acct = Account::new(AccountId(1), 0);
        acct.apply_verification(VerificationRecord {
            tier: VerificationTier::Premium,
            status: VerificationStatus::Suspended,
            strong_auth: true,
        });
        assert!(acct.is_mining_blocked());
    }

    #[test]
    fn credit_mined_saturates() {
        let mut acct = Account::new(AccountId(1), 0);
        acct.cumulative_mined = u64::MAX - 1;
        acct.credit_mined(10);
        assert_eq!(acct.cumulative_mined, u64::MAX);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&AccountStatus::Suspended).unwrap();
        assert_eq!(json, "\"suspended\"");
    }
}
