//! Auditable rate breakdown returned by every rate computation.

use accrue_core::trust::TrustAssessment;
use accrue_core::types::{AccountId, AccountStatus, Timestamp};
use accrue_graph::NetworkSnapshot;
use serde::{Deserialize, Serialize};

/// One multiplicative input to the rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    pub name: &'static str,
    /// Value before clamping.
    pub raw: f64,
    /// Value that entered the product.
    pub applied: f64,
}

impl Factor {
    pub fn new(name: &'static str, raw: f64, applied: f64) -> Self {
        Self { name, raw, applied }
    }

    pub fn was_clamped(&self) -> bool {
        self.raw != self.applied
    }
}

/// Why a rate is zero without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum ZeroReason {
    AccountInactive { status: AccountStatus },
    VerificationSuspended,
    /// The account was suspended while the rate was being computed.
    SuspendedDuringComputation,
}

/// The rate hit the absolute ceiling. Informational; the clamped rate is used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CeilingHit {
    pub computed: f64,
    pub limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateBreakdown {
    pub account: AccountId,
    pub computed_at: Timestamp,
    /// Tokens per hour.
    pub rate_per_hour: f64,
    pub phase: Option<String>,
    pub participants: u64,
    pub factors: Vec<Factor>,
    pub ceiling: Option<CeilingHit>,
    pub zero_reason: Option<ZeroReason>,
    pub trust: Option<TrustAssessment>,
    pub network: Option<NetworkSnapshot>,
    /// Served from the per-account cache.
    pub cached: bool,
}

impl RateBreakdown {
    pub(crate) fn zero(account: AccountId, at: Timestamp, reason: ZeroReason) -> Self {
        Self {
            account,
            computed_at: at,
            rate_per_hour: 0.0,
            phase: None,
            participants: 0,
            factors: Vec::new(),
            ceiling: None,
            zero_reason: Some(reason),
            trust: None,
            network: None,
            cached: false,
        }
    }

    pub fn factor(&self, name: &str) -> Option<&Factor> {
        self.factors.iter().find(|f| f.name == name)
    }

    pub fn is_zero(&self) -> bool {
        self.rate_per_hour == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_breakdown() {
        let b = RateBreakdown::zero(AccountId(1), 5, ZeroReason::VerificationSuspended);
        assert!(b.is_zero());
        assert!(b.factors.is_empty());
        assert_eq!(b.zero_reason, Some(ZeroReason::VerificationSuspended));
    }

    #[test]
    fn factor_lookup_and_clamp_flag() {
        let mut b = RateBreakdown::zero(AccountId(1), 0, ZeroReason::VerificationSuspended);
        b.factors.push(Factor::new("network", 4.7, 4.0));
        b.factors.push(Factor::new("trust", 1.2, 1.2));
        assert!(b.factor("network").unwrap().was_clamped());
        assert!(!b.factor("trust").unwrap().was_clamped());
        assert!(b.factor("missing").is_none());
    }
}
