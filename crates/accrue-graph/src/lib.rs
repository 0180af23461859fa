//! # accrue-graph — Referral network engine.
//!
//! Maintains the referrer → referee forest and derives each account's
//! network multiplier from it:
//! - **Cycle-free registration**: each referee has one referrer; an edge is
//!   rejected when the referee is already an ancestor of the referrer.
//! - **Fine-grained locking**: one `parking_lot::Mutex` per node inside a
//!   `DashMap`, acquired in ascending account order during registration.
//! - **Referral points**: three weighted levels, dormant members discounted.
//! - **Abuse flags**: device bursts, fingerprint clusters, referral-only
//!   chains and low-activity networks cap the multiplier at 1.0 until cleared.

pub mod abuse;
pub mod graph;

pub use abuse::{AbuseFlag, AbuseMonitor};
pub use accrue_core::fingerprint::DeviceFingerprint;
pub use graph::{NetworkSnapshot, ReferralGraph};
