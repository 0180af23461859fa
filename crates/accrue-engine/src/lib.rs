//! # accrue-engine — Mining rate orchestration.
//!
//! Combines the pure computations from `accrue-core` and the referral
//! network from `accrue-graph` into one auditable rate per account:
//!
//! ```text
//! rate = base × pioneer × trust × network × xp_level × effect × e^(−c × mined)
//! ```
//!
//! clamped to the absolute ceiling. State is held per account behind its own
//! lock inside a `DashMap`; collaborator calls run under bounded timeouts and
//! fail closed.

pub mod breakdown;
pub mod engine;
pub mod leaderboard;
pub mod phase;
pub mod registry;
mod upstream;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use breakdown::{CeilingHit, Factor, RateBreakdown, ZeroReason};
pub use engine::{Collaborators, MiningRateEngine, SettlementOutcome};
pub use leaderboard::{LeaderboardEntry, LeaderboardKind};
pub use phase::PhaseTable;
