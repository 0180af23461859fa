//! Network-growth phases.
//!
//! The base rate and pioneer bonus fall as the participant count grows:
//!
//! | Phase     | Participants   | Base / hour | Pioneer | Daily cap |
//! |-----------|----------------|-------------|---------|-----------|
//! | pioneer   | ≤ 100 000      | 0.1         | 2.0×    | 4.8       |
//! | growth    | ≤ 1 000 000    | 0.05        | 1.5×    | 1.8       |
//! | maturity  | ≤ 10 000 000   | 0.025       | 1.2×    | 0.72      |
//! | stability | beyond         | 0.01        | 1.0×    | 0.24      |

use accrue_core::error::ConfigError;
use accrue_core::params::{MiningParams, PhaseParams};

/// Validated, ordered phase table.
#[derive(Debug, Clone)]
pub struct PhaseTable {
    phases: Vec<PhaseParams>,
}

impl PhaseTable {
    pub fn new(params: &MiningParams) -> Result<Self, ConfigError> {
        if params.phases.is_empty() {
            return Err(ConfigError::Invalid { field: "mining.phases", reason: "table must not be empty".into() });
        }
        Ok(Self { phases: params.phases.clone() })
    }

    /// Phase in force for `participants` registered accounts.
    pub fn phase_for(&self, participants: u64) -> &PhaseParams {
        self.phases
            .iter()
            .find(|p| p.max_participants.is_none_or(|max| participants <= max))
            .unwrap_or(&self.phases[self.phases.len() - 1])
    }

    pub fn phases(&self) -> &[PhaseParams] {
        &self.phases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive() {
        let table = PhaseTable::new(&MiningParams::default()).unwrap();
        assert_eq!(table.phase_for(0).name, "pioneer");
        assert_eq!(table.phase_for(100_000).name, "pioneer");
        assert_eq!(table.phase_for(100_001).name, "growth");
        assert_eq!(table.phase_for(10_000_000).name, "maturity");
        assert_eq!(table.phase_for(u64::MAX).name, "stability");
    }

    #[test]
    fn empty_table_rejected() {
        let params = MiningParams { phases: vec![], ..Default::default() };
        assert!(PhaseTable::new(&params).is_err());
    }
}
