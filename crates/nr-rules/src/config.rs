//! Rule thresholds.

use nr_core::{AxisTolerance, CoreError, Real, ensure_non_negative};
use serde::{Deserialize, Serialize};

/// Thresholds for the validation checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Spatial tolerance (epsilon) for endpoint coincidence, in length units.
    pub spatial_tolerance: Real,
    /// Slope jumps strictly above this are flagged.
    pub slope_threshold: Real,
    /// Per-axis tolerance against surveyed reference points.
    pub axis_tolerance: AxisTolerance,
    /// Pipes shorter than this are degenerate and skipped for slope checks.
    pub min_pipe_length: Real,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            spatial_tolerance: 0.01,
            slope_threshold: 0.05,
            axis_tolerance: AxisTolerance::default(),
            min_pipe_length: 1e-9,
        }
    }
}

impl RuleConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        ensure_non_negative(self.spatial_tolerance, "spatial_tolerance")?;
        ensure_non_negative(self.slope_threshold, "slope_threshold")?;
        ensure_non_negative(self.min_pipe_length, "min_pipe_length")?;
        self.axis_tolerance.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RuleConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.spatial_tolerance, 0.01);
        assert_eq!(cfg.slope_threshold, 0.05);
    }

    #[test]
    fn negative_threshold_rejected() {
        let cfg = RuleConfig {
            slope_threshold: -1.0,
            ..RuleConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
