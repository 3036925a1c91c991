//! Angle grid definition.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ProbeError};

/// Absorbs binary rounding in `(max - min) / step` so that e.g. `[-0.3, 0.3)` in
/// steps of `0.1` has six bins rather than five.
const BIN_COUNT_EPSILON: f64 = 1e-9;

/// Half-open angle bins covering `[theta_min, theta_max)` in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleGrid {
    /// Lower edge of the first bin.
    pub theta_min: f64,
    /// Exclusive upper bound.
    pub theta_max: f64,
    /// Bin width.
    pub theta_step: f64,
}

impl Default for AngleGrid {
    fn default() -> Self {
        Self {
            theta_min: -0.3,
            theta_max: 0.3,
            theta_step: 0.01,
        }
    }
}

impl AngleGrid {
    /// Creates and validates a grid.
    pub fn new(theta_min: f64, theta_max: f64, theta_step: f64) -> AppResult<Self> {
        let grid = Self {
            theta_min,
            theta_max,
            theta_step,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Checks that the grid is finite, ordered and holds at least one bin.
    pub fn validate(&self) -> AppResult<()> {
        if !(self.theta_min.is_finite() && self.theta_max.is_finite() && self.theta_step.is_finite())
        {
            return Err(ProbeError::Configuration(
                "Angle grid bounds must be finite".to_string(),
            ));
        }
        if self.theta_step <= 0.0 {
            return Err(ProbeError::Configuration(format!(
                "theta_step must be positive, got {}",
                self.theta_step
            )));
        }
        if self.theta_max <= self.theta_min {
            return Err(ProbeError::Configuration(format!(
                "theta_max ({}) must be greater than theta_min ({})",
                self.theta_max, self.theta_min
            )));
        }
        if self.bin_count() == 0 {
            return Err(ProbeError::Configuration(format!(
                "theta_step {} is wider than the angle window",
                self.theta_step
            )));
        }
        Ok(())
    }

    /// Rejects angle windows wider than the wire spacing.
    ///
    /// A window of exactly the spacing is accepted. Neighbouring windows can then
    /// share an edge sample, which [`AngleSynchronizer::windows`](super::AngleSynchronizer::windows) trims.
    pub fn validate_for_wires(&self, wires: usize) -> AppResult<()> {
        self.validate()?;
        if wires == 0 {
            return Ok(());
        }
        let spacing = 2.0 * PI / wires as f64;
        if self.span() > spacing {
            return Err(ProbeError::Configuration(format!(
                "Angle window of {:.4} rad exceeds the {:.4} rad spacing of {} wires",
                self.span(),
                spacing,
                wires
            )));
        }
        Ok(())
    }

    /// Width of the covered angle range.
    pub fn span(&self) -> f64 {
        self.theta_max - self.theta_min
    }

    /// Number of bins, `Ntheta`.
    pub fn bin_count(&self) -> usize {
        let n = (self.span() / self.theta_step + BIN_COUNT_EPSILON).floor();
        if n.is_finite() && n > 0.0 {
            n as usize
        } else {
            0
        }
    }

    /// Bin index for an angle, clamped to `[0, Ntheta-1]`.
    pub fn bin_index(&self, theta: f64) -> usize {
        let j = ((theta - self.theta_min) / self.theta_step).floor();
        let last = self.bin_count().saturating_sub(1);
        if j <= 0.0 || j.is_nan() {
            0
        } else {
            (j as usize).min(last)
        }
    }

    /// Centre angle of bin `j`.
    pub fn bin_center(&self, j: usize) -> f64 {
        self.theta_min + (j as f64 + 0.5) * self.theta_step
    }

    /// All bin centres in order.
    pub fn centers(&self) -> Vec<f64> {
        (0..self.bin_count()).map(|j| self.bin_center(j)).collect()
    }
}
