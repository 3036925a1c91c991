//! Per-rotation reference extraction and speed validation.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::edges::{Direction, EdgeClassification, EDGES_PER_ROTATION};
use crate::error::{AppResult, ProbeError};

/// Default tolerated max/min period ratio excess (1%).
pub const DEFAULT_SPEED_TOLERANCE: f64 = 0.01;

/// One disc revolution: a wire-0 reference index and its duration in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    /// Raw sample index of the wire-0 reference edge.
    pub index: usize,
    /// Rotation duration in samples.
    pub duration: usize,
}

/// Wire-0 reference edges in traversal order plus their durations.
///
/// For clockwise recordings the references ascend in sample index. For
/// counter-clockwise recordings they descend, which is the ascending order of the
/// time-reversed recording; durations are always positive.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationSet {
    /// Raw sample index of each reference edge.
    pub edges_i: Vec<usize>,
    /// Duration of each rotation in samples.
    pub edges_di: Vec<usize>,
    /// Spin direction the references were ordered for.
    pub direction: Direction,
}

impl RotationSet {
    /// Number of rotation records.
    pub fn len(&self) -> usize {
        self.edges_i.len()
    }

    /// True when no rotation was found.
    pub fn is_empty(&self) -> bool {
        self.edges_i.is_empty()
    }

    /// Iterates rotation records in traversal order.
    pub fn rotations(&self) -> impl Iterator<Item = Rotation> + '_ {
        self.edges_i
            .iter()
            .zip(&self.edges_di)
            .map(|(&index, &duration)| Rotation { index, duration })
    }

    /// The first rotation in traversal order, used to extrapolate the pre-trigger region.
    pub fn first(&self) -> Option<Rotation> {
        self.rotations().next()
    }

    /// Ratio of the longest to the shortest rotation period.
    pub fn speed_ratio(&self) -> f64 {
        let max = self.edges_di.iter().copied().max().unwrap_or(0);
        let min = self.edges_di.iter().copied().min().unwrap_or(0);
        if min == 0 {
            return f64::INFINITY;
        }
        max as f64 / min as f64
    }
}

/// Downselects every fourth edge starting at the classified offset and measures rotations.
///
/// The last rotation has no following reference edge, so it reuses the previous
/// duration and `edges_di` always has the same length as `edges_i`.
pub fn extract_rotations(
    edges: &[usize],
    classification: &EdgeClassification,
) -> AppResult<RotationSet> {
    let mut refs: Vec<usize> = edges
        .iter()
        .skip(classification.offset)
        .step_by(EDGES_PER_ROTATION)
        .copied()
        .collect();

    // Two references need the offset plus one full rotation of edges plus one.
    if refs.len() < 2 {
        return Err(ProbeError::InsufficientEdges {
            found: edges.len(),
            required: classification.offset + EDGES_PER_ROTATION + 1,
        });
    }

    if classification.direction.is_ccw() {
        refs.reverse();
    }

    let mut durations: Vec<usize> = refs.windows(2).map(|w| w[0].abs_diff(w[1])).collect();
    let last = durations[durations.len() - 1];
    durations.push(last);

    debug!(
        rotations = refs.len(),
        direction = %classification.direction,
        "extracted rotation references"
    );

    Ok(RotationSet {
        edges_i: refs,
        edges_di: durations,
        direction: classification.direction,
    })
}

/// What to do when the rotation period is not acceptably constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPolicy {
    /// Reject the recording with `RotationSpeed`.
    #[default]
    Abort,
    /// Keep going and mark the result as degraded.
    Warn,
}

impl std::str::FromStr for SpeedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(SpeedPolicy::Abort),
            "warn" => Ok(SpeedPolicy::Warn),
            _ => Err(format!("Invalid speed policy '{}'. Must be abort or warn", s)),
        }
    }
}

/// Outcome of the rotation speed check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedCheck {
    /// Max/min duration ratio.
    pub ratio: f64,
    /// False when the ratio exceeded `1 + tolerance`.
    pub stable: bool,
}

/// Gates a recording on rotation-period stability.
///
/// Returns the check result when the speed is stable, or when it is unstable and the
/// policy is `Warn`. Under `Abort` an unstable speed is an error.
pub fn validate_speed(
    rotations: &RotationSet,
    tolerance: f64,
    policy: SpeedPolicy,
) -> AppResult<SpeedCheck> {
    let ratio = rotations.speed_ratio();
    let stable = ratio <= 1.0 + tolerance;
    if stable {
        debug!(ratio, "rotation speed stable");
        return Ok(SpeedCheck { ratio, stable });
    }

    match policy {
        SpeedPolicy::Abort => Err(ProbeError::RotationSpeed {
            ratio,
            percent: (ratio - 1.0) * 100.0,
            limit_percent: tolerance * 100.0,
        }),
        SpeedPolicy::Warn => {
            warn!(
                ratio,
                limit = 1.0 + tolerance,
                "disc speed varied beyond tolerance, continuing with degraded result"
            );
            Ok(SpeedCheck { ratio, stable })
        }
    }
}
