//! Full synchronization pipeline for one recording.

use serde::Serialize;
use tracing::{debug, instrument};

use super::binner::AngleBinner;
use super::edges::{classify_edges, Direction};
use super::grid::AngleGrid;
use super::rotation::{extract_rotations, validate_speed, SpeedCheck, SpeedPolicy, DEFAULT_SPEED_TOLERANCE};
use super::stats::StatsTable;
use super::synchronizer::AngleSynchronizer;
use crate::error::{AppResult, ProbeError};

/// Parameters the engine needs beyond the recording itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Output angle grid.
    pub grid: AngleGrid,
    /// Wires on the disc, `Nwire`.
    pub wires: usize,
    /// Allowed excess of the max/min period ratio over 1.
    pub speed_tolerance: f64,
    /// Action on an unstable speed.
    pub speed_policy: SpeedPolicy,
}

impl EngineSettings {
    /// Default tolerance with the abort policy.
    pub fn new(grid: AngleGrid, wires: usize) -> Self {
        Self {
            grid,
            wires,
            speed_tolerance: DEFAULT_SPEED_TOLERANCE,
            speed_policy: SpeedPolicy::Abort,
        }
    }

    /// Sets the speed policy.
    pub fn with_speed_policy(mut self, policy: SpeedPolicy) -> Self {
        self.speed_policy = policy;
        self
    }

    /// Sets the speed tolerance.
    pub fn with_speed_tolerance(mut self, tolerance: f64) -> Self {
        self.speed_tolerance = tolerance;
        self
    }
}

/// Everything the engine learned about one recording.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    /// Detected spin direction.
    pub direction: Direction,
    /// Number of rotation records, including the trailing one.
    pub rotations: usize,
    /// Speed-gate result.
    pub speed: SpeedCheck,
    /// Samples that fell inside some wire window.
    pub samples_binned: usize,
    /// Full statistics table, ignored wires included.
    pub table: StatsTable,
}

impl SyncResult {
    /// True when the speed check failed but the policy allowed continuing.
    pub fn is_degraded(&self) -> bool {
        !self.speed.stable
    }
}

/// Runs classification, rotation extraction, speed gating, synchronization,
/// binning and aggregation over one recording.
///
/// `edges` must be strictly increasing sample indices of digital transitions.
#[instrument(skip_all, fields(edges = edges.len(), samples = current.len()))]
pub fn synchronize(
    edges: &[usize],
    current: &[f64],
    settings: &EngineSettings,
) -> AppResult<SyncResult> {
    if settings.wires == 0 {
        return Err(ProbeError::NoWiresDefined);
    }
    settings.grid.validate_for_wires(settings.wires)?;
    if let Some(pos) = edges.windows(2).position(|w| w[1] <= w[0]) {
        return Err(ProbeError::InvalidRecording(format!(
            "edge events are not strictly increasing at position {}",
            pos + 1
        )));
    }

    let classification = classify_edges(edges)?;
    let rotations = extract_rotations(edges, &classification)?;
    let speed = validate_speed(&rotations, settings.speed_tolerance, settings.speed_policy)?;

    let sync = AngleSynchronizer::new(
        rotations.direction,
        settings.wires,
        settings.grid,
        current.len(),
    );
    let mut binner = AngleBinner::new(settings.grid, settings.wires);

    for window in sync.windows(&rotations) {
        binner.accumulate(&window, current);
    }

    let samples_binned = binner.samples();
    debug!(
        direction = %rotations.direction,
        rotations = rotations.len(),
        samples_binned,
        "binning complete"
    );

    Ok(SyncResult {
        direction: rotations.direction,
        rotations: rotations.len(),
        speed,
        samples_binned,
        table: StatsTable::aggregate(&settings.grid, binner.into_bins()),
    })
}
