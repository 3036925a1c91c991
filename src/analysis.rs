//! Per-recording analysis: engine run plus row emission.

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::config::AnalysisConfig;
use crate::error::AppResult;
use crate::recording::{Position, Recording};
use crate::sink::OutputRow;
use crate::sync::{synchronize, StatsTable, SyncResult};

/// How a recording passed the speed gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PassStatus {
    /// Speed stayed within tolerance.
    Clean,
    /// Rotation speed exceeded the tolerance but the warn policy let it through.
    Degraded {
        /// Max/min rotation period ratio.
        speed_ratio: f64,
    },
}

/// Analysis of one recording, ready for row emission.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingAnalysis {
    /// Recording identifier, usually the source path.
    pub id: String,
    /// Wires that produced output rows.
    pub wires: usize,
    /// Radius of each output wire.
    pub radii: Vec<f64>,
    /// Probe position, copied into every row.
    pub position: Position,
    /// Speed-gate outcome.
    pub status: PassStatus,
    /// Engine output for the whole recording.
    pub sync: SyncResult,
}

impl RecordingAnalysis {
    /// Full table including ignored wires.
    pub fn table(&self) -> &StatsTable {
        &self.sync.table
    }

    /// Output rows for every non-ignored `(wire, bin)` pair, wire-major.
    pub fn rows(&self, config: &AnalysisConfig) -> Vec<OutputRow> {
        let table = self.table();
        let mut rows = Vec::with_capacity(table.wires() * table.bins());
        for (wire, bins) in table.stats.iter().enumerate() {
            if config.ignore.contains(&wire) {
                continue;
            }
            let radius = self.radii.get(wire).copied().unwrap_or(0.0);
            rows.extend(bins.iter().zip(&table.theta).map(|(stats, &theta)| OutputRow {
                wire_radius: radius,
                x: self.position.x,
                y: self.position.y,
                theta,
                value: stats.get(config.statistic),
            }));
        }
        rows
    }
}

/// Runs the engine over a loaded recording.
///
/// Errors are tagged with the recording identifier.
pub fn analyze_recording(recording: &Recording, config: &AnalysisConfig) -> AppResult<RecordingAnalysis> {
    let span = info_span!("recording", id = %recording.id);
    let _guard = span.enter();

    run(recording, config).map_err(|e| e.in_recording(recording.id.clone()))
}

fn run(recording: &Recording, config: &AnalysisConfig) -> AppResult<RecordingAnalysis> {
    let wires = config.resolve_wires(recording.metadata.wires.len())?;
    let settings = config.engine_settings(wires);
    let sync = synchronize(&recording.edges, &recording.current, &settings)?;

    let status = if sync.is_degraded() {
        warn!(ratio = sync.speed.ratio, "recording processed with unstable rotation speed");
        PassStatus::Degraded {
            speed_ratio: sync.speed.ratio,
        }
    } else {
        PassStatus::Clean
    };

    info!(
        direction = %sync.direction,
        rotations = sync.rotations,
        samples_binned = sync.samples_binned,
        "recording analysed"
    );

    Ok(RecordingAnalysis {
        id: recording.id.clone(),
        wires,
        radii: (0..wires).map(|w| recording.metadata.wire_radius(w)).collect(),
        position: recording.metadata.position,
        status,
        sync,
    })
}
