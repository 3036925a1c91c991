//! Rotation synchronization and angle binning.
//!
//! The engine turns a recording's digital edge events and current samples into
//! per-wire, per-angle statistics:
//!
//! 1. [`edges`] classifies direction and the first wire-0 edge from five edges.
//! 2. [`rotation`] picks every fourth edge, measures rotations and gates on speed.
//! 3. [`synchronizer`] places each wire's zero crossing and sample window.
//! 4. [`binner`] appends every windowed sample to its `(wire, bin)` collection.
//! 5. [`stats`] reduces the collections to summary statistics.
//!
//! [`engine::synchronize`] runs the whole chain for one recording.

pub mod binner;
pub mod edges;
pub mod engine;
pub mod grid;
pub mod rotation;
pub mod stats;
pub mod synchronizer;

pub use binner::AngleBinner;
pub use edges::{classify_edges, Direction, EdgeClassification};
pub use engine::{synchronize, EngineSettings, SyncResult};
pub use grid::AngleGrid;
pub use rotation::{extract_rotations, validate_speed, Rotation, RotationSet, SpeedCheck, SpeedPolicy};
pub use stats::{BinStats, Statistic, StatsTable};
pub use synchronizer::{AngleSynchronizer, WireWindow};
