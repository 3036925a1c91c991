//! # Disc Probe Analysis Library
//!
//! This crate turns recordings from a spinning-disc multi-wire probe into angle-binned
//! current statistics. A recording holds one analog current trace and one digital
//! channel that pulses as four reflective stripes on the disc pass a photo sensor.
//! From those pulses the library recovers the rotation direction and the start of every
//! rotation, works out when each wire crosses the measurement axis, and bins the current
//! around each crossing by angle.
//!
//! ## Crate Structure
//!
//! - **`sync`**: The synchronization engine. Edge classification, rotation extraction and
//!   speed gating, per-wire zero-crossing windows, angle binning and bin statistics.
//! - **`recording`**: The decoded recording type and the JSON loader behind the
//!   `RecordingLoader` trait.
//! - **`analysis`**: Runs the engine over one recording and turns the result into output rows.
//! - **`batch`**: Processes many recordings concurrently into a single `ResultSink`.
//! - **`sink`**: Output rows and the CSV and in-memory sinks.
//! - **`discovery`**: Expands input directories into recording files.
//! - **`synthetic`**: Builds synthetic recordings with known geometry for tests and demos.
//! - **`config`**: Layered configuration (defaults, TOML file, environment).
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: The `ProbeError` enum shared by the whole crate.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod recording;
pub mod sink;
pub mod sync;
pub mod synthetic;

pub use error::{AppResult, ProbeError};
