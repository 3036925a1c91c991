//! Custom error types for the application.
//!
//! This module defines the primary error type, `ProbeError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the errors that can occur while turning a probe recording into angle-binned statistics.
//!
//! ## Error Hierarchy
//!
//! `ProbeError` consolidates several error sources:
//!
//! - **Recording validation**: `InsufficientEdges`, `RotationSpeed`, `NoWiresDefined`,
//!   `TooManyWires`. These are raised per recording and abort only that recording.
//! - **`Config` / `Configuration`**: layered configuration could not be extracted, or it
//!   was extracted but holds values that make no sense (an empty angle grid, say).
//! - **`Io`**, **`Json`**, **`Csv`**: wrapped errors from reading recordings and writing rows.
//! - **`Recording`**: any of the above, tagged with the identifier of the recording that
//!   failed so a batch run can report which inputs were rejected.
//!
//! By using `#[from]`, `ProbeError` can be created from the underlying error types,
//! simplifying error handling throughout the crate with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, ProbeError>;

/// Primary error type for recording analysis.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The digital channel holds too few transitions to classify the rotation direction
    /// or to measure a single rotation.
    #[error("Insufficient edge events: found {found}, need at least {required}")]
    InsufficientEdges {
        /// Number of edges available.
        found: usize,
        /// Minimum number of edges required.
        required: usize,
    },

    /// Rotation periods vary by more than the configured tolerance.
    #[error("Disc speed varied by {percent:.3}% (max/min period ratio {ratio:.5}), limit is {limit_percent:.3}%")]
    RotationSpeed {
        /// Ratio of the longest to the shortest rotation period.
        ratio: f64,
        /// Same value expressed as a percentage excess over 1.
        percent: f64,
        /// Configured tolerance as a percentage.
        limit_percent: f64,
    },

    /// Metadata declares no wires and no override was configured.
    #[error("No wires defined for this recording")]
    NoWiresDefined,

    /// Metadata declares more wires than the configured sanity bound.
    #[error("Too many wires: {found} declared, maximum is {max}")]
    TooManyWires {
        /// Declared wire count.
        found: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Recording data is malformed (non-increasing edges, missing channels).
    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    /// Layered configuration could not be extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but holds invalid values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Reading a recording or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A recording file is not valid JSON for the expected layout.
    #[error("Recording decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// The CSV writer failed.
    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    /// An error tagged with the recording it occurred in.
    #[error("Recording '{id}': {source}")]
    Recording {
        /// Identifier of the failed recording (usually its path).
        id: String,
        /// The underlying failure.
        #[source]
        source: Box<ProbeError>,
    },

    /// A worker task panicked or was cancelled before producing a result.
    #[error("Worker for recording '{0}' did not complete")]
    WorkerPanicked(String),

    /// The result writer stopped before all batches were delivered.
    #[error("Result writer closed unexpectedly")]
    WriterClosed,
}

impl From<figment::Error> for ProbeError {
    fn from(value: figment::Error) -> Self {
        ProbeError::Config(Box::new(value))
    }
}

impl ProbeError {
    /// Attaches a recording identifier to this error.
    ///
    /// Errors that already carry an identifier are returned unchanged.
    pub fn in_recording(self, id: impl Into<String>) -> Self {
        match self {
            ProbeError::Recording { .. } => self,
            other => ProbeError::Recording {
                id: id.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the error with any recording tag removed.
    pub fn root(&self) -> &ProbeError {
        match self {
            ProbeError::Recording { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_error_with_recording_id() {
        let err = ProbeError::NoWiresDefined.in_recording("scan/003.json");
        assert_eq!(
            err.to_string(),
            "Recording 'scan/003.json': No wires defined for this recording"
        );
        assert!(matches!(err.root(), ProbeError::NoWiresDefined));
    }

    #[test]
    fn does_not_double_tag() {
        let err = ProbeError::NoWiresDefined
            .in_recording("a.json")
            .in_recording("b.json");
        match err {
            ProbeError::Recording { id, .. } => assert_eq!(id, "a.json"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn rotation_speed_message_reports_percentages() {
        let err = ProbeError::RotationSpeed {
            ratio: 1.02,
            percent: 2.0,
            limit_percent: 1.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("2.000%"));
        assert!(msg.contains("1.000%"));
    }
}
