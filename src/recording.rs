//! Decoded probe recordings and the loaders that produce them.
//!
//! A recording pairs one analog channel (wire current) with the digital stream of
//! the disc photo-reflector. Loaders hand the engine a [`Recording`] whose edge
//! events are already extracted; the on-disk format only matters to the loader.
//!
//! ## JSON layout
//!
//! ```json
//! {
//!   "metadata": {
//!     "sample_rate_hz": 100000.0,
//!     "distream": 1,
//!     "wires": [{ "radius": 0.005 }, { "radius": 0.010 }],
//!     "position": { "x": 12.5, "y": 0.0, "z": 3.0 }
//!   },
//!   "current": [0.0, 0.1, ...],
//!   "digital": [1, 1, 0, ...]
//! }
//! ```
//!
//! `digital` may be replaced by a precomputed `edges` array of sample indices.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppResult, ProbeError};

/// Physical position of the probe during the recording.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Axial position, zero when not recorded.
    #[serde(default)]
    pub z: f64,
}

/// Per-wire metadata.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireMeta {
    /// Radial distance of the wire from the disc axis.
    #[serde(default)]
    pub radius: f64,
}

/// Acquisition metadata stored alongside the samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    /// Sampling frequency in Hz.
    pub sample_rate_hz: f64,
    /// Digital stream channel mask; the highest set bit selects the encoder channel.
    #[serde(default = "default_distream")]
    pub distream: u16,
    /// One entry per wire, in wire order.
    #[serde(default)]
    pub wires: Vec<WireMeta>,
    /// Probe position.
    #[serde(default)]
    pub position: Position,
    /// Free-form note from the acquisition.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

fn default_distream() -> u16 {
    1
}

impl RecordingMetadata {
    /// Digital input channel carrying the encoder signal.
    pub fn digital_channel(&self) -> AppResult<u8> {
        if self.distream == 0 {
            return Err(ProbeError::InvalidRecording(
                "digital stream mask is zero, no encoder channel".to_string(),
            ));
        }
        Ok((15 - self.distream.leading_zeros()) as u8)
    }

    /// Radius of wire `w`, zero when metadata does not list it.
    pub fn wire_radius(&self, w: usize) -> f64 {
        self.wires.get(w).map(|m| m.radius).unwrap_or(0.0)
    }
}

/// A fully decoded recording, read-only for the duration of an analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Source identifier, usually the file path.
    pub id: String,
    /// Acquisition metadata.
    pub metadata: RecordingMetadata,
    /// Strictly increasing sample indices of encoder transitions.
    pub edges: Vec<usize>,
    /// Probe current, one value per sample.
    pub current: Vec<f64>,
}

impl Recording {
    /// Total sample count, `Ndata`.
    pub fn samples(&self) -> usize {
        self.current.len()
    }

    /// Time of sample `i` in seconds.
    pub fn time(&self, i: usize) -> f64 {
        i as f64 / self.metadata.sample_rate_hz
    }

    /// Writes the recording as JSON with the encoder stored as a digital stream.
    pub fn save_json(&self, path: &Path) -> AppResult<()> {
        let channel = self.metadata.digital_channel()?;
        let file = RecordingFile {
            metadata: self.metadata.clone(),
            current: self.current.clone(),
            edges: None,
            digital: Some(encode_digital(&self.edges, self.samples(), channel)),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &file)?;
        Ok(())
    }
}

/// Serialized form of a recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingFile {
    /// Acquisition metadata.
    pub metadata: RecordingMetadata,
    /// Probe current samples.
    pub current: Vec<f64>,
    /// Precomputed encoder edge indices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<usize>>,
    /// Raw digital stream, used when `edges` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital: Option<Vec<u16>>,
}

impl RecordingFile {
    /// Decodes into a [`Recording`], extracting edges from the digital stream if needed.
    pub fn into_recording(self, id: impl Into<String>) -> AppResult<Recording> {
        let edges = match (self.edges, self.digital) {
            (Some(edges), _) => {
                if let Some(&late) = edges.iter().find(|&&e| e >= self.current.len()) {
                    return Err(ProbeError::InvalidRecording(format!(
                        "edge at sample {} lies beyond the {} recorded samples",
                        late,
                        self.current.len()
                    )));
                }
                edges
            }
            (None, Some(digital)) => {
                if digital.len() != self.current.len() {
                    return Err(ProbeError::InvalidRecording(format!(
                        "digital stream has {} samples but current has {}",
                        digital.len(),
                        self.current.len()
                    )));
                }
                edge_events(&digital, self.metadata.digital_channel()?)
            }
            (None, None) => {
                return Err(ProbeError::InvalidRecording(
                    "recording has neither edges nor a digital stream".to_string(),
                ))
            }
        };
        if !(self.metadata.sample_rate_hz.is_finite() && self.metadata.sample_rate_hz > 0.0) {
            return Err(ProbeError::InvalidRecording(format!(
                "sample rate must be positive, got {}",
                self.metadata.sample_rate_hz
            )));
        }
        Ok(Recording {
            id: id.into(),
            metadata: self.metadata,
            edges,
            current: self.current,
        })
    }
}

/// Sample indices where bit `channel` of the digital stream changes state.
pub fn edge_events(digital: &[u16], channel: u8) -> Vec<usize> {
    let mask = 1u16 << channel;
    digital
        .windows(2)
        .enumerate()
        .filter(|(_, w)| (w[0] ^ w[1]) & mask != 0)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Builds a digital stream that toggles bit `channel` at each edge, starting high.
pub fn encode_digital(edges: &[usize], samples: usize, channel: u8) -> Vec<u16> {
    let mask = 1u16 << channel;
    let mut digital = vec![0u16; samples];
    let mut level = mask;
    let mut next = edges.iter().peekable();
    for (i, word) in digital.iter_mut().enumerate() {
        while next.peek().is_some_and(|&&e| e <= i) {
            level ^= mask;
            next.next();
        }
        *word = level;
    }
    digital
}

/// Source of decoded recordings.
pub trait RecordingLoader: Send + Sync {
    /// Reads and decodes the recording at `path`.
    fn load(&self, path: &Path) -> AppResult<Recording>;
}

/// Loads recordings stored in the JSON layout described at module level.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecordingLoader;

impl RecordingLoader for JsonRecordingLoader {
    fn load(&self, path: &Path) -> AppResult<Recording> {
        let reader = BufReader::new(File::open(path)?);
        let file: RecordingFile = serde_json::from_reader(reader)?;
        let recording = file.into_recording(path.display().to_string())?;
        debug!(
            recording = %recording.id,
            samples = recording.samples(),
            edges = recording.edges.len(),
            "loaded recording"
        );
        Ok(recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(distream: u16) -> RecordingMetadata {
        RecordingMetadata {
            sample_rate_hz: 1000.0,
            distream,
            wires: vec![WireMeta { radius: 0.01 }],
            position: Position::default(),
            description: String::new(),
        }
    }

    #[test]
    fn digital_channel_is_highest_mask_bit() {
        assert_eq!(metadata(1).digital_channel().unwrap(), 0);
        assert_eq!(metadata(0b1000).digital_channel().unwrap(), 3);
        assert_eq!(metadata(0b1010).digital_channel().unwrap(), 3);
        assert!(metadata(0).digital_channel().is_err());
    }

    #[test]
    fn finds_transitions_on_selected_bit_only() {
        // bit 2 toggles at 2 and 5; bit 0 noise is ignored
        let digital = [4, 5, 1, 0, 1, 4, 4];
        assert_eq!(edge_events(&digital, 2), vec![2, 5]);
    }

    #[test]
    fn encoded_stream_decodes_to_same_edges() {
        let edges = vec![3, 7, 8, 20];
        let digital = encode_digital(&edges, 25, 1);
        assert_eq!(digital[0], 2);
        assert_eq!(digital[3], 0);
        assert_eq!(edge_events(&digital, 1), edges);
    }

    #[test]
    fn rejects_mismatched_stream_length() {
        let file = RecordingFile {
            metadata: metadata(1),
            current: vec![0.0; 10],
            edges: None,
            digital: Some(vec![0; 9]),
        };
        assert!(matches!(
            file.into_recording("x"),
            Err(ProbeError::InvalidRecording(_))
        ));
    }

    #[test]
    fn rejects_edges_past_last_sample() {
        let file = |edges: Vec<usize>| RecordingFile {
            metadata: metadata(1),
            current: vec![0.0; 10],
            edges: Some(edges),
            digital: None,
        };
        let err = file(vec![2, 5, 10]).into_recording("x").unwrap_err();
        assert!(matches!(err, ProbeError::InvalidRecording(_)));
        assert!(err.to_string().contains("edge at sample 10"));

        let rec = file(vec![2, 5, 9]).into_recording("x").unwrap();
        assert_eq!(rec.edges, vec![2, 5, 9]);
    }

    #[test]
    fn wire_radius_defaults_to_zero() {
        let m = metadata(1);
        assert_eq!(m.wire_radius(0), 0.01);
        assert_eq!(m.wire_radius(3), 0.0);
    }

    #[test]
    fn time_uses_sample_rate() {
        let rec = RecordingFile {
            metadata: metadata(1),
            current: vec![0.0; 10],
            edges: Some(vec![]),
            digital: None,
        }
        .into_recording("x")
        .unwrap();
        assert_eq!(rec.time(500), 0.5);
    }
}
