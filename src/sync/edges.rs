//! Rotation direction and reference-edge detection.
//!
//! The photo-reflector signal is nominally high over most of a rotation and drops
//! while one of two dark stripes passes under the sensor. The wide stripe has one
//! edge aligned with wire 0; the narrow stripe sits a short distance from that edge,
//! so whichever side of the wide stripe faces the narrow one is the zero reference.
//!
//! The first five edges span one full pattern: the longest of the four intervals is
//! the open disc between patterns, and comparing the two stripe intervals that
//! follow and precede it tells which stripe is seen first, hence the direction.

use crate::error::{AppResult, ProbeError};

/// Number of edges consumed to classify a recording.
pub const CLASSIFY_EDGES: usize = 5;

/// Edges produced by one rotation (two stripes, two transitions each).
pub const EDGES_PER_ROTATION: usize = 4;

/// Disc rotation direction relative to increasing wire angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Clockwise: angle increases with sample index.
    Cw,
    /// Counter-clockwise: angle decreases with sample index.
    Ccw,
}

impl Direction {
    /// Sign applied to index offsets and to `dtheta`.
    pub fn sign(self) -> i64 {
        match self {
            Direction::Cw => 1,
            Direction::Ccw => -1,
        }
    }

    /// True for counter-clockwise.
    pub fn is_ccw(self) -> bool {
        matches!(self, Direction::Ccw)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Cw => write!(f, "cw"),
            Direction::Ccw => write!(f, "ccw"),
        }
    }
}

/// Result of classifying the first pattern of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeClassification {
    /// Index of the longest interval among the first four (the open disc).
    pub gap_interval: usize,
    /// Index into the edge list of the first wire-0 reference edge.
    pub offset: usize,
    /// Detected rotation direction.
    pub direction: Direction,
}

/// Determines the rotation direction and first wire-0 edge from the first five edges.
///
/// Later edges are never consulted. When the two stripe intervals are exactly equal
/// the second branch applies and the recording is classified as counter-clockwise.
pub fn classify_edges(edges: &[usize]) -> AppResult<EdgeClassification> {
    if edges.len() < CLASSIFY_EDGES {
        return Err(ProbeError::InsufficientEdges {
            found: edges.len(),
            required: CLASSIFY_EDGES,
        });
    }

    let mut d = [0usize; EDGES_PER_ROTATION];
    for (k, slot) in d.iter_mut().enumerate() {
        *slot = edges[k + 1].saturating_sub(edges[k]);
    }

    // First maximum wins, matching argmax semantics.
    let mut ii = 0;
    for k in 1..EDGES_PER_ROTATION {
        if d[k] > d[ii] {
            ii = k;
        }
    }

    let after = d[(ii + 1) % EDGES_PER_ROTATION];
    let before = d[(ii + 3) % EDGES_PER_ROTATION];
    let (offset, direction) = if after > before {
        // Wide stripe first: the trailing edge of the first stripe is the reference.
        ((ii + 2) % EDGES_PER_ROTATION, Direction::Cw)
    } else {
        // Narrow stripe first: the leading edge of the second stripe is the reference.
        ((ii + 3) % EDGES_PER_ROTATION, Direction::Ccw)
    };

    Ok(EdgeClassification {
        gap_interval: ii,
        offset,
        direction,
    })
}
