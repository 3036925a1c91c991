//! Synthetic probe recordings for tests, benchmarks and dry runs.
//!
//! The generated encoder follows the physical stripe layout: a wide stripe whose
//! trailing edge (clockwise) marks wire 0, a short gap, then a narrow stripe. The
//! current of each sample is a sawtooth in the angle of the nearest wire,
//! `baseline + gain(w) * theta`, so binned means can be checked against a known
//! function.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::recording::{Position, Recording, RecordingMetadata, WireMeta};
use crate::sync::Direction;

/// Stripe layout as fractions of one rotation.
const WIDE_STRIPE: f64 = 1.0 / 12.0;
const STRIPE_GAP: f64 = 1.0 / 36.0;
const NARROW_STRIPE: f64 = 1.0 / 18.0;

/// Builder for a synthetic [`Recording`].
#[derive(Debug, Clone)]
pub struct SyntheticRecording {
    wires: usize,
    period: usize,
    rotations: usize,
    direction: Direction,
    drift: f64,
    noise: f64,
    seed: u64,
    baseline: f64,
    sample_rate_hz: f64,
    position: Position,
}

impl SyntheticRecording {
    /// `period` is the number of samples per rotation.
    pub fn new(wires: usize, period: usize) -> Self {
        Self {
            wires,
            period,
            rotations: 10,
            direction: Direction::Cw,
            drift: 0.0,
            noise: 0.0,
            seed: 0,
            baseline: 0.0,
            sample_rate_hz: 100_000.0,
            position: Position::default(),
        }
    }

    /// Number of reference edges inside the recording.
    pub fn rotations(mut self, rotations: usize) -> Self {
        self.rotations = rotations;
        self
    }

    /// Spin direction of the disc.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Fractional period growth per rotation.
    pub fn drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    /// Uniform noise amplitude added to every sample.
    pub fn noise(mut self, amplitude: f64, seed: u64) -> Self {
        self.noise = amplitude;
        self.seed = seed;
        self
    }

    /// Constant offset added to every sample.
    pub fn baseline(mut self, baseline: f64) -> Self {
        self.baseline = baseline;
        self
    }

    /// Probe position stored in the metadata.
    pub fn position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Sawtooth slope of wire `w`.
    pub fn gain(w: usize) -> f64 {
        1.0 + w as f64
    }

    /// Sample index of the first wire-0 reference edge.
    pub fn lead(&self) -> usize {
        self.period * 3 / 4
    }

    /// Reference edge times, one per rotation.
    fn references(&self) -> Vec<usize> {
        let mut refs = Vec::with_capacity(self.rotations);
        let mut t = self.lead();
        for k in 0..self.rotations {
            refs.push(t);
            t += self.period_of(k);
        }
        refs
    }

    fn period_of(&self, k: usize) -> usize {
        (self.period as f64 * (1.0 + self.drift).powi(k as i32)).round() as usize
    }

    /// Generates samples and encoder edges.
    pub fn build(&self) -> Recording {
        let refs = self.references();
        let last_period = self.period_of(self.rotations.saturating_sub(1));
        let samples = refs.last().copied().unwrap_or(0) + last_period / 2;

        let edges = self.edges(&refs, samples);
        let phase = self.phase(&refs, samples);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let spacing = 2.0 * PI / self.wires.max(1) as f64;
        let current = phase
            .iter()
            .map(|&phi| {
                let slot = (phi / spacing).round();
                let theta = phi - slot * spacing;
                let wire = (slot as usize) % self.wires.max(1);
                let noise = if self.noise > 0.0 {
                    rng.gen_range(-self.noise..=self.noise)
                } else {
                    0.0
                };
                self.baseline + Self::gain(wire) * theta + noise
            })
            .collect();

        Recording {
            id: "synthetic".to_string(),
            metadata: RecordingMetadata {
                sample_rate_hz: self.sample_rate_hz,
                distream: 1,
                wires: (0..self.wires)
                    .map(|w| WireMeta {
                        radius: 0.005 * (w + 1) as f64,
                    })
                    .collect(),
                position: self.position,
                description: format!(
                    "synthetic {} wires, {} samples/rotation, {}",
                    self.wires, self.period, self.direction
                ),
            },
            edges,
            current,
        }
    }

    /// Encoder transitions for every visible stripe edge.
    fn edges(&self, refs: &[usize], samples: usize) -> Vec<usize> {
        let phases = [-WIDE_STRIPE, 0.0, STRIPE_GAP, STRIPE_GAP + NARROW_STRIPE];
        let sign = self.direction.sign() as f64;

        // One pattern per reference plus one before and after the recording.
        let mut anchors: Vec<(f64, f64)> = Vec::with_capacity(refs.len() + 2);
        if let Some(&first) = refs.first() {
            let p = self.period_of(0) as f64;
            anchors.push((first as f64 - p, p));
        }
        for (k, &t) in refs.iter().enumerate() {
            anchors.push((t as f64, self.period_of(k) as f64));
        }
        if let Some(&last) = refs.last() {
            let p = self.period_of(refs.len() - 1) as f64;
            anchors.push((last as f64 + p, p));
        }

        let mut edges: Vec<usize> = anchors
            .into_iter()
            .flat_map(|(t, p)| phases.iter().map(move |f| (t + sign * f * p).round()))
            .filter(|&e| e >= 1.0 && e < samples as f64)
            .map(|e| e as usize)
            .collect();
        edges.sort_unstable();
        edges.dedup();
        edges
    }

    /// Disc angle of every sample, zero at each reference edge.
    ///
    /// Outside the references the nearest rotation's span is extrapolated, matching
    /// how a counter-clockwise recording measures spans back to the previous edge.
    fn phase(&self, refs: &[usize], samples: usize) -> Vec<f64> {
        let sign = self.direction.sign() as f64;
        let first_span = self.period_of(0) as f64;
        let last_span = match self.direction {
            Direction::Cw => self.period_of(refs.len().saturating_sub(1)),
            Direction::Ccw => self.period_of(refs.len().saturating_sub(2)),
        } as f64;

        let mut k = 0;
        (0..samples)
            .map(|t| {
                while k + 1 < refs.len() && t >= refs[k + 1] {
                    k += 1;
                }
                let (start, span) = match refs.first() {
                    None => (0.0, first_span),
                    Some(&r0) if t < r0 => (r0 as f64 - first_span, first_span),
                    Some(_) if k + 1 < refs.len() => (refs[k] as f64, (refs[k + 1] - refs[k]) as f64),
                    Some(_) => (refs[k] as f64, last_span),
                };
                let frac = (t as f64 - start) / span;
                (sign * 2.0 * PI * frac).rem_euclid(2.0 * PI)
            })
            .collect()
    }
}
