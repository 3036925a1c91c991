//! Per-wire zero crossings and sample windows.
//!
//! Wires are equally spaced, so within a rotation `(I, dI)` wire `w` passes angle
//! zero at `I + s * floor(w * dI / Nwire)` where `s` is the direction sign. Samples
//! before the first reference edge are covered by extrapolating one rotation back
//! from the first record with offsets `w - Nwire`.
//!
//! All index arithmetic happens in the raw frame. A counter-clockwise recording is
//! never copied in reverse; the sign `s` is applied to every offset instead.

use std::f64::consts::PI;

use super::edges::Direction;
use super::grid::AngleGrid;
use super::rotation::{Rotation, RotationSet};

/// The samples one wire contributes during one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireWindow {
    /// Wire number.
    pub wire: usize,
    /// Raw index at which the wire is at angle zero. May lie outside the recording.
    pub izero: i64,
    /// Signed angle increment per sample.
    pub dtheta: f64,
    /// First raw sample index (inclusive).
    pub start: usize,
    /// Last raw sample index (exclusive).
    pub stop: usize,
}

impl WireWindow {
    /// True when the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.start >= self.stop
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    /// Angle of raw sample `ii` relative to this wire's zero crossing.
    pub fn theta(&self, ii: usize) -> f64 {
        (ii as i64 - self.izero) as f64 * self.dtheta
    }
}

/// Computes wire windows for the rotations of one recording.
#[derive(Debug, Clone, Copy)]
pub struct AngleSynchronizer {
    direction: Direction,
    wires: usize,
    grid: AngleGrid,
    samples: usize,
}

impl AngleSynchronizer {
    /// `samples` is the recording length windows are clamped to.
    pub fn new(direction: Direction, wires: usize, grid: AngleGrid, samples: usize) -> Self {
        Self {
            direction,
            wires,
            grid,
            samples,
        }
    }

    /// Zero-crossing indices of every wire within one rotation.
    pub fn zero_crossings(&self, rotation: Rotation) -> Vec<i64> {
        (0..self.wires)
            .map(|w| self.izero(rotation, w as i64))
            .collect()
    }

    /// Windows for every wire within one rotation record.
    pub fn rotation_windows(&self, rotation: Rotation) -> Vec<WireWindow> {
        (0..self.wires)
            .map(|w| self.window(rotation, w, w as i64))
            .collect()
    }

    /// Windows for the samples before the first reference edge.
    ///
    /// No reference edge exists there, so the crossings are extrapolated backwards
    /// from the first rotation using `w - Nwire` as the wire offset.
    pub fn pre_trigger_windows(&self, first: Rotation) -> Vec<WireWindow> {
        let n = self.wires as i64;
        (0..self.wires)
            .map(|w| self.window(first, w, w as i64 - n))
            .collect()
    }

    /// All windows of a recording in traversal order: the pre-trigger region, then
    /// every rotation record.
    ///
    /// A window is cut where the next non-empty window begins, so no sample is
    /// visited twice even when the angle window spans the whole wire spacing or a
    /// rotation is longer than the one before it.
    pub fn windows(&self, rotations: &RotationSet) -> Vec<WireWindow> {
        let mut windows = Vec::with_capacity((rotations.len() + 1) * self.wires);
        if let Some(first) = rotations.first() {
            windows.extend(self.pre_trigger_windows(first));
        }
        for rotation in rotations.rotations() {
            windows.extend(self.rotation_windows(rotation));
        }
        self.trim_overlaps(&mut windows);
        windows
    }

    // Walks backwards so each window only has to respect the ones after it.
    fn trim_overlaps(&self, windows: &mut [WireWindow]) {
        match self.direction {
            Direction::Cw => {
                let mut next_start = usize::MAX;
                for w in windows.iter_mut().rev() {
                    if w.is_empty() {
                        continue;
                    }
                    w.stop = w.stop.min(next_start).max(w.start);
                    next_start = next_start.min(w.start);
                }
            }
            Direction::Ccw => {
                // Traversal runs towards lower raw indices, so the tail is `start`.
                let mut next_stop = 0;
                for w in windows.iter_mut().rev() {
                    if w.is_empty() {
                        continue;
                    }
                    w.start = w.start.max(next_stop).min(w.stop);
                    next_stop = next_stop.max(w.stop);
                }
            }
        }
    }

    fn izero(&self, rotation: Rotation, slot: i64) -> i64 {
        let offset = (slot * rotation.duration as i64).div_euclid(self.wires.max(1) as i64);
        rotation.index as i64 + self.direction.sign() * offset
    }

    fn window(&self, rotation: Rotation, wire: usize, slot: i64) -> WireWindow {
        let izero = self.izero(rotation, slot);
        let step = 2.0 * PI / rotation.duration as f64;
        let kmin = (self.grid.theta_min / step).ceil() as i64;
        let kmax = (self.grid.theta_max / step).ceil() as i64;

        // Forward offsets [kmin, kmax) map to raw indices izero + s*k. Walking them
        // backwards turns the half-open range around.
        let (lo, hi) = match self.direction {
            Direction::Cw => (izero + kmin, izero + kmax),
            Direction::Ccw => (izero - kmax + 1, izero - kmin + 1),
        };
        let limit = self.samples as i64;
        let start = lo.clamp(0, limit) as usize;
        let stop = hi.clamp(0, limit) as usize;

        WireWindow {
            wire,
            izero,
            dtheta: self.direction.sign() as f64 * step,
            start,
            stop: stop.max(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> AngleGrid {
        AngleGrid::new(-0.3, 0.3, 0.1).unwrap()
    }

    const ROT: Rotation = Rotation {
        index: 10_000,
        duration: 3600,
    };

    #[test]
    fn clockwise_crossings_increase_evenly() {
        let sync = AngleSynchronizer::new(Direction::Cw, 4, grid(), 100_000);
        let z = sync.zero_crossings(ROT);
        assert_eq!(z, vec![10_000, 10_900, 11_800, 12_700]);
    }

    #[test]
    fn counter_clockwise_crossings_decrease_evenly() {
        let sync = AngleSynchronizer::new(Direction::Ccw, 4, grid(), 100_000);
        let z = sync.zero_crossings(ROT);
        assert_eq!(z, vec![10_000, 9_100, 8_200, 7_300]);
    }

    #[test]
    fn uneven_split_spacing_within_one_sample() {
        let rot = Rotation {
            index: 500,
            duration: 3601,
        };
        for direction in [Direction::Cw, Direction::Ccw] {
            let sync = AngleSynchronizer::new(direction, 7, grid(), 100_000);
            let z = sync.zero_crossings(rot);
            let nominal = 3601.0 / 7.0;
            for pair in z.windows(2) {
                let gap = (pair[1] - pair[0]) * direction.sign();
                assert!(gap > 0);
                assert!((gap as f64 - nominal).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn clockwise_window_covers_theta_range() {
        let sync = AngleSynchronizer::new(Direction::Cw, 4, grid(), 100_000);
        let w = sync.rotation_windows(ROT)[0];
        // 0.3 rad at 3600 samples/rev is 171.9 samples.
        assert_eq!(w.start, 10_000 - 171);
        assert_eq!(w.stop, 10_000 + 172);
        assert!(w.theta(w.start) >= -0.3);
        assert!(w.theta(w.stop - 1) < 0.3);
        assert!(w.theta(w.start - 1) < -0.3);
    }

    #[test]
    fn counter_clockwise_window_mirrors_clockwise() {
        let cw = AngleSynchronizer::new(Direction::Cw, 4, grid(), 100_000).rotation_windows(ROT);
        let ccw = AngleSynchronizer::new(Direction::Ccw, 4, grid(), 100_000).rotation_windows(ROT);
        for (a, b) in cw.iter().zip(&ccw) {
            assert_eq!(a.len(), b.len());
            // Same set of angles visited.
            let mut ta: Vec<f64> = (a.start..a.stop).map(|i| a.theta(i)).collect();
            let mut tb: Vec<f64> = (b.start..b.stop).map(|i| b.theta(i)).collect();
            ta.sort_by(|x, y| x.partial_cmp(y).unwrap());
            tb.sort_by(|x, y| x.partial_cmp(y).unwrap());
            for (x, y) in ta.iter().zip(&tb) {
                assert!((x - y).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn windows_within_rotation_do_not_overlap() {
        let sync = AngleSynchronizer::new(Direction::Cw, 4, grid(), 100_000);
        let ws = sync.rotation_windows(ROT);
        for pair in ws.windows(2) {
            assert!(pair[0].stop <= pair[1].start);
        }
    }

    #[test]
    fn pre_trigger_extrapolates_one_rotation_back() {
        let sync = AngleSynchronizer::new(Direction::Cw, 4, grid(), 100_000);
        let pre = sync.pre_trigger_windows(ROT);
        let izeros: Vec<i64> = pre.iter().map(|w| w.izero).collect();
        assert_eq!(izeros, vec![6_400, 7_300, 8_200, 9_100]);
        let main = sync.rotation_windows(ROT);
        assert!(pre[3].stop <= main[0].start);
    }

    #[test]
    fn pre_trigger_clamps_at_recording_start() {
        let rot = Rotation {
            index: 1000,
            duration: 3600,
        };
        let sync = AngleSynchronizer::new(Direction::Cw, 4, grid(), 100_000);
        let pre = sync.pre_trigger_windows(rot);
        // Wire 0 would sit at -2600: nothing to read.
        assert!(pre[0].is_empty());
        // Wire 3 sits at 100: window is clipped at zero.
        assert_eq!(pre[3].izero, 100);
        assert_eq!(pre[3].start, 0);
        assert_eq!(pre[3].stop, 272);
    }

    /// An angle window as wide as the wire spacing.
    fn full_spacing_grid() -> AngleGrid {
        AngleGrid::new(-PI / 4.0, PI / 4.0, PI / 40.0).unwrap()
    }

    fn assert_disjoint(windows: &[WireWindow]) {
        let mut filled: Vec<&WireWindow> = windows.iter().filter(|w| !w.is_empty()).collect();
        filled.sort_by_key(|w| w.start);
        for pair in filled.windows(2) {
            assert!(
                pair[0].stop <= pair[1].start,
                "{:?} overlaps {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn full_spacing_windows_share_no_samples() {
        let rotations = RotationSet {
            edges_i: vec![10_000, 13_601, 17_202],
            edges_di: vec![3601, 3601, 3601],
            direction: Direction::Cw,
        };
        let sync = AngleSynchronizer::new(Direction::Cw, 4, full_spacing_grid(), 100_000);

        // Untrimmed, wire 0 and wire 1 both claim the sample 450 after the reference.
        let raw = sync.rotation_windows(rotations.first().unwrap());
        assert_eq!(raw[0].stop, 10_451);
        assert_eq!(raw[1].start, 10_450);

        let windows = sync.windows(&rotations);
        assert_eq!(windows.len(), 16);
        assert_disjoint(&windows);
        let visited: usize = windows.iter().map(WireWindow::len).sum();
        assert!(visited <= 100_000);
        // Trimming only shortens the earlier window.
        assert_eq!(windows[4].stop, 10_450);
        assert_eq!(windows[5].start, 10_450);
    }

    #[test]
    fn longer_next_rotation_does_not_reread_previous_tail() {
        let rotations = RotationSet {
            edges_i: vec![10_000, 13_601, 17_242],
            edges_di: vec![3601, 3641, 3641],
            direction: Direction::Cw,
        };
        let sync = AngleSynchronizer::new(Direction::Cw, 4, full_spacing_grid(), 100_000);
        let last = sync.rotation_windows(Rotation {
            index: 10_000,
            duration: 3601,
        })[3];
        let next = sync.rotation_windows(Rotation {
            index: 13_601,
            duration: 3641,
        })[0];
        assert!(last.stop > next.start);

        let windows = sync.windows(&rotations);
        assert_disjoint(&windows);
        assert_eq!(windows[7].stop, next.start);
        assert_eq!(windows[8].start, next.start);
    }

    #[test]
    fn counter_clockwise_windows_trim_at_lower_index() {
        let rotations = RotationSet {
            edges_i: vec![20_000, 16_399, 12_758],
            edges_di: vec![3601, 3641, 3641],
            direction: Direction::Ccw,
        };
        let sync = AngleSynchronizer::new(Direction::Ccw, 4, full_spacing_grid(), 100_000);
        let last = sync.rotation_windows(Rotation {
            index: 20_000,
            duration: 3601,
        })[3];
        let next = sync.rotation_windows(Rotation {
            index: 16_399,
            duration: 3641,
        })[0];
        assert!(next.stop > last.start);

        let windows = sync.windows(&rotations);
        assert_disjoint(&windows);
        assert_eq!(windows[7].start, next.stop);
        assert_eq!(windows[7].stop, last.stop);
    }

    #[test]
    fn window_clamps_at_recording_end() {
        let sync = AngleSynchronizer::new(Direction::Cw, 4, grid(), 10_050);
        let w = sync.rotation_windows(ROT)[0];
        assert_eq!(w.stop, 10_050);
        let beyond = sync.rotation_windows(ROT)[1];
        assert!(beyond.is_empty());
    }
}
