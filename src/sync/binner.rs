//! Sample-to-bin accumulation.

use super::grid::AngleGrid;
use super::synchronizer::WireWindow;

/// Raw current values collected per `(wire, bin)`.
///
/// Created fresh for each recording and consumed once by the aggregator.
#[derive(Debug, Clone)]
pub struct AngleBinner {
    grid: AngleGrid,
    bins: Vec<Vec<Vec<f64>>>,
    samples: usize,
}

impl AngleBinner {
    /// Empty bins for `wires` wires on `grid`.
    pub fn new(grid: AngleGrid, wires: usize) -> Self {
        let ntheta = grid.bin_count();
        Self {
            grid,
            bins: vec![vec![Vec::new(); ntheta]; wires],
            samples: 0,
        }
    }

    /// Grid samples are binned on.
    pub fn grid(&self) -> &AngleGrid {
        &self.grid
    }

    /// Number of wires.
    pub fn wires(&self) -> usize {
        self.bins.len()
    }

    /// Total samples appended so far.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Appends every sample of `window` to its wire's bins.
    ///
    /// Bin indices are clamped so that rounding at the window boundary cannot
    /// push a sample outside the grid.
    pub fn accumulate(&mut self, window: &WireWindow, current: &[f64]) {
        let stop = window.stop.min(current.len());
        if window.start >= stop {
            return;
        }
        let Some(bins) = self.bins.get_mut(window.wire) else {
            return;
        };
        for (ii, &value) in current.iter().enumerate().take(stop).skip(window.start) {
            let j = self.grid.bin_index(window.theta(ii));
            bins[j].push(value);
        }
        self.samples += stop - window.start;
    }

    /// Values collected for one bin.
    pub fn values(&self, wire: usize, bin: usize) -> &[f64] {
        self.bins
            .get(wire)
            .and_then(|w| w.get(bin))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Releases the accumulated values, indexed `[wire][bin]`.
    pub fn into_bins(self) -> Vec<Vec<Vec<f64>>> {
        self.bins
    }
}
