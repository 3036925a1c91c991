//! Reduction of binned samples to summary statistics.

use serde::{Deserialize, Serialize};

use super::grid::AngleGrid;

/// Summary of one `(wire, bin)` collection.
///
/// Empty bins have `count == 0` and `NaN` in every other field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinStats {
    /// Samples in the bin.
    pub count: usize,
    /// Mean value.
    pub mean: f64,
    /// Median value.
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
}

impl BinStats {
    /// Stats of a bin with no samples.
    pub fn empty() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
        }
    }

    /// Computes statistics over `values`, reordering them in place.
    pub fn from_values(values: &mut [f64]) -> Self {
        if values.is_empty() {
            return Self::empty();
        }
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let var = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;

        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = if n % 2 == 0 {
            0.5 * (values[n / 2 - 1] + values[n / 2])
        } else {
            values[n / 2]
        };

        Self {
            count: n,
            mean,
            median,
            std: var.sqrt(),
            min: values[0],
            max: values[n - 1],
        }
    }

    /// True when the bin holds no samples.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the selected statistic.
    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Count => self.count as f64,
            Statistic::Mean => self.mean,
            Statistic::Median => self.median,
            Statistic::Std => self.std,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
        }
    }
}

/// Statistic written to the result sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    /// Sample count.
    Count,
    /// Arithmetic mean.
    #[default]
    Mean,
    /// Median, averaging the middle pair for even counts.
    Median,
    /// Population standard deviation.
    Std,
    /// Smallest sample.
    Min,
    /// Largest sample.
    Max,
}

impl std::str::FromStr for Statistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "count" => Ok(Statistic::Count),
            "mean" => Ok(Statistic::Mean),
            "median" => Ok(Statistic::Median),
            "std" => Ok(Statistic::Std),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            _ => Err(format!(
                "Invalid statistic '{}'. Must be one of: count, mean, median, std, min, max",
                s
            )),
        }
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Statistic::Count => "count",
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Std => "std",
            Statistic::Min => "min",
            Statistic::Max => "max",
        };
        write!(f, "{}", label)
    }
}

/// Dense per-wire, per-bin statistics table.
#[derive(Debug, Clone, Serialize)]
pub struct StatsTable {
    /// Bin centre angles, shared by every wire.
    pub theta: Vec<f64>,
    /// `stats[wire][bin]`.
    pub stats: Vec<Vec<BinStats>>,
}

impl StatsTable {
    /// Reduces accumulated bins, consuming them.
    pub fn aggregate(grid: &AngleGrid, bins: Vec<Vec<Vec<f64>>>) -> Self {
        let stats = bins
            .into_iter()
            .map(|wire| {
                wire.into_iter()
                    .map(|mut values| BinStats::from_values(&mut values))
                    .collect()
            })
            .collect();
        Self {
            theta: grid.centers(),
            stats,
        }
    }

    /// Number of wires in the table.
    pub fn wires(&self) -> usize {
        self.stats.len()
    }

    /// Number of angle bins, `Ntheta`.
    pub fn bins(&self) -> usize {
        self.theta.len()
    }

    /// Stats of one wire and bin, if in range.
    pub fn get(&self, wire: usize, bin: usize) -> Option<&BinStats> {
        self.stats.get(wire).and_then(|w| w.get(bin))
    }

    /// Total sample count over all bins of one wire.
    pub fn wire_count(&self, wire: usize) -> usize {
        self.stats
            .get(wire)
            .map(|w| w.iter().map(|s| s.count).sum())
            .unwrap_or(0)
    }
}
