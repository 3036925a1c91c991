//! Result sinks for angle-binned output rows.
//!
//! A sink is opened once per batch run and receives rows one at a time. The batch
//! runner owns the only handle, so no locking is needed here.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppResult;
use crate::sync::{AngleGrid, Statistic};

/// One externally-written record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    /// Radius of the wire that produced the value.
    pub wire_radius: f64,
    /// Probe x position.
    pub x: f64,
    /// Probe y position.
    pub y: f64,
    /// Bin centre angle in radians.
    pub theta: f64,
    /// Selected statistic, `NaN` for empty bins except counts.
    pub value: f64,
}

/// Append-only row writer.
pub trait ResultSink: Send {
    /// Appends one row.
    fn write_row(&mut self, row: &OutputRow) -> AppResult<()>;

    /// Pushes buffered rows to the destination.
    fn flush(&mut self) -> AppResult<()>;

    /// Writes a batch back to back.
    fn write_rows(&mut self, rows: &[OutputRow]) -> AppResult<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn write_row(&mut self, row: &OutputRow) -> AppResult<()> {
        (**self).write_row(row)
    }

    fn flush(&mut self) -> AppResult<()> {
        (**self).flush()
    }

    fn write_rows(&mut self, rows: &[OutputRow]) -> AppResult<()> {
        (**self).write_rows(rows)
    }
}

/// Run description written ahead of the rows.
#[derive(Debug, Clone, Serialize)]
pub struct RunHeader {
    /// RFC 3339 creation time.
    pub created: String,
    /// Crate version that wrote the file.
    pub software_version: String,
    /// Grid the rows were binned on.
    pub grid: AngleGrid,
    /// Statistic in the `value` column.
    pub statistic: Statistic,
}

impl RunHeader {
    /// Stamps a header with the current time.
    pub fn new(grid: AngleGrid, statistic: Statistic) -> Self {
        Self {
            created: chrono::Utc::now().to_rfc3339(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            grid,
            statistic,
        }
    }
}

/// A writer for CSV files.
///
/// The run header is written as `# `-prefixed JSON lines before the column header.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvSink<File> {
    /// Creates (or truncates) `path`, creating parent directories as needed.
    pub fn create(path: &Path, header: &RunHeader) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        info!("CSV output will be written to '{}'", path.display());
        Self::new(file, header)
    }
}

impl<W: Write> CsvSink<W> {
    /// Writes the header and column names to `inner`.
    pub fn new(mut inner: W, header: &RunHeader) -> AppResult<Self> {
        let json_string = serde_json::to_string_pretty(header)?;
        for line in json_string.lines() {
            inner.write_all(b"# ")?;
            inner.write_all(line.as_bytes())?;
            inner.write_all(b"\n")?;
        }

        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(["wire_radius", "x", "y", "theta", "value"])?;
        Ok(Self { writer, rows: 0 })
    }

    /// Rows written so far.
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> AppResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::ProbeError::Io(e.into_error()))
    }
}

impl<W: Write + Send> ResultSink for CsvSink<W> {
    fn write_row(&mut self, row: &OutputRow) -> AppResult<()> {
        self.writer.write_record(&[
            row.wire_radius.to_string(),
            row.x.to_string(),
            row.y.to_string(),
            row.theta.to_string(),
            row.value.to_string(),
        ])?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> AppResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects rows in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    /// Rows in write order.
    pub rows: Vec<OutputRow>,
    /// Number of `flush` calls.
    pub flushes: usize,
}

impl ResultSink for MemorySink {
    fn write_row(&mut self, row: &OutputRow) -> AppResult<()> {
        self.rows.push(*row);
        Ok(())
    }

    fn flush(&mut self) -> AppResult<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Output destination chosen at the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    /// CSV file at the given path.
    Csv(PathBuf),
    /// CSV on standard output.
    Stdout,
}

impl SinkTarget {
    /// Opens the destination and writes the header.
    pub fn open(&self, header: &RunHeader) -> AppResult<Box<dyn ResultSink>> {
        Ok(match self {
            SinkTarget::Csv(path) => Box::new(CsvSink::create(path, header)?),
            SinkTarget::Stdout => Box::new(CsvSink::new(std::io::stdout(), header)?),
        })
    }
}
