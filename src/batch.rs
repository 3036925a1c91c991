//! Concurrent batch processing of recordings into a single result sink.
//!
//! Each recording is loaded and analysed on the blocking pool, with at most
//! `batch.workers` in flight. Finished row batches go over an `mpsc` channel to a
//! single writer that owns the sink. The writer commits batches in input order,
//! so one recording's rows are always contiguous and the output is reproducible
//! whatever order the workers finish in.
//!
//! Dispatch is held to a window of `workers * 2` recordings past the oldest
//! uncommitted one. A slow recording therefore stalls new work instead of letting
//! the writer buffer every later result.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::analysis::{analyze_recording, PassStatus};
use crate::config::{AnalysisConfig, ProbeConfig};
use crate::error::{AppResult, ProbeError};
use crate::recording::RecordingLoader;
use crate::sink::{OutputRow, ResultSink};

/// Final state of one recording in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecordingStatus {
    /// Rows written and speed stable.
    Clean,
    /// Rows written, but the disc speed was unstable.
    Degraded {
        /// Max/min rotation period ratio.
        speed_ratio: f64,
    },
    /// Rejected; nothing was written.
    Failed {
        /// Root cause of the rejection.
        error: String,
    },
}

/// What happened to one recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingOutcome {
    /// Recording identifier, usually the source path.
    pub id: String,
    /// Final status, flattened into the record.
    #[serde(flatten)]
    pub status: RecordingStatus,
    /// Rows written to the sink for this recording.
    pub rows: usize,
}

/// Per-recording summary of a batch run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// One entry per input recording.
    pub outcomes: Vec<RecordingOutcome>,
}

impl BatchReport {
    /// Total rows written across the batch.
    pub fn rows_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.rows).sum()
    }

    /// Recordings that were rejected.
    pub fn failed(&self) -> impl Iterator<Item = &RecordingOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RecordingStatus::Failed { .. }))
    }

    /// Recordings written despite an unstable disc speed.
    pub fn degraded(&self) -> impl Iterator<Item = &RecordingOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RecordingStatus::Degraded { .. }))
    }

    /// Number of recordings that produced rows.
    pub fn succeeded(&self) -> usize {
        self.outcomes.len() - self.failed().count()
    }
}

struct Processed {
    status: PassStatus,
    rows: Vec<OutputRow>,
}

struct Finished {
    index: usize,
    id: String,
    result: AppResult<Processed>,
    // Released once the writer has committed this recording.
    _slot: OwnedSemaphorePermit,
}

/// Number of concurrent workers; 0 means available parallelism.
pub fn effective_workers(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Processes `paths` and writes every accepted recording's rows to `sink`.
///
/// Per-recording failures are reported in the [`BatchReport`] and never abort the
/// batch. Sink errors do. The sink is flushed and handed back on success.
pub async fn run_batch<S>(
    paths: Vec<PathBuf>,
    loader: Arc<dyn RecordingLoader>,
    config: &ProbeConfig,
    sink: S,
) -> AppResult<(BatchReport, S)>
where
    S: ResultSink + 'static,
{
    let workers = effective_workers(config.batch.workers);
    info!(recordings = paths.len(), workers, "starting batch");

    let analysis = Arc::new(config.analysis.clone());
    let semaphore = Arc::new(Semaphore::new(workers));
    let window = Arc::new(Semaphore::new(workers * 2));
    let (tx, rx) = mpsc::channel::<Finished>(workers * 2);
    let writer = tokio::task::spawn_blocking(move || write_in_order(rx, sink));

    let mut dispatch_error = None;
    let mut tasks = JoinSet::new();
    for (index, path) in paths.into_iter().enumerate() {
        // Slots are taken in input order, so the oldest pending recording always has one.
        let slot = match Arc::clone(&window).acquire_owned().await {
            Ok(slot) => slot,
            Err(_) => {
                dispatch_error.get_or_insert(ProbeError::WriterClosed);
                break;
            }
        };
        if tx.is_closed() {
            break;
        }
        let id = path.display().to_string();
        let loader = Arc::clone(&loader);
        let analysis = Arc::clone(&analysis);
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| ProbeError::WorkerPanicked(id.clone()))?;
            let result =
                match tokio::task::spawn_blocking(move || process(loader.as_ref(), &path, &analysis))
                    .await
                {
                    Ok(result) => result,
                    Err(join_error) => {
                        error!(recording = %id, "worker failed: {}", join_error);
                        Err(ProbeError::WorkerPanicked(id.clone()))
                    }
                };
            tx.send(Finished {
                index,
                id,
                result,
                _slot: slot,
            })
                .await
                .map_err(|_| ProbeError::WriterClosed)?;
            Ok::<(), ProbeError>(())
        });
    }
    drop(tx);

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                dispatch_error.get_or_insert(e);
            }
            Err(join_error) => error!("batch task failed: {}", join_error),
        }
    }

    // A sink failure closes the channel, so report it ahead of the send errors it causes.
    let (report, sink) = writer
        .await
        .map_err(|_| ProbeError::WorkerPanicked("result writer".to_string()))??;
    if let Some(e) = dispatch_error {
        return Err(e);
    }

    info!(
        recordings = report.outcomes.len(),
        failed = report.failed().count(),
        degraded = report.degraded().count(),
        rows = report.rows_written(),
        "batch complete"
    );
    Ok((report, sink))
}

fn process(loader: &dyn RecordingLoader, path: &Path, config: &AnalysisConfig) -> AppResult<Processed> {
    let recording = loader
        .load(path)
        .map_err(|e| e.in_recording(path.display().to_string()))?;
    let analysis = analyze_recording(&recording, config)?;
    Ok(Processed {
        status: analysis.status,
        rows: analysis.rows(config),
    })
}

fn write_in_order<S: ResultSink>(
    mut rx: mpsc::Receiver<Finished>,
    mut sink: S,
) -> AppResult<(BatchReport, S)> {
    let mut pending = BTreeMap::new();
    let mut next = 0;
    let mut report = BatchReport::default();

    while let Some(done) = rx.blocking_recv() {
        pending.insert(done.index, done);
        while let Some(done) = pending.remove(&next) {
            report.outcomes.push(commit(&mut sink, done)?);
            next += 1;
        }
    }
    // Gaps only remain if a dispatch task died before sending.
    for (_, done) in pending {
        report.outcomes.push(commit(&mut sink, done)?);
    }

    sink.flush()?;
    Ok((report, sink))
}

fn commit<S: ResultSink>(sink: &mut S, done: Finished) -> AppResult<RecordingOutcome> {
    match done.result {
        Ok(processed) => {
            sink.write_rows(&processed.rows)?;
            let status = match processed.status {
                PassStatus::Clean => RecordingStatus::Clean,
                PassStatus::Degraded { speed_ratio } => RecordingStatus::Degraded { speed_ratio },
            };
            Ok(RecordingOutcome {
                id: done.id,
                status,
                rows: processed.rows.len(),
            })
        }
        Err(e) => {
            warn!(recording = %done.id, "recording rejected: {}", e.root());
            Ok(RecordingOutcome {
                id: done.id,
                status: RecordingStatus::Failed {
                    error: e.root().to_string(),
                },
                rows: 0,
            })
        }
    }
}
