//! Run coordinator
//!
//! Drives one ingestion run: table bootstrap, then one file or every matching
//! file in a directory, then the final row counts. For each file the workers
//! start first, the reader runs on a blocking thread and feeds the bounded
//! queue, and every worker is joined before the file's statistics are read.

use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::IngestOptions;
use crate::db::TableCounts;
use crate::decoder::{decode_line, DecodedLine};
use crate::distributor::{work_queue, RecordSender};
use crate::error::{IngestError, IngestResult};
use crate::source::LineSource;
use crate::store::RecordStore;
use crate::worker::{run_worker, WorkerReport};

/// Substring a directory entry's name must contain to be ingested
pub const INPUT_NAME_PATTERN: &str = ".json";

/// What to ingest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestTarget {
    File(PathBuf),
    Directory(PathBuf),
}

impl IngestTarget {
    /// Pick the target from the command line; a file wins over a directory
    pub fn from_args(file: Option<PathBuf>, dir: Option<PathBuf>) -> IngestResult<Self> {
        match (file, dir) {
            (Some(file), _) => Ok(Self::File(file)),
            (None, Some(dir)) => Ok(Self::Directory(dir)),
            (None, None) => Err(IngestError::Usage(
                "Please specify either --file or --dir".to_string(),
            )),
        }
    }
}

/// Counters for one file, or summed over several
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Non-blank lines handed to the decoder
    pub lines_processed: usize,
    pub malformed_lines: usize,
    pub records_queued: usize,
    pub records_written: usize,
    pub records_failed: usize,
    pub rate_rows_written: usize,
    pub workers_lost: usize,
}

impl IngestStats {
    pub fn add(&mut self, other: &IngestStats) {
        self.lines_processed += other.lines_processed;
        self.malformed_lines += other.malformed_lines;
        self.records_queued += other.records_queued;
        self.records_written += other.records_written;
        self.records_failed += other.records_failed;
        self.rate_rows_written += other.rate_rows_written;
        self.workers_lost += other.workers_lost;
    }

    fn add_worker(&mut self, report: &WorkerReport) {
        self.records_written += report.records_written;
        self.records_failed += report.records_failed;
        self.rate_rows_written += report.rate_rows_written;
        if report.stopped_early {
            self.workers_lost += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub stats: IngestStats,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub files_attempted: usize,
    pub files_failed: usize,
    pub stats: IngestStats,
    pub elapsed: Duration,
}

impl From<FileSummary> for BatchSummary {
    fn from(file: FileSummary) -> Self {
        Self {
            files_attempted: 1,
            files_failed: 0,
            stats: file.stats,
            elapsed: file.elapsed,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub batch: BatchSummary,
    /// `None` when the final count query failed
    pub table_counts: Option<TableCounts>,
}

/// Reader-side counters plus the error that ended the file, if any
#[derive(Debug, Default)]
struct ProducerOutcome {
    lines_processed: usize,
    malformed_lines: usize,
    records_queued: usize,
    error: Option<IngestError>,
}

pub struct Coordinator<S: RecordStore> {
    store: Arc<S>,
    options: IngestOptions,
}

impl<S: RecordStore> Coordinator<S> {
    pub fn new(store: Arc<S>, options: IngestOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Ensure tables, ingest the target, then report table row counts
    pub async fn run(&self, target: &IngestTarget) -> IngestResult<RunSummary> {
        self.store.ensure_schema().await?;

        let batch = match target {
            IngestTarget::File(path) => BatchSummary::from(self.run_file(path).await?),
            IngestTarget::Directory(dir) => self.run_directory(dir).await?,
        };

        let table_counts = match self.store.table_counts().await {
            Ok(counts) => {
                info!(
                    insurance_services = counts.services,
                    negotiated_rates = counts.negotiated_rates,
                    "Database statistics"
                );
                Some(counts)
            },
            Err(e) => {
                warn!(error = %e, "Failed to read table statistics");
                None
            },
        };

        Ok(RunSummary {
            batch,
            table_counts,
        })
    }

    /// Ingest every `*.json*` file in `dir`, in name order
    ///
    /// A file that fails is logged and counted; the next file still runs.
    pub async fn run_directory(&self, dir: &Path) -> IngestResult<BatchSummary> {
        let started = Instant::now();
        let files = list_input_files(dir)?;

        info!(dir = %dir.display(), files = files.len(), "Processing directory");

        let mut batch = BatchSummary::default();
        for path in files {
            batch.files_attempted += 1;
            info!(path = %path.display(), "Processing file");

            match self.run_file(&path).await {
                Ok(summary) => batch.stats.add(&summary.stats),
                Err(e) => {
                    batch.files_failed += 1;
                    error!(path = %path.display(), error = %e, "Failed to process file");
                },
            }
        }
        batch.elapsed = started.elapsed();

        info!(
            files_attempted = batch.files_attempted,
            files_failed = batch.files_failed,
            records_written = batch.stats.records_written,
            records_failed = batch.stats.records_failed,
            elapsed_ms = batch.elapsed.as_millis() as u64,
            "Directory complete"
        );

        Ok(batch)
    }

    /// Ingest one file
    ///
    /// A stream failure is returned only after every worker has drained the
    /// records queued before it, so those records are still written.
    pub async fn run_file(&self, path: &Path) -> IngestResult<FileSummary> {
        let started = Instant::now();
        let (sender, receiver) = work_queue(self.options.queue_capacity);

        let workers: Vec<_> = (0..self.options.workers)
            .map(|worker| {
                tokio::spawn(run_worker(worker, Arc::clone(&self.store), receiver.clone()))
            })
            .collect();
        // Only workers hold the queue now, so a pool that dies entirely
        // surfaces as a failed push instead of a stalled reader.
        drop(receiver);

        let producer = {
            let path = path.to_path_buf();
            let max_line_bytes = self.options.max_line_bytes;
            let progress_interval = self.options.progress_interval;
            tokio::task::spawn_blocking(move || {
                produce(&path, max_line_bytes, progress_interval, sender)
            })
        };

        let outcome = producer.await;

        let mut stats = IngestStats::default();
        for (worker, joined) in join_all(workers).await.into_iter().enumerate() {
            match joined {
                Ok(report) => stats.add_worker(&report),
                Err(e) => {
                    stats.workers_lost += 1;
                    error!(worker, error = %e, "Worker panicked");
                },
            }
        }

        let outcome = outcome?;
        stats.lines_processed = outcome.lines_processed;
        stats.malformed_lines = outcome.malformed_lines;
        stats.records_queued = outcome.records_queued;

        let summary = FileSummary {
            path: path.to_path_buf(),
            stats,
            elapsed: started.elapsed(),
        };

        if let Some(e) = outcome.error {
            warn!(
                path = %path.display(),
                lines_processed = summary.stats.lines_processed,
                records_written = summary.stats.records_written,
                "File aborted"
            );
            return Err(e);
        }

        info!(
            path = %path.display(),
            lines_processed = summary.stats.lines_processed,
            malformed_lines = summary.stats.malformed_lines,
            records_queued = summary.stats.records_queued,
            records_written = summary.stats.records_written,
            records_failed = summary.stats.records_failed,
            rate_rows = summary.stats.rate_rows_written,
            workers_lost = summary.stats.workers_lost,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "File complete"
        );

        Ok(summary)
    }
}

/// Read, decode, and queue every record of one file
///
/// Runs on a blocking thread. The sender is dropped on return, which closes
/// the queue after the last push.
fn produce(
    path: &Path,
    max_line_bytes: usize,
    progress_interval: usize,
    sender: RecordSender,
) -> ProducerOutcome {
    let mut outcome = ProducerOutcome::default();

    let source = match LineSource::open(path, max_line_bytes) {
        Ok(source) => source,
        Err(e) => {
            outcome.error = Some(e.into());
            return outcome;
        },
    };

    for line in source {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                outcome.error = Some(e.into());
                break;
            },
        };

        let text = line.text.trim();
        if text.is_empty() {
            continue;
        }
        outcome.lines_processed += 1;

        match decode_line(text) {
            DecodedLine::Malformed(e) => {
                outcome.malformed_lines += 1;
                warn!(
                    path = %path.display(),
                    line = line.number,
                    entry = outcome.lines_processed,
                    error = %e,
                    "Skipping malformed line"
                );
            },
            decoded => {
                for record in decoded.into_records() {
                    if sender.push_blocking(record).is_err() {
                        outcome.error = Some(IngestError::QueueClosed {
                            path: path.to_path_buf(),
                        });
                        return outcome;
                    }
                    outcome.records_queued += 1;
                }
            },
        }

        if progress_interval > 0 && outcome.lines_processed % progress_interval == 0 {
            info!(
                path = %path.display(),
                lines_processed = outcome.lines_processed,
                records_queued = outcome.records_queued,
                "Progress"
            );
        }
    }

    sender.close();
    outcome
}

/// Regular files in `dir` whose name contains `.json`, sorted by name
pub fn list_input_files(dir: &Path) -> IngestResult<Vec<PathBuf>> {
    let list_error = |source| IngestError::ListDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_error)? {
        let entry = entry.map_err(list_error)?;
        let path = entry.path();
        let matches = entry
            .file_name()
            .to_string_lossy()
            .contains(INPUT_NAME_PATTERN);
        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_target_prefers_file() {
        let target = IngestTarget::from_args(
            Some(PathBuf::from("a.json")),
            Some(PathBuf::from("/data")),
        )
        .unwrap();
        assert_eq!(target, IngestTarget::File(PathBuf::from("a.json")));

        let target = IngestTarget::from_args(None, Some(PathBuf::from("/data"))).unwrap();
        assert_eq!(target, IngestTarget::Directory(PathBuf::from("/data")));
    }

    #[test]
    fn test_target_requires_file_or_dir() {
        let err = IngestTarget::from_args(None, None).unwrap_err();
        assert!(matches!(err, IngestError::Usage(_)));
    }

    #[test]
    fn test_list_input_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.json.gz", "a.json", "notes.txt", "c.jsonl"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let names: Vec<String> = list_input_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.json", "b.json.gz", "c.jsonl"]);
    }

    #[test]
    fn test_list_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = list_input_files(&dir.path().join("absent"));
        assert!(matches!(result, Err(IngestError::ListDir { .. })));
    }

    #[test]
    fn test_stats_add() {
        let mut total = IngestStats::default();
        let file = IngestStats {
            lines_processed: 3,
            records_written: 2,
            records_failed: 1,
            ..IngestStats::default()
        };
        total.add(&file);
        total.add(&file);
        assert_eq!(total.lines_processed, 6);
        assert_eq!(total.records_written, 4);
        assert_eq!(total.records_failed, 2);
    }
}
