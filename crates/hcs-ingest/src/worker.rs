//! Persistence workers
//!
//! Each worker takes a writer from the store, then pulls records until the
//! queue is closed and drained. A failed record is rolled back, logged, and
//! skipped. A worker that cannot get a writer stops on its own; the rest keep
//! going.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::distributor::RecordReceiver;
use crate::store::{RecordStore, RecordWriter};

/// What one worker did before it exited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub records_written: usize,
    pub records_failed: usize,
    pub rate_rows_written: usize,
    /// The worker exited before the queue was drained
    pub stopped_early: bool,
}

/// Run one worker to completion
pub async fn run_worker<S: RecordStore>(
    worker: usize,
    store: Arc<S>,
    queue: RecordReceiver,
) -> WorkerReport {
    let mut report = WorkerReport {
        worker,
        ..WorkerReport::default()
    };

    let mut writer = match store.writer().await {
        Ok(writer) => writer,
        Err(e) => {
            error!(worker, error = %e, "Failed to prepare statements, worker stopping");
            report.stopped_early = true;
            return report;
        },
    };
    debug!(worker, "Worker started");

    while let Some(service) = queue.pull().await {
        match writer.write(&service).await {
            Ok(rows) => {
                report.records_written += 1;
                report.rate_rows_written += rows;
            },
            Err(e) => {
                report.records_failed += 1;
                warn!(
                    worker,
                    record = %service.name,
                    billing_code = %service.billing_code,
                    error = %e,
                    "Failed to insert record, rolled back"
                );
            },
        }
    }

    info!(
        worker,
        written = report.records_written,
        failed = report.records_failed,
        "Worker finished"
    );

    report
}
