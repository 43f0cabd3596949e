//! Command implementations for the `hcs-ingest` binary

use std::sync::Arc;
use tracing::info;

use crate::config::{DbSettings, IngestOptions};
use crate::coordinator::{Coordinator, IngestTarget, RunSummary};
use crate::db::{self, create_pool, server_info, ServerInfo};
use crate::error::IngestResult;
use crate::store::PgRecordStore;

/// Load `target` with `workers` concurrent writers
pub async fn ingest(
    settings: &DbSettings,
    target: &IngestTarget,
    workers: usize,
) -> IngestResult<RunSummary> {
    let pool = create_pool(settings).await?;
    let coordinator = Coordinator::new(
        Arc::new(PgRecordStore::new(pool.clone())),
        IngestOptions::with_workers(workers),
    );

    info!(
        workers = coordinator.options().workers,
        queue_capacity = coordinator.options().queue_capacity,
        "Starting ingestion"
    );

    let result = coordinator.run(target).await;
    pool.close().await;

    let summary = result?;
    info!(
        files_attempted = summary.batch.files_attempted,
        files_failed = summary.batch.files_failed,
        records_written = summary.batch.stats.records_written,
        elapsed_secs = summary.batch.elapsed.as_secs_f64(),
        "Data ingestion completed"
    );

    Ok(summary)
}

/// Connect, run a health query, and read back server details
pub async fn check_connection(settings: &DbSettings) -> IngestResult<ServerInfo> {
    info!(
        host = %settings.host,
        port = settings.port,
        user = %settings.user,
        database = %settings.database,
        "Testing database connection"
    );

    let pool = create_pool(settings).await?;
    let info = server_info(&pool).await;
    pool.close().await;

    let info = info?;
    info!(
        version = %info.version,
        current_database = %info.current_database,
        "Database connection successful"
    );

    Ok(info)
}

/// Create the configured database; `true` when it did not exist before
pub async fn create_database(settings: &DbSettings) -> IngestResult<bool> {
    info!(
        host = %settings.host,
        database = %settings.database,
        "Ensuring database exists"
    );

    Ok(db::create_database(settings).await?)
}
