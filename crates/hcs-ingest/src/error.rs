//! Ingestion error types
//!
//! Each type matches one failure class: [`IngestError`] aborts the run or the
//! current file, [`StreamError`] aborts the current file, [`WriteError`] only
//! rolls back the record being written.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::db::DbError;

/// Result type alias for run-level operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Fatal errors from the stream source; they end the current file
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to read line {line}: {source}")]
    Read { line: usize, source: io::Error },

    #[error("Failed to decompress gzip stream near line {line}: {source}")]
    Decompress { line: usize, source: io::Error },

    #[error("Line {line} exceeds the maximum line length of {limit} bytes")]
    LineTooLong { line: usize, limit: usize },
}

/// Per-record persistence failures; the record is rolled back and skipped
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to serialize {field}: {source}")]
    Serialize {
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("Failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("Failed to insert service: {0}")]
    InsertService(#[source] sqlx::Error),

    #[error("Failed to insert rate: {0}")]
    InsertRate(#[source] sqlx::Error),

    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),
}

/// Run-level and file-level errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] hcs_common::HcsError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("No workers left to accept records from {}", .path.display())]
    QueueClosed { path: PathBuf },

    #[error("Ingestion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to list directory {}: {source}", .path.display())]
    ListDir { path: PathBuf, source: io::Error },

    #[error("{0}")]
    Usage(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_messages() {
        let err = StreamError::LineTooLong {
            line: 7,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Line 7 exceeds the maximum line length of 1024 bytes"
        );

        let err = StreamError::Open {
            path: PathBuf::from("/data/missing.json"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/data/missing.json"));
    }

    #[test]
    fn test_stream_error_converts_into_ingest_error() {
        let err: IngestError = StreamError::LineTooLong { line: 1, limit: 1 }.into();
        assert!(matches!(err, IngestError::Stream(_)));
    }

    #[test]
    fn test_write_error_keeps_source() {
        use std::error::Error as _;

        let err = WriteError::InsertRate(sqlx::Error::RowNotFound);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("Failed to insert rate"));
    }
}
