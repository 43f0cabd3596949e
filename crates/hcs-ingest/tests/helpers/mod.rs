//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use hcs_ingest::db::{DbError, DbResult, TableCounts};
use hcs_ingest::error::WriteError;
use hcs_ingest::store::{RecordStore, RecordWriter};
use hcs_ingest::InsuranceService;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const OFFICE_VISIT: &str = r#"{"negotiation_arrangement":"ffs","name":"Office Visit","billing_code_type":"CPT","billing_code_type_version":"2024","billing_code":"99213","description":"Established patient office visit","negotiated_rates":[{"provider_references":[101,102],"negotiated_prices":[{"negotiated_type":"negotiated","negotiated_rate":125.50,"expiration_date":"2025-12-31","service_code":["11","22"],"billing_class":"professional"}]}]}"#;

/// A record line with `prices` rate rows split over two rate groups
pub fn service_line(name: &str, prices: usize) -> String {
    let price = r#"{"negotiated_type":"negotiated","negotiated_rate":80.0,"expiration_date":"2025-06-30","service_code":["11"],"billing_class":"institutional"}"#;
    let first: Vec<&str> = (0..prices / 2).map(|_| price).collect();
    let second: Vec<&str> = (0..prices - prices / 2).map(|_| price).collect();

    format!(
        r#"{{"negotiation_arrangement":"ffs","name":"{}","billing_code_type":"CPT","billing_code_type_version":"2024","billing_code":"70450","negotiated_rates":[{{"provider_references":[1],"negotiated_prices":[{}]}},{{"provider_references":[2,3],"negotiated_prices":[{}]}}]}}"#,
        name,
        first.join(","),
        second.join(",")
    )
}

/// A JSON array line holding one record per name
pub fn array_line(names: &[&str]) -> String {
    let records: Vec<String> = names.iter().map(|name| service_line(name, 1)).collect();
    format!("[{}]", records.join(","))
}

pub fn write_plain(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

pub fn write_gzip(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(lines.join("\n").as_bytes()).unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

/// In-memory store recording every committed record
#[derive(Default)]
pub struct MemoryStore {
    committed: Arc<Mutex<Vec<InsuranceService>>>,
    /// Records with these names fail to write
    failing_records: Arc<HashSet<String>>,
    /// Number of `writer()` calls that fail before the rest succeed
    failing_writers: AtomicUsize,
    schema_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_records(names: &[&str]) -> Self {
        Self {
            failing_records: Arc::new(names.iter().map(|n| n.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_failing_writers(count: usize) -> Self {
        Self {
            failing_writers: AtomicUsize::new(count),
            ..Self::default()
        }
    }

    pub fn committed_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .committed
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    type Writer = MemoryWriter;

    async fn ensure_schema(&self) -> DbResult<()> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn writer(&self) -> DbResult<MemoryWriter> {
        let fail = self
            .failing_writers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(DbError::config("statement preparation failed"));
        }

        Ok(MemoryWriter {
            committed: Arc::clone(&self.committed),
            failing_records: Arc::clone(&self.failing_records),
        })
    }

    async fn table_counts(&self) -> DbResult<TableCounts> {
        let committed = self.committed.lock().unwrap();
        Ok(TableCounts {
            services: committed.len() as i64,
            negotiated_rates: committed.iter().map(|s| s.price_count() as i64).sum(),
        })
    }
}

pub struct MemoryWriter {
    committed: Arc<Mutex<Vec<InsuranceService>>>,
    failing_records: Arc<HashSet<String>>,
}

#[async_trait]
impl RecordWriter for MemoryWriter {
    async fn write(&mut self, service: &InsuranceService) -> Result<usize, WriteError> {
        if self.failing_records.contains(&service.name) {
            return Err(WriteError::InsertRate(sqlx::Error::Protocol(
                "new row violates check constraint".to_string(),
            )));
        }

        self.committed.lock().unwrap().push(service.clone());
        Ok(service.price_count())
    }
}
