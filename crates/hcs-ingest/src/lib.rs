//! Healthcare Saver ingestion library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Streams newline-delimited pricing records (plain or gzip) into PostgreSQL.
//!
//! # Overview
//!
//! - **Stream source**: [`source::LineSource`] reads one line at a time
//! - **Line decoder**: [`decoder::decode_line`] turns a line into records
//! - **Work distributor**: [`distributor::work_queue`] bounds memory between reader and writers
//! - **Worker pool**: [`worker::run_worker`] writes one record per transaction
//! - **Run coordinator**: [`coordinator::Coordinator`] ties a run together
//!
//! # Example
//!
//! ```no_run
//! use hcs_ingest::config::{DbSettings, IngestOptions};
//! use hcs_ingest::coordinator::{Coordinator, IngestTarget};
//! use hcs_ingest::db::create_pool;
//! use hcs_ingest::store::PgRecordStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = DbSettings::from_env()?;
//!     let pool = create_pool(&settings).await?;
//!
//!     let coordinator = Coordinator::new(
//!         Arc::new(PgRecordStore::new(pool)),
//!         IngestOptions::with_workers(10),
//!     );
//!     coordinator
//!         .run(&IngestTarget::File("in-network-rates.json.gz".into()))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod decoder;
pub mod distributor;
pub mod error;
pub mod models;
pub mod source;
pub mod store;
pub mod worker;

// Re-export commonly used types
pub use error::{IngestError, IngestResult};
pub use models::{InsuranceService, NegotiatedPrice, NegotiatedRate};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_WORKERS;

/// Healthcare Saver - pricing data loader
#[derive(Parser, Debug)]
#[command(name = "hcs-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a file or a directory of files into the database
    Ingest {
        /// File to process (.json or .json.gz)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Directory to process (every *.json* file)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Number of concurrent database workers
        #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
    },

    /// Verify database connectivity and print server details
    CheckConnection,

    /// Create the configured database if it does not exist
    CreateDatabase,
}
