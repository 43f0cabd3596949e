//! Configuration management
//!
//! Store settings come from the environment (a `.env` file is loaded by the
//! binary before this runs). Ingestion tuning lives in [`IngestOptions`].

use hcs_common::{HcsError, Result};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Store Defaults
// ============================================================================

/// Default database host.
pub const DEFAULT_DB_HOST: &str = "localhost";

/// Default PostgreSQL port.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database user.
pub const DEFAULT_DB_USER: &str = "postgres";

/// Default target database.
pub const DEFAULT_DB_NAME: &str = "healthcare_saver";

/// Maintenance database used when the target database may not exist yet.
pub const MAINTENANCE_DB_NAME: &str = "postgres";

/// Default cap on open connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 25;

/// Default number of connections kept open while idle.
pub const DEFAULT_MIN_CONNECTIONS: u32 = 0;

/// Default time to wait for a pooled connection, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds (5 minutes).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default connection lifetime in seconds (5 minutes).
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 300;

// ============================================================================
// Ingestion Defaults
// ============================================================================

/// Default number of persistence workers.
pub const DEFAULT_WORKERS: usize = 10;

/// Queue slots per worker.
pub const QUEUE_SLOTS_PER_WORKER: usize = 2;

/// Longest accepted input line (1 MiB).
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Progress is logged every this many processed lines.
pub const PROGRESS_INTERVAL_LINES: usize = 1000;

/// Connection settings for the relational store
#[derive(Clone)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl: bool,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl DbSettings {
    /// Load settings from the environment
    ///
    /// Environment variables:
    /// - `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_NAME`
    /// - `DB_PASSWORD` (required)
    /// - `DB_SSL`: "true" requires TLS
    /// - `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS`
    /// - `DB_CONNECT_TIMEOUT`, `DB_IDLE_TIMEOUT`, `DB_MAX_LIFETIME` (seconds)
    pub fn from_env() -> Result<Self> {
        let password = env_string("DB_PASSWORD", "");
        if password.is_empty() {
            return Err(HcsError::missing_var("DB_PASSWORD"));
        }

        let settings = Self {
            host: env_string("DB_HOST", DEFAULT_DB_HOST),
            port: env_parse("DB_PORT", DEFAULT_DB_PORT)?,
            user: env_string("DB_USER", DEFAULT_DB_USER),
            password,
            database: env_string("DB_NAME", DEFAULT_DB_NAME),
            ssl: env_string("DB_SSL", "false").eq_ignore_ascii_case("true"),
            max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            min_connections: env_parse("DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS)?,
            connect_timeout_secs: env_parse("DB_CONNECT_TIMEOUT", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            idle_timeout_secs: env_parse("DB_IDLE_TIMEOUT", DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: env_parse("DB_MAX_LIFETIME", DEFAULT_MAX_LIFETIME_SECS)?,
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(HcsError::config("Database host cannot be empty"));
        }

        if self.database.is_empty() {
            return Err(HcsError::config("Database name cannot be empty"));
        }

        if self.max_connections == 0 {
            return Err(HcsError::config("DB_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.min_connections > self.max_connections {
            return Err(HcsError::config(format!(
                "DB_MIN_CONNECTIONS ({}) cannot be greater than DB_MAX_CONNECTIONS ({})",
                self.min_connections, self.max_connections
            )));
        }

        Ok(())
    }

    /// Connection options for the configured database
    pub fn connect_options(&self) -> PgConnectOptions {
        self.connect_options_for(&self.database)
    }

    /// Connection options for another database on the same server
    pub fn connect_options_for(&self, database: &str) -> PgConnectOptions {
        let ssl_mode = if self.ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(database)
            .ssl_mode(ssl_mode)
    }
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("ssl", &self.ssl)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .finish()
    }
}

/// Tuning for one ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Number of concurrent persistence workers
    pub workers: usize,
    /// Bounded queue capacity between the reader and the workers
    pub queue_capacity: usize,
    /// Longest accepted line in bytes
    pub max_line_bytes: usize,
    /// Progress log interval in processed lines
    pub progress_interval: usize,
}

impl IngestOptions {
    /// Options for `workers` workers; zero is raised to one
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity: workers * QUEUE_SLOTS_PER_WORKER,
            max_line_bytes: MAX_LINE_BYTES,
            progress_interval: PROGRESS_INTERVAL_LINES,
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::with_workers(DEFAULT_WORKERS)
    }
}

/// Environment variable with a fallback for unset or empty values
fn env_string(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| HcsError::invalid_var(name, &raw)),
        _ => Ok(default),
    }
}
