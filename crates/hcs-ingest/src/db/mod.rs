//! Persistence gateway
//!
//! Pool construction, health checks, and the bootstrap helpers used by the
//! `check-connection` and `create-database` commands. The pool is created once
//! by the binary and passed explicitly to everything that needs it.

pub mod schema;

use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{DbSettings, MAINTENANCE_DB_NAME};

pub use schema::{ensure_schema, table_counts, TableCounts};

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Database configuration is invalid or missing
    #[error("Database configuration error: {0}. Check the DB_* environment variables.")]
    Config(String),
}

impl DbError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Server details reported by the connection check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: String,
    pub current_database: String,
}

/// Open the shared connection pool and verify it with one round trip
pub async fn create_pool(settings: &DbSettings) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(settings.max_lifetime_secs))
        .connect_with(settings.connect_options())
        .await?;

    health_check(&pool).await?;

    info!(
        host = %settings.host,
        database = %settings.database,
        max_connections = settings.max_connections,
        max_lifetime_secs = settings.max_lifetime_secs,
        "Database connection pool created"
    );

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> DbResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(DbError::from)
}

/// Server version and the database the pool is connected to
pub async fn server_info(pool: &PgPool) -> DbResult<ServerInfo> {
    let (version, current_database): (String, String) =
        sqlx::query_as("SELECT version(), current_database()")
            .fetch_one(pool)
            .await?;

    Ok(ServerInfo {
        version,
        current_database,
    })
}

/// Create the configured database if the server does not have it yet
///
/// Connects through the maintenance database, then reconnects to the target
/// to prove it is usable. Returns `true` when the database was created.
pub async fn create_database(settings: &DbSettings) -> DbResult<bool> {
    if settings.database.is_empty() {
        return Err(DbError::config("database name is empty"));
    }

    let mut conn =
        PgConnection::connect_with(&settings.connect_options_for(MAINTENANCE_DB_NAME)).await?;
    debug!(host = %settings.host, "Connected to maintenance database");

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&settings.database)
            .fetch_one(&mut conn)
            .await?;

    let created = if exists {
        info!(database = %settings.database, "Database already exists");
        false
    } else {
        // CREATE DATABASE cannot take bind parameters
        let statement = format!("CREATE DATABASE {}", quote_identifier(&settings.database));
        sqlx::raw_sql(&statement).execute(&mut conn).await?;
        info!(database = %settings.database, "Database created");
        true
    };

    conn.close().await?;

    let verify = PgConnection::connect_with(&settings.connect_options()).await?;
    verify.close().await?;
    info!(database = %settings.database, "Connected to target database");

    Ok(created)
}

/// Quote a PostgreSQL identifier, doubling embedded quotes
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("healthcare_saver"), "\"healthcare_saver\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_config_error_message() {
        let err = DbError::config("database name is empty");
        assert!(err.to_string().contains("DB_*"));
    }
}
