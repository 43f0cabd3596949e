//! Record persistence
//!
//! [`RecordStore`] is the seam between the pipeline and the database. Each
//! worker asks the store for its own [`RecordWriter`], which owns the prepared
//! statements for the two inserts and writes one record per transaction.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgStatement};
use sqlx::{Executor, Row, Statement};
use tracing::debug;

use crate::db::{self, DbResult, TableCounts};
use crate::error::WriteError;
use crate::models::InsuranceService;

const INSERT_SERVICE_SQL: &str = r#"
    INSERT INTO insurance_services (
        negotiation_arrangement, name, billing_code_type,
        billing_code_type_version, billing_code, description
    )
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING id
"#;

// Each parameter keeps the type of the Rust value bound to it. Conversion to
// the column type happens in the statement, so a bad date fails only its record.
const INSERT_RATE_SQL: &str = r#"
    INSERT INTO negotiated_rates (
        service_id, provider_references, negotiated_type, negotiated_rate,
        expiration_date, service_codes, billing_class
    )
    VALUES ($1, $2::text::json, $3, $4::float8::numeric, $5::text::date, $6::text::json, $7)
"#;

/// Destination for decoded records
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    type Writer: RecordWriter;

    /// Create the tables if they do not exist
    async fn ensure_schema(&self) -> DbResult<()>;

    /// A writer for one worker; failure here stops that worker
    async fn writer(&self) -> DbResult<Self::Writer>;

    async fn table_counts(&self) -> DbResult<TableCounts>;
}

/// Writes whole records atomically
#[async_trait]
pub trait RecordWriter: Send + 'static {
    /// Persist one record and all of its rate rows, or nothing
    ///
    /// Returns the number of rate rows written.
    async fn write(&mut self, service: &InsuranceService) -> Result<usize, WriteError>;
}

/// PostgreSQL-backed store sharing one pool across workers
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    type Writer = PgRecordWriter;

    async fn ensure_schema(&self) -> DbResult<()> {
        db::ensure_schema(&self.pool).await
    }

    async fn writer(&self) -> DbResult<PgRecordWriter> {
        let insert_service = self.pool.prepare(INSERT_SERVICE_SQL).await?;
        let insert_rate = self.pool.prepare(INSERT_RATE_SQL).await?;
        debug!("Prepared insert statements");

        Ok(PgRecordWriter {
            pool: self.pool.clone(),
            insert_service,
            insert_rate,
        })
    }

    async fn table_counts(&self) -> DbResult<TableCounts> {
        db::table_counts(&self.pool).await
    }
}

/// Per-worker writer holding its own prepared statements
#[derive(Debug)]
pub struct PgRecordWriter {
    pool: PgPool,
    insert_service: PgStatement<'static>,
    insert_rate: PgStatement<'static>,
}

#[async_trait]
impl RecordWriter for PgRecordWriter {
    async fn write(&mut self, service: &InsuranceService) -> Result<usize, WriteError> {
        // Dropping `tx` without commit rolls the record back
        let mut tx = self.pool.begin().await.map_err(WriteError::Begin)?;

        let row = self
            .insert_service
            .query()
            .bind(&service.negotiation_arrangement)
            .bind(&service.name)
            .bind(&service.billing_code_type)
            .bind(&service.billing_code_type_version)
            .bind(&service.billing_code)
            .bind(service.description.as_deref())
            .fetch_one(&mut *tx)
            .await
            .map_err(WriteError::InsertService)?;
        let service_id: i64 = row.try_get("id").map_err(WriteError::InsertService)?;

        let mut rows = 0;
        for rate in &service.negotiated_rates {
            let provider_references = serde_json::to_string(&rate.provider_references)
                .map_err(|source| WriteError::Serialize {
                    field: "provider_references",
                    source,
                })?;

            for price in &rate.negotiated_prices {
                let service_codes = serde_json::to_string(&price.service_codes).map_err(
                    |source| WriteError::Serialize {
                        field: "service_code",
                        source,
                    },
                )?;

                self.insert_rate
                    .query()
                    .bind(service_id)
                    .bind(&provider_references)
                    .bind(&price.negotiated_type)
                    .bind(price.negotiated_rate)
                    .bind(&price.expiration_date)
                    .bind(&service_codes)
                    .bind(&price.billing_class)
                    .execute(&mut *tx)
                    .await
                    .map_err(WriteError::InsertRate)?;
                rows += 1;
            }
        }

        tx.commit().await.map_err(WriteError::Commit)?;
        Ok(rows)
    }
}
