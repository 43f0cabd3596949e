//! Table bootstrap and row counts
//!
//! The two-table layout is a fixed contract. `ensure_schema` only ever runs
//! `IF NOT EXISTS` DDL; there are no migrations.

use sqlx::PgPool;
use tracing::info;

use super::DbResult;

/// Statements run in order by [`ensure_schema`]
///
/// Array columns use `JSON` rather than `JSONB` so the stored text is exactly
/// what the writer serialized.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS insurance_services (
        id BIGSERIAL PRIMARY KEY,
        negotiation_arrangement VARCHAR(50) NOT NULL,
        name VARCHAR(500) NOT NULL,
        billing_code_type VARCHAR(20) NOT NULL,
        billing_code_type_version VARCHAR(20) NOT NULL,
        billing_code VARCHAR(50) NOT NULL,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_insurance_services_billing_code ON insurance_services (billing_code)",
    "CREATE INDEX IF NOT EXISTS idx_insurance_services_name ON insurance_services (name)",
    "CREATE INDEX IF NOT EXISTS idx_insurance_services_arrangement ON insurance_services (negotiation_arrangement)",
    r#"
    CREATE TABLE IF NOT EXISTS negotiated_rates (
        id BIGSERIAL PRIMARY KEY,
        service_id BIGINT NOT NULL REFERENCES insurance_services (id) ON DELETE CASCADE,
        provider_references JSON NOT NULL,
        negotiated_type VARCHAR(20) NOT NULL
            CHECK (negotiated_type IN ('percentage', 'negotiated')),
        negotiated_rate NUMERIC(15, 2) NOT NULL,
        expiration_date DATE NOT NULL,
        service_codes JSON NOT NULL,
        billing_class VARCHAR(20) NOT NULL
            CHECK (billing_class IN ('professional', 'institutional')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_negotiated_rates_service_id ON negotiated_rates (service_id)",
    "CREATE INDEX IF NOT EXISTS idx_negotiated_rates_type ON negotiated_rates (negotiated_type)",
    "CREATE INDEX IF NOT EXISTS idx_negotiated_rates_billing_class ON negotiated_rates (billing_class)",
    "CREATE INDEX IF NOT EXISTS idx_negotiated_rates_expiration ON negotiated_rates (expiration_date)",
];

/// Row totals for both tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub services: i64,
    pub negotiated_rates: i64,
}

/// Create both tables and their indexes if missing
pub async fn ensure_schema(pool: &PgPool) -> DbResult<()> {
    info!("Creating database tables");

    for statement in SCHEMA_STATEMENTS {
        sqlx::raw_sql(*statement).execute(pool).await?;
    }

    info!("Database tables ready");
    Ok(())
}

pub async fn table_counts(pool: &PgPool) -> DbResult<TableCounts> {
    let (services, negotiated_rates): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM insurance_services), (SELECT COUNT(*) FROM negotiated_rates)",
    )
    .fetch_one(pool)
    .await?;

    Ok(TableCounts {
        services,
        negotiated_rates,
    })
}
