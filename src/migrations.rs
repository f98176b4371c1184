//! Embedded PostgreSQL schema migrations.
//!
//! Executed on startup unless disabled. Statements are idempotent so the
//! runner needs no version bookkeeping table.

use sqlx::postgres::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS allotment_configs (
        id UUID PRIMARY KEY,
        hotel_id UUID NOT NULL,
        room_type_id UUID NOT NULL,
        status TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        version BIGINT NOT NULL,
        document JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    // At most one active configuration per (hotel, room type).
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS allotment_configs_active_pair
    ON allotment_configs (hotel_id, room_type_id)
    WHERE status = 'active'
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS allotment_configs_hotel_created
    ON allotment_configs (hotel_id, created_at DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS allotment_configs_hotel_status
    ON allotment_configs (hotel_id, status)
    "#,
];

/// Apply all migrations to a PostgreSQL database.
pub async fn run_postgres(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
