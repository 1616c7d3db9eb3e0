//! Database migration management.
//!
//! Migrations are embedded at compile time from the `migrations/` directory
//! and applied in filename order on startup.

use sqlx::PgPool;

use crate::error::DbError;

/// Run all pending database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(DbError::MigrationFailed)?;

    tracing::info!("migrations completed");
    Ok(())
}
