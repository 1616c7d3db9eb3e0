//! Connection pool bootstrap.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Pool sizing and timeout knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(15),
        }
    }
}

/// Connect to Postgres and verify the connection with a ping.
pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await
        .map_err(DbError::ConnectionFailed)?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(DbError::ConnectionFailed)?;

    Ok(pool)
}
