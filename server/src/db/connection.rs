/*

To establish and maintain the Postgres connection pool.

$ Connection Pool Management
- Create the pool from the configured URL.
- Bound the pool size and acquire timeout.

$ Migration Management
- Apply `migrations/` on start-up, before the listener binds.

*/

use std::{str::FromStr, time::Duration};

use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid database url: {0}")]
    InvalidUrl(#[source] sqlx::Error),

    #[error("could not connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, ConnectionError> {
    let options = PgConnectOptions::from_str(database_url)
        .map_err(ConnectionError::InvalidUrl)?
        .application_name("vivaha-server");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(ConnectionError::Connect)?;

    info!(max_connections, "Database pool ready");
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<(), ConnectionError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
