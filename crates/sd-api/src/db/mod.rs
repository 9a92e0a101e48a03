//! Postgres storage backends

pub mod repository;
pub mod schema;
pub mod usage;

pub use repository::PgRepository;
pub use usage::PgUsageBackend;

use crate::AppConfig;
use sd_core::CoreError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Connect to Postgres and run pending migrations
pub async fn connect(config: &AppConfig, database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await?;
    info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations complete");

    Ok(pool)
}

pub(crate) fn storage(err: sqlx::Error) -> CoreError {
    CoreError::Storage(err.to_string())
}
