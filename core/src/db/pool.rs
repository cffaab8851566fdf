//! Connection pool setup and migrations, following the same runtime
//! `Migrator` approach `gator-db` uses so no database is required at
//! compile time.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::conf::Database;
use crate::utils::errors::Error;

pub async fn create_pool(conf: &Database) -> Result<PgPool, Error> {
    PgPoolOptions::new()
        .max_connections(conf.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&conf.url)
        .await
        .map_err(Error::from)
}

/// Run the migrations embedded in this crate's `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), Error> {
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/migrations"
    )))
    .await
    .map_err(|e| crate::internal_err!(format!("failed to load migrations: {e}")))?;
    migrator
        .run(pool)
        .await
        .map_err(|e| crate::internal_err!(format!("failed to run migrations: {e}")))?;
    Ok(())
}
