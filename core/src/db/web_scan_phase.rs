//! Persisted web-scan phase-chain state (§4.1, GLOSSARY). Keyed by the
//! stable facade running id; `engine_running_id` is whatever the pod
//! assigned to the current phase.

use chrono::Utc;
use sqlx::PgPool;

use crate::utils::errors::Error;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebScanPhaseRow {
    pub facade_running_id: String,
    pub target: String,
    pub phase: String,
    pub engine_running_id: String,
}

pub async fn insert(
    pool: &PgPool,
    facade_running_id: &str,
    target: &str,
    phase: &str,
    engine_running_id: &str,
) -> Result<(), Error> {
    sqlx::query(
        r#"INSERT INTO web_scan_phase (facade_running_id, target, phase, engine_running_id, updated_at)
           VALUES ($1, $2, $3, $4, $5)
           ON CONFLICT (facade_running_id) DO UPDATE
               SET phase = $3, engine_running_id = $4, updated_at = $5"#,
    )
    .bind(facade_running_id)
    .bind(target)
    .bind(phase)
    .bind(engine_running_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(Error::from)?;
    Ok(())
}

pub async fn get(pool: &PgPool, facade_running_id: &str) -> Result<Option<WebScanPhaseRow>, Error> {
    sqlx::query_as::<_, WebScanPhaseRow>(
        "SELECT * FROM web_scan_phase WHERE facade_running_id = $1",
    )
    .bind(facade_running_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

pub async fn advance_phase(
    pool: &PgPool,
    facade_running_id: &str,
    phase: &str,
    engine_running_id: &str,
) -> Result<(), Error> {
    sqlx::query(
        r#"UPDATE web_scan_phase
           SET phase = $2, engine_running_id = $3, updated_at = $4
           WHERE facade_running_id = $1"#,
    )
    .bind(facade_running_id)
    .bind(phase)
    .bind(engine_running_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(Error::from)?;
    Ok(())
}

pub async fn delete(pool: &PgPool, facade_running_id: &str) -> Result<(), Error> {
    sqlx::query("DELETE FROM web_scan_phase WHERE facade_running_id = $1")
        .bind(facade_running_id)
        .execute(pool)
        .await
        .map_err(Error::from)?;
    Ok(())
}
