//! The sub-scan fan-out side table (§6, §9): a parent running-id maps to
//! several child running-ids on distinct backend scanner hosts. Used only
//! by the host-scan engine adapter to present its split/merge facade.

use sqlx::PgPool;

use crate::utils::errors::Error;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscanChild {
    pub parent_running_id: String,
    pub scanner_host: String,
    pub child_running_id: String,
}

pub async fn insert_child(
    pool: &PgPool,
    parent_running_id: &str,
    scanner_host: &str,
    child_running_id: &str,
) -> Result<(), Error> {
    sqlx::query(
        r#"INSERT INTO subscan (parent_running_id, scanner_host, child_running_id)
           VALUES ($1, $2, $3)
           ON CONFLICT (parent_running_id, scanner_host) DO UPDATE SET child_running_id = $3"#,
    )
    .bind(parent_running_id)
    .bind(scanner_host)
    .bind(child_running_id)
    .execute(pool)
    .await
    .map_err(Error::from)?;
    Ok(())
}

pub async fn children_of(pool: &PgPool, parent_running_id: &str) -> Result<Vec<SubscanChild>, Error> {
    sqlx::query_as::<_, SubscanChild>(
        "SELECT * FROM subscan WHERE parent_running_id = $1 ORDER BY scanner_host",
    )
    .bind(parent_running_id)
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}
