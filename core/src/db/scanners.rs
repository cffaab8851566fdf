//! Scanner-table queries backing the registry (C2) and the autoscaler
//! (C6). Status transitions use the optimistic `WHERE status = $from`
//! pattern described in `db::tasks`.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{EngineKind, ObservedPod, Scanner, ScannerStatus};
use crate::utils::errors::Error;

pub async fn get_by_name(pool: &PgPool, name: &str) -> Result<Option<Scanner>, Error> {
    sqlx::query_as::<_, Scanner>("SELECT * FROM scanner WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(Error::from)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Scanner, Error> {
    sqlx::query_as::<_, Scanner>("SELECT * FROM scanner WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Error::from)
}

/// Every row that isn't `deleted` — the registry's per-tick working set
/// (§4.2).
pub async fn list_non_terminal(pool: &PgPool) -> Result<Vec<Scanner>, Error> {
    sqlx::query_as::<_, Scanner>("SELECT * FROM scanner WHERE status != 'deleted'")
        .fetch_all(pool)
        .await
        .map_err(Error::from)
}

/// `enable` scanners of the given engine, used by dispatch to compute free
/// capacity (§4.5.2 step 1).
pub async fn list_enable_for_engine(
    pool: &PgPool,
    engine: &EngineKind,
) -> Result<Vec<Scanner>, Error> {
    sqlx::query_as::<_, Scanner>("SELECT * FROM scanner WHERE status = 'enable' AND engine = $1")
        .bind(engine)
        .fetch_all(pool)
        .await
        .map_err(Error::from)
}

/// Scanners in the statuses C6 cares about: `enable`, `disable`, `waiting`
/// (§4.6 inputs).
pub async fn list_for_autoscaler(pool: &PgPool) -> Result<Vec<Scanner>, Error> {
    sqlx::query_as::<_, Scanner>(
        "SELECT * FROM scanner WHERE status IN ('enable', 'disable', 'waiting')",
    )
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}

/// Insert a freshly-observed `Running` pod as a new `enable` row
/// (§4.2: "For every pod observed Running whose name does not appear in
/// the table, insert a new scanner row").
pub async fn insert_from_pod(pool: &PgPool, pod: &ObservedPod) -> Result<Scanner, Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query_as::<_, Scanner>(
        r#"INSERT INTO scanner
            (id, name, engine, family, node_name, ip, port, filetype, status,
             max_concurrency, except_num, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'enable', $9, 0, $10, $10)
           RETURNING *"#,
    )
    .bind(id)
    .bind(&pod.name)
    .bind(&pod.engine)
    .bind(pod.family)
    .bind(pod.node_name.as_deref().unwrap_or_default())
    .bind(pod.ip.as_deref().unwrap_or_default())
    .bind(pod.port)
    .bind(&pod.filetype)
    .bind(pod.max_concurrency)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(Error::from)
}

/// Unconditional status transition (used for edges §4.2 names as always
/// valid from any live status: e.g. identity drift -> `deleting`).
pub async fn set_status(pool: &PgPool, id: Uuid, status: ScannerStatus) -> Result<(), Error> {
    sqlx::query("UPDATE scanner SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .execute(pool)
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Guarded status transition: only applies if the row is still in `from`.
/// Used wherever a reconciler must not clobber a concurrent mutation (e.g.
/// C6 setting `waiting` while C2 is mid-tick).
pub async fn transition_status(
    pool: &PgPool,
    id: Uuid,
    from: ScannerStatus,
    to: ScannerStatus,
) -> Result<bool, Error> {
    let result = sqlx::query("UPDATE scanner SET status = $2, updated_at = $4 WHERE id = $1 AND status = $3")
        .bind(id)
        .bind(to)
        .bind(from)
        .bind(Utc::now())
        .execute(pool)
        .await
        .map_err(Error::from)?;
    Ok(result.rows_affected() == 1)
}

pub async fn increment_except_num(pool: &PgPool, id: Uuid) -> Result<(), Error> {
    sqlx::query("UPDATE scanner SET except_num = except_num + 1, updated_at = $2 WHERE id = $1")
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .map_err(Error::from)?;
    Ok(())
}

pub async fn reset_except_num(pool: &PgPool, id: Uuid) -> Result<(), Error> {
    sqlx::query("UPDATE scanner SET except_num = 0, updated_at = $2 WHERE id = $1")
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Decrement `max_concurrency` by `n`, never below zero (invariant 2:
/// "No scanner row has max_concurrency < 0"). Returns the new value.
pub async fn decrement_max_concurrency(pool: &PgPool, id: Uuid, n: i32) -> Result<i32, Error> {
    let (max_concurrency,): (i32,) = sqlx::query_as(
        r#"UPDATE scanner
           SET max_concurrency = GREATEST(max_concurrency - $2, 0), updated_at = $3
           WHERE id = $1
           RETURNING max_concurrency"#,
    )
    .bind(id)
    .bind(n)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Error::from)?;
    Ok(max_concurrency)
}

pub async fn increment_max_concurrency(pool: &PgPool, id: Uuid, n: i32) -> Result<i32, Error> {
    let (max_concurrency,): (i32,) = sqlx::query_as(
        r#"UPDATE scanner
           SET max_concurrency = max_concurrency + $2, updated_at = $3
           WHERE id = $1
           RETURNING max_concurrency"#,
    )
    .bind(id)
    .bind(n)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Error::from)?;
    Ok(max_concurrency)
}

/// Identity columns compared against a fresh pod observation (§4.2 rule 2).
pub struct Identity<'a> {
    pub ip: &'a str,
    pub engine: &'a EngineKind,
    pub port: i32,
    pub filetype: &'a str,
}

impl Scanner {
    pub fn identity_matches(&self, observed: &Identity<'_>) -> bool {
        self.ip == observed.ip
            && &self.engine == observed.engine
            && self.port == observed.port
            && self.filetype == observed.filetype
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::ScanFamily;

    fn row() -> Scanner {
        Scanner {
            id: Uuid::nil(),
            name: "s1".into(),
            engine: EngineKind("network-scan".into()),
            family: ScanFamily::HostScan,
            node_name: "node-1".into(),
            ip: "10.0.0.1".into(),
            port: 9390,
            filetype: "HTML".into(),
            status: ScannerStatus::Enable,
            max_concurrency: 4,
            except_num: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn identity_matches_requires_every_field_equal() {
        let current = row();
        let engine = current.engine.clone();
        let same = Identity { ip: "10.0.0.1", engine: &engine, port: 9390, filetype: "HTML" };
        assert!(current.identity_matches(&same));

        let drifted_port = Identity { ip: "10.0.0.1", engine: &engine, port: 9391, filetype: "HTML" };
        assert!(!current.identity_matches(&drifted_port));

        let drifted_ip = Identity { ip: "10.0.0.2", engine: &engine, port: 9390, filetype: "HTML" };
        assert!(!current.identity_matches(&drifted_ip));

        let other_engine = EngineKind("web-scan".into());
        let drifted_engine = Identity { ip: "10.0.0.1", engine: &other_engine, port: 9390, filetype: "HTML" };
        assert!(!current.identity_matches(&drifted_engine));
    }
}
