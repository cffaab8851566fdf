//! Task-table queries backing the scheduler (C5) and the counts C6 reads
//! over HTTP (§6 task-service endpoints).
//!
//! State transitions use the same optimistic-lock `UPDATE ... WHERE
//! status = $from` pattern `gator-db`'s `transition_task_status` uses: a
//! transition only applies if the row is still in the state the caller
//! observed, so two concurrent reconcilers can never double-apply one.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{EngineKind, EngineTaskCount, ScannerTaskCount, Task, TaskRequest};
use crate::utils::errors::Error;

pub async fn insert_task(pool: &PgPool, req: &TaskRequest) -> Result<Task, Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query_as::<_, Task>(
        r#"INSERT INTO task
            (id, name, target, engine, priority, status, created_at, updated_at,
             except_num, parallel, owner_id, remark)
           VALUES ($1, $2, $3, $4, $5, 'queued', $6, $6, 0, $7, $8, $9)
           RETURNING *"#,
    )
    .bind(id)
    .bind(&req.name)
    .bind(&req.target)
    .bind(&req.engine)
    .bind(req.priority)
    .bind(now)
    .bind(req.parallel)
    .bind(req.owner_id)
    .bind(&req.remark)
    .fetch_one(pool)
    .await
    .map_err(Error::from)
}

pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<Task, Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM task WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Error::from)
}

/// All tasks in `running` status, the trace phase's input set (§4.5.1).
pub async fn list_running(pool: &PgPool) -> Result<Vec<Task>, Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM task WHERE status = 'running'")
        .fetch_all(pool)
        .await
        .map_err(Error::from)
}

/// Queued tasks of one engine, ordered `priority DESC, created_at ASC`
/// (§4.5.2 step 3, invariant 6), capped at `limit` (the engine's free
/// capacity for this tick).
pub async fn list_queued_for_engine(
    pool: &PgPool,
    engine: &EngineKind,
    limit: i64,
) -> Result<Vec<Task>, Error> {
    sqlx::query_as::<_, Task>(
        r#"SELECT * FROM task
           WHERE status = 'queued' AND engine = $1
           ORDER BY priority DESC, created_at ASC
           LIMIT $2"#,
    )
    .bind(engine)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}

/// Reset a `running` task to `queued`, clearing scanner/external-id
/// linkage (the "reload" path, §4.5.1, §GLOSSARY). Idempotent: a second
/// call against an already-reloaded row is a harmless no-op.
pub async fn reload(pool: &PgPool, id: Uuid) -> Result<(), Error> {
    sqlx::query(
        r#"UPDATE task
           SET status = 'queued', scanner_id = NULL, running_id = NULL,
               except_num = 0, updated_at = $2
           WHERE id = $1 AND status = 'running'"#,
    )
    .bind(id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(Error::from)?;
    Ok(())
}

/// `queued -> running` on successful dispatch (§3 lifecycle). Returns
/// `false` if the row was no longer `queued` (another tick raced us).
pub async fn assign(
    pool: &PgPool,
    id: Uuid,
    scanner_id: Uuid,
    running_id: &str,
) -> Result<bool, Error> {
    let result = sqlx::query(
        r#"UPDATE task
           SET status = 'running', scanner_id = $2, running_id = $3, updated_at = $4
           WHERE id = $1 AND status = 'queued'"#,
    )
    .bind(id)
    .bind(scanner_id)
    .bind(running_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(Error::from)?;
    Ok(result.rows_affected() == 1)
}

/// `running -> done`, linking the freshly-stored report (§3 invariant
/// "status=done ⇒ a report row exists and is linked").
pub async fn mark_done(pool: &PgPool, id: Uuid, report_id: Uuid) -> Result<(), Error> {
    sqlx::query(
        r#"UPDATE task
           SET status = 'done', report_id = $2, finished_at = $3,
               except_num = 0, updated_at = $3
           WHERE id = $1 AND status = 'running'"#,
    )
    .bind(id)
    .bind(report_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(Error::from)?;
    Ok(())
}

/// `running -> failed` on an engine-signalled failure (§3, §4.5.1).
pub async fn mark_failed(pool: &PgPool, id: Uuid, errmsg: &str) -> Result<(), Error> {
    sqlx::query(
        r#"UPDATE task
           SET status = 'failed', errmsg = $2, finished_at = $3,
               except_num = 0, updated_at = $3
           WHERE id = $1 AND status = 'running'"#,
    )
    .bind(id)
    .bind(errmsg)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(Error::from)?;
    Ok(())
}

pub async fn increment_except_num(pool: &PgPool, id: Uuid) -> Result<(), Error> {
    sqlx::query("UPDATE task SET except_num = except_num + 1, updated_at = $2 WHERE id = $1")
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Reset both the task's and (via `db::scanners::reset_except_num`) its
/// scanner's exception counters on a clean `running` observation (§4.5.1:
/// "running ⇒ reset both counters").
pub async fn reset_except_num(pool: &PgPool, id: Uuid) -> Result<(), Error> {
    sqlx::query("UPDATE task SET except_num = 0, updated_at = $2 WHERE id = $1")
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Per-engine count of tasks in `queued ∪ running`
/// (`GET /list_engine_tasks_num`, §6).
pub async fn engine_task_counts(pool: &PgPool) -> Result<Vec<EngineTaskCount>, Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"SELECT engine, COUNT(*) FROM task
           WHERE status IN ('queued', 'running')
           GROUP BY engine"#,
    )
    .fetch_all(pool)
    .await
    .map_err(Error::from)?;
    Ok(rows
        .into_iter()
        .map(|(engine, num)| EngineTaskCount {
            engine: EngineKind(engine),
            num,
        })
        .collect())
}

/// Per-scanner running-task count (`GET /list_running_tasks_num`, §6).
pub async fn scanner_task_counts(
    pool: &PgPool,
    scanner_ids: &[Uuid],
) -> Result<Vec<ScannerTaskCount>, Error> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        r#"SELECT scanner_id, COUNT(*) FROM task
           WHERE status = 'running' AND scanner_id = ANY($1)
           GROUP BY scanner_id"#,
    )
    .bind(scanner_ids)
    .fetch_all(pool)
    .await
    .map_err(Error::from)?;
    Ok(rows
        .into_iter()
        .map(|(scanner_id, num)| ScannerTaskCount { scanner_id, num })
        .collect())
}

/// Running-task count for one scanner (`GET /get_running_task_num`, §6).
pub async fn running_task_num(pool: &PgPool, scanner_id: Uuid) -> Result<i64, Error> {
    let (num,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM task WHERE status = 'running' AND scanner_id = $1")
            .bind(scanner_id)
            .fetch_one(pool)
            .await
            .map_err(Error::from)?;
    Ok(num)
}

/// Whether a scanner has zero running tasks, needed by C2 rule 6 (the
/// `waiting -> deleting` quiescence check).
pub async fn has_zero_running(pool: &PgPool, scanner_id: Uuid) -> Result<bool, Error> {
    Ok(running_task_num(pool, scanner_id).await? == 0)
}

