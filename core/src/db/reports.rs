//! Report persistence. A report is created once, on `running -> done`
//! (§3), and owned by its task; nothing ever points from a report back
//! into the scanner table.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Report, ReportContent};
use crate::utils::errors::Error;

pub async fn insert(pool: &PgPool, task_id: Uuid, content: ReportContent) -> Result<Report, Error> {
    let id = Uuid::new_v4();
    sqlx::query_as::<_, Report>(
        r#"INSERT INTO report (id, task_id, mime_type, filename, size, content, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           RETURNING *"#,
    )
    .bind(id)
    .bind(task_id)
    .bind(&content.mime_type)
    .bind(&content.filename)
    .bind(content.content.len() as i64)
    .bind(&content.content)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Error::from)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Report, Error> {
    sqlx::query_as::<_, Report>("SELECT * FROM report WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Error::from)
}
