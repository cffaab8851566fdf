//! A scan result, persisted once on `running -> done`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: Uuid,
    pub task_id: Uuid,
    pub mime_type: String,
    pub filename: String,
    pub size: i64,
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// A report fetched from an engine adapter, before it has an id or a row.
#[derive(Debug, Clone)]
pub struct ReportContent {
    pub mime_type: String,
    pub filename: String,
    pub content: Vec<u8>,
}
