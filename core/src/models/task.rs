//! The unit of work dispatched to scanner instances.
//!
//! Mirrors the scheduler's authoritative row in the `task` table. See
//! `db::tasks` for the queries that read and mutate it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::engine::EngineKind;

/// Where a task sits in its lifecycle.
///
/// `running -> queued` (reload) is the only backwards edge and happens only
/// through the scheduler's trace phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A scan request, from submission through to a terminal state.
///
/// Invariants (enforced by the queries in `db::tasks`, not by this type
/// alone): `status == Running` implies `scanner_id` and `running_id` are
/// both set; `status` in `{Done, Failed}` implies `finished_at` is set and
/// later than `created_at`; a terminal task is never re-dispatched;
/// `status == Done` implies a linked report exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub target: String,
    pub engine: EngineKind,
    /// Higher dispatches first.
    pub priority: i32,
    pub status: TaskStatus,
    pub scanner_id: Option<Uuid>,
    /// The id the engine assigned this task on `create`.
    pub running_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub errmsg: Option<String>,
    pub report_id: Option<Uuid>,
    /// Consecutive-exception counter; reaching 5 forces a reload.
    pub except_num: i32,
    /// Requested scanner concurrency slots (default 1).
    pub parallel: i32,
    pub owner_id: Uuid,
    pub remark: Option<String>,
}

/// The fields needed to queue a new task. Everything else is
/// server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub name: String,
    pub target: String,
    pub engine: EngineKind,
    pub priority: i32,
    pub parallel: i32,
    pub owner_id: Uuid,
    pub remark: Option<String>,
}

/// Per-engine count of tasks in `queued ∪ running`, as surfaced by
/// `GET /list_engine_tasks_num` for the autoscaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineTaskCount {
    pub engine: EngineKind,
    pub num: i64,
}

/// Per-scanner running-task count, as surfaced by
/// `GET /list_running_tasks_num` for the autoscaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerTaskCount {
    pub scanner_id: Uuid,
    pub num: i64,
}
