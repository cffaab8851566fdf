//! The scheduler's small HTTP surface (§6 "Task-service endpoints"): the
//! three read-only queries C6 polls every autoscaler tick.
//!
//! Routing follows the teacher's `routes::basic` shape — plain
//! `Router<AppState>` with one handler per route, mounted from `main`.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use vtscan_core::db;
use vtscan_core::models::EngineKind;
use vtscan_core::utils::errors::Error;
use vtscan_core::utils::ids::ReqIdLayer;

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
}

pub fn router(pool: PgPool) -> Router {
    let state = AppState { pool };
    Router::new()
        .route("/list_engine_tasks_num", get(list_engine_tasks_num))
        .route("/list_running_tasks_num", get(list_running_tasks_num))
        .route("/get_running_task_num", get(get_running_task_num))
        .layer(ReqIdLayer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(pool: PgPool, bind_addr: &str) -> Result<(), Error> {
    let app = router(pool);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct EngineTaskCountOut {
    scanner_type: String,
    num: i64,
}

#[derive(Debug, Serialize)]
struct ListEngineTasksNum {
    type_num: usize,
    task_count: Vec<EngineTaskCountOut>,
}

async fn list_engine_tasks_num(State(state): State<AppState>) -> Result<Json<ListEngineTasksNum>, Error> {
    let counts = db::tasks::engine_task_counts(&state.pool).await?;
    let task_count: Vec<EngineTaskCountOut> = counts
        .into_iter()
        .map(|c| EngineTaskCountOut { scanner_type: c.engine.0, num: c.num })
        .collect();
    Ok(Json(ListEngineTasksNum { type_num: task_count.len(), task_count }))
}

#[derive(Debug, Deserialize)]
struct RunningTasksNumQuery {
    /// Comma-separated engine names to scope the count to.
    engines: String,
}

#[derive(Debug, Serialize)]
struct RunningTaskCountOut {
    scanner_id: Uuid,
    num: i64,
}

#[derive(Debug, Serialize)]
struct ListRunningTasksNum {
    scanner_num: usize,
    task_count: Vec<RunningTaskCountOut>,
}

async fn list_running_tasks_num(
    State(state): State<AppState>,
    Query(query): Query<RunningTasksNumQuery>,
) -> Result<Json<ListRunningTasksNum>, Error> {
    let engines: Vec<EngineKind> = query
        .engines
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| EngineKind(s.to_string()))
        .collect();

    let mut scanner_ids = Vec::new();
    for engine in &engines {
        let scanners = db::scanners::list_enable_for_engine(&state.pool, engine).await?;
        scanner_ids.extend(scanners.into_iter().map(|s| s.id));
    }

    let counts = db::tasks::scanner_task_counts(&state.pool, &scanner_ids).await?;
    let task_count: Vec<RunningTaskCountOut> = counts
        .into_iter()
        .map(|c| RunningTaskCountOut { scanner_id: c.scanner_id, num: c.num })
        .collect();
    Ok(Json(ListRunningTasksNum { scanner_num: task_count.len(), task_count }))
}

#[derive(Debug, Deserialize)]
struct RunningTaskNumQuery {
    scanner_name: String,
}

#[derive(Debug, Serialize)]
struct GetRunningTaskNum {
    running_task_num: i64,
}

async fn get_running_task_num(
    State(state): State<AppState>,
    Query(query): Query<RunningTaskNumQuery>,
) -> Result<Json<GetRunningTaskNum>, Error> {
    let scanner = db::scanners::get_by_name(&state.pool, &query.scanner_name)
        .await?
        .ok_or_else(|| vtscan_core::not_found!(format!("no scanner named {}", query.scanner_name)))?;
    let running_task_num = db::tasks::running_task_num(&state.pool, scanner.id).await?;
    Ok(Json(GetRunningTaskNum { running_task_num }))
}
