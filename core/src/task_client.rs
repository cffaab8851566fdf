//! HTTP client for the task-service endpoints the scheduler (C5) exposes
//! and the autoscaler (C6) consumes each tick (§6).

use serde::Deserialize;

use crate::models::EngineKind;
use crate::utils::errors::Error;

#[derive(Debug, Deserialize)]
pub struct EngineTaskCountRow {
    pub scanner_type: String,
    pub num: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListEngineTasksNum {
    pub type_num: usize,
    pub task_count: Vec<EngineTaskCountRow>,
}

#[derive(Debug, Deserialize)]
pub struct RunningTaskCountRow {
    pub scanner_id: uuid::Uuid,
    pub num: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListRunningTasksNum {
    pub scanner_num: usize,
    pub task_count: Vec<RunningTaskCountRow>,
}

#[derive(Debug, Deserialize)]
pub struct GetRunningTaskNum {
    pub running_task_num: i64,
}

pub struct TaskClient {
    http: reqwest::Client,
    base_url: String,
}

impl TaskClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        TaskClient { http, base_url }
    }

    /// Per-engine count of tasks in `queued ∪ running` (§4.6 inputs).
    pub async fn list_engine_tasks_num(&self) -> Result<Vec<(EngineKind, i64)>, Error> {
        let resp: ListEngineTasksNum = self
            .http
            .get(format!("{}/list_engine_tasks_num", self.base_url))
            .send()
            .await?
            .json()
            .await?;
        Ok(resp
            .task_count
            .into_iter()
            .map(|row| (EngineKind(row.scanner_type), row.num))
            .collect())
    }

    /// Per-scanner running-task count, for scanners of the named engines.
    pub async fn list_running_tasks_num(
        &self,
        engines: &[EngineKind],
    ) -> Result<Vec<(uuid::Uuid, i64)>, Error> {
        let joined = engines
            .iter()
            .map(|e| e.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let resp: ListRunningTasksNum = self
            .http
            .get(format!("{}/list_running_tasks_num", self.base_url))
            .query(&[("engines", joined)])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp
            .task_count
            .into_iter()
            .map(|row| (row.scanner_id, row.num))
            .collect())
    }

    pub async fn get_running_task_num(&self, scanner_name: &str) -> Result<i64, Error> {
        let resp: GetRunningTaskNum = self
            .http
            .get(format!("{}/get_running_task_num", self.base_url))
            .query(&[("scanner_name", scanner_name)])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.running_task_num)
    }
}
