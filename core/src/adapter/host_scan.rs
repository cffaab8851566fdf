//! The host/network-scan adapter. Supports the split/merge sub-scan
//! fan-out named in §4.1 and §9: a single logical task can be spread
//! across several backend scanner hosts by configuring family-partitioned
//! scan profiles. Child running ids live in the `subscan` side table
//! (`db::subscans`); the facade never exposes them.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::adapter::{http, AdapterStatus, CreateError, EngineAdapter};
use crate::db::subscans;
use crate::models::ReportContent;
use crate::utils::errors::Error;

pub struct HostScanAdapter {
    base_url: String,
    http: reqwest::Client,
    pool: sqlx::PgPool,
    /// Additional backend hosts to fan this task out across. Empty means
    /// this scanner handles the whole task itself (the common case).
    partition_hosts: Vec<String>,
}

impl HostScanAdapter {
    pub fn new(base_url: String, http: reqwest::Client, pool: sqlx::PgPool) -> Self {
        HostScanAdapter {
            base_url,
            http,
            pool,
            partition_hosts: Vec::new(),
        }
    }

    /// Configure additional backend hosts to split this task across.
    pub fn with_partitions(mut self, hosts: Vec<String>) -> Self {
        self.partition_hosts = hosts;
        self
    }

    fn all_hosts(&self) -> Vec<&str> {
        std::iter::once(self.base_url.as_str())
            .chain(self.partition_hosts.iter().map(String::as_str))
            .collect()
    }
}

#[async_trait]
impl EngineAdapter for HostScanAdapter {
    async fn create(&self, target: &str, task_id: Uuid) -> Result<String, CreateError> {
        if self.partition_hosts.is_empty() {
            // No fan-out: the pod's own running id is the facade id.
            return http::create_task(&self.http, &self.base_url, target, task_id).await;
        }

        let parent_running_id = Uuid::new_v4().to_string();
        for host in self.all_hosts() {
            let child_running_id = http::create_task(&self.http, host, target, task_id).await?;
            subscans::insert_child(&self.pool, &parent_running_id, host, &child_running_id)
                .await
                .map_err(CreateError::from)?;
        }
        Ok(parent_running_id)
    }

    async fn status(&self, running_id: &str) -> Result<AdapterStatus, Error> {
        let children = subscans::children_of(&self.pool, running_id).await?;
        if children.is_empty() {
            return http::get_task(&self.http, &self.base_url, running_id).await;
        }

        let mut failed_msg: Option<String> = None;
        let mut any_error = false;
        let mut all_done = true;
        for child in &children {
            match http::get_task(&self.http, &child.scanner_host, &child.child_running_id).await? {
                AdapterStatus::Failed(msg) => {
                    failed_msg.get_or_insert(msg);
                }
                AdapterStatus::Error => any_error = true,
                AdapterStatus::Running => all_done = false,
                AdapterStatus::Done => {}
            }
        }
        // Facade status is "max progress": failed wins over everything
        // (terminal), done only once every child is done, error otherwise.
        if let Some(msg) = failed_msg {
            Ok(AdapterStatus::Failed(msg))
        } else if all_done {
            Ok(AdapterStatus::Done)
        } else if any_error {
            Ok(AdapterStatus::Error)
        } else {
            Ok(AdapterStatus::Running)
        }
    }

    async fn report(&self, running_id: &str) -> Result<ReportContent, Error> {
        let children = subscans::children_of(&self.pool, running_id).await?;
        if children.is_empty() {
            let bytes = http::get_report(&self.http, &self.base_url, running_id).await?;
            return Ok(http::as_report_content(bytes, "application/json", "host-scan-report.json"));
        }

        let mut merged: Vec<Value> = Vec::new();
        let mut seen_keys = std::collections::HashSet::new();
        for child in &children {
            let bytes = http::get_report(&self.http, &child.scanner_host, &child.child_running_id).await?;
            let parsed: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Array(Vec::new()));
            let Value::Array(findings) = parsed else { continue };
            for finding in findings {
                let key = finding_key(&finding);
                // Dedup by finding OID (fallback: finding name), keeping
                // the first occurrence (§9).
                if seen_keys.insert(key) {
                    merged.push(finding);
                }
            }
        }
        let content = serde_json::to_vec(&Value::Array(merged))?;
        Ok(http::as_report_content(content, "application/json", "host-scan-report.json"))
    }

    async fn stop(&self, running_id: &str) -> Result<(), Error> {
        let children = subscans::children_of(&self.pool, running_id).await?;
        if children.is_empty() {
            return http::delete_task(&self.http, &self.base_url, running_id).await;
        }
        for child in &children {
            http::delete_task(&self.http, &child.scanner_host, &child.child_running_id).await?;
        }
        Ok(())
    }

    async fn delete(&self, running_id: &str) -> Result<(), Error> {
        self.stop(running_id).await
    }

    async fn scale_in(&self, n: u32) -> Result<(), Error> {
        http::scale_in_with_num(&self.http, &self.base_url, n).await
    }

    async fn healthz(&self) -> Result<(), Error> {
        http::healthz(&self.http, &self.base_url).await
    }
}

fn finding_key(finding: &Value) -> String {
    finding
        .get("oid")
        .and_then(Value::as_str)
        .or_else(|| finding.get("name").and_then(Value::as_str))
        .unwrap_or("")
        .to_string()
}
