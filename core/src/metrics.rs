//! The cluster metrics source (C3, §4.3): a thin wrapper over a metrics
//! API plus node capacity from the cluster API, folded into one
//! [`crate::models::NodeSnapshots`] per autoscaler tick.
//!
//! Every query goes through [`crate::utils::helpers::with_retry`] with the
//! shared [`RetryPolicy`]; a query that exhausts its retries drops that
//! node from the snapshot rather than failing the tick (§4.3, §7) — this
//! mirrors how the adapter layer treats a lost `create` response as data
//! to reconcile next tick, not a crash.

use std::collections::HashMap;

use k8s_openapi::api::core::v1::Node;
use kube::api::Api;
use kube::Client;
use serde::Deserialize;
use tracing::warn;

use crate::models::{NodeSnapshot, NodeSnapshots, RetryPolicy};
use crate::utils::errors::Error;
use crate::utils::helpers::with_retry;

/// Thin client over the four read-only per-node queries named in §4.3,
/// plus node capacity (total CPU/memory) read from the cluster API —
/// the snapshot's `total` fields have no equivalent metrics-API query,
/// so they come from `Node.status.allocatable` instead.
pub struct MetricsSource {
    http: reqwest::Client,
    base_url: String,
    kube: Client,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct NodeValues {
    values: HashMap<String, f64>,
}

impl MetricsSource {
    pub fn new(http: reqwest::Client, base_url: String, kube: Client) -> Self {
        MetricsSource {
            http,
            base_url,
            kube,
            retry: RetryPolicy::default_external(),
        }
    }

    /// Collect one full node snapshot set. Nodes for which any of the four
    /// metrics queries never succeeds are omitted entirely rather than
    /// reported with partial/zeroed data.
    pub async fn snapshot(&self) -> Result<NodeSnapshots, Error> {
        let capacity = self.node_capacity().await?;
        let cpu_available = self.query("cpu_available").await.unwrap_or_default_logged("cpu_available");
        let memory_available = self.query("memory_available").await.unwrap_or_default_logged("memory_available");
        let cpu_used = self.query("namespace_cpu_used").await.unwrap_or_default_logged("namespace_cpu_used");
        let memory_used = self.query("namespace_memory_used").await.unwrap_or_default_logged("namespace_memory_used");

        let mut snapshots = NodeSnapshots::new();
        for (node_name, (cpu_total, memory_total)) in capacity {
            let (Some(&cpu_avail), Some(&mem_avail), Some(&cpu_ns), Some(&mem_ns)) = (
                cpu_available.get(&node_name),
                memory_available.get(&node_name),
                cpu_used.get(&node_name),
                memory_used.get(&node_name),
            ) else {
                warn!(node = %node_name, "metrics unavailable this tick, skipping node");
                continue;
            };
            snapshots.insert(
                node_name,
                NodeSnapshot {
                    cpu_total,
                    cpu_available: cpu_avail,
                    cpu_namespace_used: cpu_ns,
                    memory_total,
                    memory_available: mem_avail,
                    memory_namespace_used: mem_ns,
                },
            );
        }
        Ok(snapshots)
    }

    async fn query(&self, metric: &str) -> Result<HashMap<String, f64>, Error> {
        let url = format!("{}/query", self.base_url);
        with_retry(&self.retry, || async {
            let resp: NodeValues = self
                .http
                .get(&url)
                .query(&[("metric", metric)])
                .send()
                .await?
                .json()
                .await?;
            Ok(resp.values)
        })
        .await
    }

    async fn node_capacity(&self) -> Result<HashMap<String, (f64, f64)>, Error> {
        let api: Api<Node> = Api::all(self.kube.clone());
        let nodes = api.list(&Default::default()).await?;
        let mut capacity = HashMap::new();
        for node in nodes {
            let Some(name) = node.metadata.name.clone() else { continue };
            let Some(status) = &node.status else { continue };
            let Some(allocatable) = &status.allocatable else { continue };
            let cpu = allocatable.get("cpu").and_then(|q| parse_cpu(&q.0)).unwrap_or(0.0);
            let memory = allocatable
                .get("memory")
                .and_then(|q| parse_bytes(&q.0))
                .unwrap_or(0.0);
            capacity.insert(name, (cpu, memory));
        }
        Ok(capacity)
    }
}

/// Parse a k8s CPU quantity (cores, or millicores with an `m` suffix) into
/// a float core count.
fn parse_cpu(raw: &str) -> Option<f64> {
    if let Some(milli) = raw.strip_suffix('m') {
        milli.parse::<f64>().ok().map(|m| m / 1000.0)
    } else {
        raw.parse::<f64>().ok()
    }
}

/// Parse a k8s memory quantity (`Ki`/`Mi`/`Gi` or a bare byte count) into
/// a float byte count.
fn parse_bytes(raw: &str) -> Option<f64> {
    const UNITS: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1024.0f64.powi(2)),
        ("Gi", 1024.0f64.powi(3)),
        ("Ti", 1024.0f64.powi(4)),
        ("K", 1000.0),
        ("M", 1000.0f64.powi(2)),
        ("G", 1000.0f64.powi(3)),
    ];
    for (suffix, scale) in UNITS {
        if let Some(num) = raw.strip_suffix(suffix) {
            return num.parse::<f64>().ok().map(|n| n * scale);
        }
    }
    raw.parse::<f64>().ok()
}

/// Helper trait so a failed metrics query logs its metric name and degrades
/// to an empty map instead of failing the whole snapshot (§4.3).
trait LogDefault<T> {
    fn unwrap_or_default_logged(self, metric: &str) -> T;
}

impl LogDefault<HashMap<String, f64>> for Result<HashMap<String, f64>, Error> {
    fn unwrap_or_default_logged(self, metric: &str) -> HashMap<String, f64> {
        match self {
            Ok(values) => values,
            Err(err) => {
                warn!(metric, error = %err, "metrics query exhausted retries");
                HashMap::new()
            }
        }
    }
}
