//! The engine adapter (C1): a uniform capability set over heterogeneous
//! scanner daemons.
//!
//! Modelled the way `gator-core`'s `Harness` trait models a uniform
//! capability set over heterogeneous coding-agent backends: one
//! `#[async_trait]`, object-safe so it can be stored as `Box<dyn
//! EngineAdapter>`, with a compile-time assertion of that object-safety.
//! No inheritance, no reflection (§9) — dispatch is a match on
//! [`crate::models::ScanFamily`] in [`build`].

mod host_scan;
mod http;
mod web_scan;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{ReportContent, Scanner};
use crate::utils::errors::Error;

pub use host_scan::HostScanAdapter;
pub use web_scan::WebScanAdapter;

/// The outcome of `status(running_id)` (§4.1, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterStatus {
    Running,
    Done,
    /// Terminal; carries the engine's own failure message (§4.5.1, §7).
    Failed(String),
    /// The engine self-reports internal trouble; not a terminal task
    /// outcome (§7).
    Error,
}

/// Why `create` failed (§4.1).
#[derive(Debug)]
pub enum CreateError {
    /// Connection/timeout-class failure; retried by the caller via the
    /// usual retry policy before being surfaced.
    Transient(Error),
    /// The engine rejected the target as unscannable.
    InvalidTarget(String),
    /// The engine has no free slot right now.
    EngineBusy,
}

impl From<Error> for CreateError {
    fn from(err: Error) -> Self {
        CreateError::Transient(err)
    }
}

impl std::fmt::Display for CreateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CreateError::Transient(err) => write!(f, "transient engine error: {err}"),
            CreateError::InvalidTarget(msg) => write!(f, "invalid target: {msg}"),
            CreateError::EngineBusy => write!(f, "engine busy"),
        }
    }
}

/// The capability set every scanner family implements. Facade calls only:
/// adapters hide whatever internal scan-state machine or sub-scan
/// fan-out their engine uses.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Start a new scan. Returns the engine-assigned running id.
    async fn create(&self, target: &str, task_id: Uuid) -> Result<String, CreateError>;

    /// One of `{running, done, failed, error}`.
    async fn status(&self, running_id: &str) -> Result<AdapterStatus, Error>;

    /// Only valid once `status` has observed `done`.
    async fn report(&self, running_id: &str) -> Result<ReportContent, Error>;

    /// Idempotent.
    async fn stop(&self, running_id: &str) -> Result<(), Error>;

    /// Idempotent.
    async fn delete(&self, running_id: &str) -> Result<(), Error>;

    /// The scanner stops `n` currently-running tasks; those tasks re-enter
    /// `queued` via the scheduler's reload path on the next trace (§4.1).
    async fn scale_in(&self, n: u32) -> Result<(), Error>;

    async fn healthz(&self) -> Result<(), Error>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn EngineAdapter) {}
};

/// Build the adapter for a scanner, dispatching on its family. The scanner
/// row carries everything an adapter needs to address its pod.
///
/// `partition_hosts` is the host-scan fan-out configuration (§9, §11,
/// `conf::HostScan`), keyed by engine name: when the scanner's engine has
/// an entry, its host-scan adapter fans each task out across those
/// additional backend hosts alongside its own.
pub fn build(
    scanner: &Scanner,
    http: reqwest::Client,
    pool: sqlx::PgPool,
    partition_hosts: &std::collections::HashMap<String, Vec<String>>,
) -> Box<dyn EngineAdapter> {
    let base_url = format!("http://{}:{}", scanner.ip, scanner.port);
    match scanner.family {
        crate::models::ScanFamily::HostScan => {
            let mut adapter = HostScanAdapter::new(base_url, http, pool);
            if let Some(hosts) = partition_hosts.get(scanner.engine.as_str()) {
                adapter = adapter.with_partitions(hosts.clone());
            }
            Box::new(adapter)
        }
        crate::models::ScanFamily::WebScan => {
            Box::new(WebScanAdapter::new(base_url, http, pool))
        }
    }
}
