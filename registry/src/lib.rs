//! The scanner registry (C2, §4.2): a 60s reconciliation loop that keeps
//! the scanner table in sync with observed cluster pods.
//!
//! Grounded on `db::scanners`'s optimistic-transition queries for every
//! mutation and on the teacher's `scaler` main-loop shape (load config,
//! build a service, loop on a fixed period) for the overall structure.

pub mod pods;

use std::collections::HashMap;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};

use vtscan_core::conf::Conf;
use vtscan_core::db;
use vtscan_core::k8s_client;
use vtscan_core::models::{ObservedPod, PodPhase, Scanner, ScannerStatus};
use vtscan_core::task_client::TaskClient;
use vtscan_core::utils::errors::Error;

pub struct Registry {
    conf: Conf,
    pool: PgPool,
    kube: kube::Client,
    task_client: TaskClient,
}

impl Registry {
    pub async fn new(conf: Conf) -> Result<Self, Error> {
        let pool = db::create_pool(&conf.database).await?;
        db::run_migrations(&pool).await?;
        let kube = k8s_client::build(&conf.k8s).await?;
        let http = reqwest::Client::new();
        let task_client = TaskClient::new(http, conf.task_manager.base_url());
        Ok(Registry { conf, pool, kube, task_client })
    }

    pub async fn run(&self) -> ! {
        let mut interval = tokio::time::interval(self.conf.registry.tick_period());
        loop {
            interval.tick().await;
            if let Err(err) = self.tick().await {
                warn!(error = %err, "registry tick failed");
            }
        }
    }

    async fn tick(&self) -> Result<(), Error> {
        let observed = pods::list(self.kube.clone(), &self.conf.k8s.scanner_namespace).await?;
        let by_name: HashMap<&str, &ObservedPod> =
            observed.iter().map(|p| (p.name.as_str(), p)).collect();

        let rows = db::scanners::list_non_terminal(&self.pool).await?;
        let known_names: std::collections::HashSet<&str> =
            rows.iter().map(|r| r.name.as_str()).collect();

        for row in &rows {
            if let Err(err) = self.reconcile_row(row, by_name.get(row.name.as_str()).copied()).await {
                warn!(scanner = %row.name, error = %err, "reconcile failed for scanner, will retry next tick");
            }
        }

        for pod in &observed {
            if pod.phase == PodPhase::Running && !known_names.contains(pod.name.as_str()) {
                match db::scanners::insert_from_pod(&self.pool, pod).await {
                    Ok(scanner) => info!(scanner = %scanner.name, "registered new scanner"),
                    Err(err) => warn!(pod = %pod.name, error = %err, "failed to register new scanner"),
                }
            }
        }
        Ok(())
    }

    /// Applies reconciliation rules 1-8 (§4.2) for one scanner row.
    async fn reconcile_row(&self, row: &Scanner, observed: Option<&ObservedPod>) -> Result<(), Error> {
        let Some(pod) = observed else {
            // Rule 1: no matching pod of the same name.
            if row.status != ScannerStatus::Deleting {
                warn!(scanner = %row.name, prior = %row.status, "unexpected scanner deletion");
            }
            db::scanners::set_status(&self.pool, row.id, ScannerStatus::Deleted).await?;
            return Ok(());
        };

        // Rule 8: already deleted but the pod is still present.
        if row.status == ScannerStatus::Deleted {
            pods::delete(self.kube.clone(), &self.conf.k8s.scanner_namespace, &pod.name).await?;
            return Ok(());
        }

        // Rule 7: exception budget exhausted.
        if row.exhausted() {
            db::scanners::set_status(&self.pool, row.id, ScannerStatus::Deleting).await?;
            return Ok(());
        }

        // Rule 2: identity drift.
        let identity = db::scanners::Identity {
            ip: pod.ip.as_deref().unwrap_or_default(),
            engine: &pod.engine,
            port: pod.port,
            filetype: &pod.filetype,
        };
        if !row.identity_matches(&identity) {
            db::scanners::set_status(&self.pool, row.id, ScannerStatus::Deleting).await?;
            return Ok(());
        }

        match pod.phase {
            // Rule 3.
            PodPhase::Failed | PodPhase::Succeeded => {
                db::scanners::set_status(&self.pool, row.id, ScannerStatus::Deleting).await?;
            }
            // Rule 4.
            PodPhase::Pending => {
                if row.status != ScannerStatus::Disable {
                    db::scanners::set_status(&self.pool, row.id, ScannerStatus::Deleting).await?;
                }
            }
            // Rule 5.
            PodPhase::Running => match row.status {
                ScannerStatus::Disable => {
                    db::scanners::set_status(&self.pool, row.id, ScannerStatus::Enable).await?;
                }
                ScannerStatus::Waiting => {
                    self.reconcile_waiting(row).await?;
                }
                _ => {}
            },
            PodPhase::Unknown => {}
        }
        Ok(())
    }

    /// Rule 6: a `waiting` scanner quiesces before it's eligible for
    /// `deleting`.
    async fn reconcile_waiting(&self, row: &Scanner) -> Result<(), Error> {
        let quiesced_since = Utc::now().signed_duration_since(row.updated_at);
        let quiesce = self.conf.registry.delete_wait();
        if quiesced_since.to_std().unwrap_or_default() < quiesce {
            return Ok(());
        }
        let zero_running = match self.task_client.get_running_task_num(&row.name).await {
            Ok(n) => n == 0,
            Err(err) => {
                warn!(scanner = %row.name, error = %err, "task service unreachable, skipping quiescence check");
                return Ok(());
            }
        };
        if zero_running {
            db::scanners::set_status(&self.pool, row.id, ScannerStatus::Deleting).await?;
        }
        Ok(())
    }
}
