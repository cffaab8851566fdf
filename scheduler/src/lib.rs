//! The task scheduler (C5, §4.5): a 60s loop, trace then dispatch.
//!
//! Grounded on `gator-db`'s optimistic-lock transition pattern for every
//! mutation and on the teacher's `scaler` main-loop shape (load args,
//! build a config-driven service, loop on a fixed period) for the overall
//! binary structure.

pub mod server;

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use vtscan_core::adapter::{self, AdapterStatus, CreateError};
use vtscan_core::conf::Conf;
use vtscan_core::db;
use vtscan_core::models::{EngineKind, ScannerCapacity, ScannerStatus, Task};
use vtscan_core::utils::errors::Error;

pub struct Scheduler {
    conf: Conf,
    pool: PgPool,
    http: reqwest::Client,
}

impl Scheduler {
    pub async fn new(conf: Conf) -> Result<Self, Error> {
        let pool = db::create_pool(&conf.database).await?;
        db::run_migrations(&pool).await?;
        Ok(Scheduler {
            conf,
            pool,
            http: reqwest::Client::new(),
        })
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub async fn run(&self) -> ! {
        let mut interval = tokio::time::interval(self.conf.scheduler.tick_period());
        loop {
            interval.tick().await;
            if let Err(err) = self.tick().await {
                warn!(error = %err, "scheduler tick failed");
            }
        }
    }

    async fn tick(&self) -> Result<(), Error> {
        self.trace().await?;
        self.dispatch().await?;
        Ok(())
    }

    /// §4.5.1: observe every `running` task and react to its adapter
    /// status. Trace always completes before dispatch begins, so a task
    /// that becomes `done` this tick is never re-dispatched in the same
    /// tick (§5 ordering guarantee).
    async fn trace(&self) -> Result<(), Error> {
        let except_cap = self.conf.scheduler.except_cap;
        for task in db::tasks::list_running(&self.pool).await? {
            if let Err(err) = self.trace_one(&task, except_cap).await {
                warn!(task = %task.id, error = %err, "trace failed for task, will retry next tick");
            }
        }
        Ok(())
    }

    async fn trace_one(&self, task: &Task, except_cap: i32) -> Result<(), Error> {
        let Some(scanner_id) = task.scanner_id else {
            return Err(crate::bad_row(task.id));
        };
        let scanner = db::scanners::get(&self.pool, scanner_id).await?;
        if scanner.status == ScannerStatus::Deleted {
            db::tasks::reload(&self.pool, task.id).await?;
            return Ok(());
        }
        let Some(running_id) = task.running_id.as_deref() else {
            return Err(crate::bad_row(task.id));
        };

        let scanner_adapter = adapter::build(
            &scanner,
            self.http.clone(),
            self.pool.clone(),
            &self.conf.host_scan.partition_hosts,
        );
        match scanner_adapter.status(running_id).await {
            Ok(AdapterStatus::Error) => {
                db::scanners::increment_except_num(&self.pool, scanner.id).await?;
                db::tasks::reload(&self.pool, task.id).await?;
            }
            Ok(AdapterStatus::Failed(msg)) => {
                db::tasks::mark_failed(&self.pool, task.id, &msg).await?;
            }
            Ok(AdapterStatus::Done) => match scanner_adapter.report(running_id).await {
                Ok(content) => {
                    let report = db::reports::insert(&self.pool, task.id, content).await?;
                    db::tasks::mark_done(&self.pool, task.id, report.id).await?;
                    db::scanners::reset_except_num(&self.pool, scanner.id).await?;
                }
                Err(err) => {
                    warn!(task = %task.id, error = %err, "report fetch failed, treating as transient");
                    self.bump_except(task, except_cap).await?;
                }
            },
            Ok(AdapterStatus::Running) => {
                db::tasks::reset_except_num(&self.pool, task.id).await?;
                db::scanners::reset_except_num(&self.pool, scanner.id).await?;
            }
            Err(err) => {
                warn!(task = %task.id, error = %err, "adapter status call failed");
                self.bump_except(task, except_cap).await?;
            }
        }
        Ok(())
    }

    async fn bump_except(&self, task: &Task, except_cap: i32) -> Result<(), Error> {
        db::tasks::increment_except_num(&self.pool, task.id).await?;
        if let Some(scanner_id) = task.scanner_id {
            db::scanners::increment_except_num(&self.pool, scanner_id).await?;
        }
        if task.except_num + 1 >= except_cap {
            db::tasks::reload(&self.pool, task.id).await?;
        }
        Ok(())
    }

    /// §4.5.2: place queued tasks onto scanners with free capacity.
    async fn dispatch(&self) -> Result<(), Error> {
        let scanners = db::scanners::list_non_terminal(&self.pool).await?;
        let engines: Vec<EngineKind> = scanners
            .iter()
            .filter(|s| s.status == ScannerStatus::Enable)
            .map(|s| s.engine.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();

        for engine in engines {
            self.dispatch_engine(&engine).await?;
        }
        Ok(())
    }

    async fn dispatch_engine(&self, engine: &EngineKind) -> Result<(), Error> {
        let scanners = db::scanners::list_enable_for_engine(&self.pool, engine).await?;
        if scanners.is_empty() {
            return Ok(());
        }
        let scanner_ids: Vec<Uuid> = scanners.iter().map(|s| s.id).collect();
        let running_counts: HashMap<Uuid, i64> = db::tasks::scanner_task_counts(&self.pool, &scanner_ids)
            .await?
            .into_iter()
            .map(|row| (row.scanner_id, row.num))
            .collect();

        let scanner_by_id: HashMap<Uuid, _> = scanners.iter().map(|s| (s.id, s.clone())).collect();
        let mut capacities: HashMap<Uuid, ScannerCapacity> = scanners
            .iter()
            .map(|s| {
                let running = running_counts.get(&s.id).copied().unwrap_or(0);
                let free = (s.max_concurrency as i64 - running).max(0) as i32;
                (s.id, ScannerCapacity { scanner_id: s.id, free, total: s.max_concurrency })
            })
            .collect();

        let free_total: i64 = capacities.values().map(|c| c.free as i64).sum();
        if free_total <= 0 {
            return Ok(());
        }
        let queued = db::tasks::list_queued_for_engine(&self.pool, engine, free_total).await?;

        for task in queued {
            let mut candidates: Vec<ScannerCapacity> =
                capacities.values().filter(|c| c.free > 0).copied().collect();
            candidates.sort_by(|a, b| b.slack_ratio().partial_cmp(&a.slack_ratio()).unwrap_or(std::cmp::Ordering::Equal));
            if candidates.is_empty() {
                break;
            }

            for candidate in candidates {
                let scanner = &scanner_by_id[&candidate.scanner_id];
                let scanner_adapter = adapter::build(
                    scanner,
                    self.http.clone(),
                    self.pool.clone(),
                    &self.conf.host_scan.partition_hosts,
                );
                match scanner_adapter.create(&task.target, task.id).await {
                    Ok(running_id) => {
                        let assigned =
                            db::tasks::assign(&self.pool, task.id, scanner.id, &running_id).await?;
                        if assigned {
                            db::scanners::reset_except_num(&self.pool, scanner.id).await?;
                            if let Some(cap) = capacities.get_mut(&scanner.id) {
                                cap.free -= 1;
                            }
                            info!(task = %task.id, scanner = %scanner.name, "dispatched");
                        }
                        break;
                    }
                    Err(CreateError::EngineBusy) | Err(CreateError::Transient(_)) => {
                        db::scanners::increment_except_num(&self.pool, scanner.id).await?;
                        if let Some(cap) = capacities.get_mut(&scanner.id) {
                            cap.free = 0;
                        }
                        continue;
                    }
                    Err(CreateError::InvalidTarget(msg)) => {
                        db::tasks::mark_failed(&self.pool, task.id, &msg).await?;
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

fn bad_row(task_id: Uuid) -> Error {
    vtscan_core::internal_err!(format!(
        "task {task_id} is running without a scanner_id/running_id"
    ))
}
