//! The resource autoscaler (C6, §4.6): a 30s loop with four phases —
//! inputs, load-low scale-in, node-pressure scale-in, headroom scale-out —
//! each flushed to the database before the next begins.
//!
//! Grounded on the teacher's `scaler/src/libs/scaler.rs` loop shape (load
//! inputs, act, sleep) but built fresh against this system's cost model;
//! none of the teacher's k8s job-scheduling logic applies here.

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use vtscan_core::conf::Conf;
use vtscan_core::models::{EngineKind, NodeSnapshots, Scanner, ScannerStatus};
use vtscan_core::task_client::TaskClient;
use vtscan_core::utils::errors::Error;
use vtscan_core::{adapter, catalog, db, metrics};

pub struct Autoscaler {
    conf: Conf,
    pool: PgPool,
    kube: kube::Client,
    http: reqwest::Client,
    task_client: TaskClient,
}

/// A scanner's share of this tick's resource bookkeeping, kept in memory
/// so repeated phases see the previous phase's decisions without a
/// round-trip (§4.6.4: "sizes decided in 4.6.1 must be visible to 4.6.2").
#[derive(Clone)]
struct ScannerView {
    scanner: Scanner,
    running: i64,
}

impl Autoscaler {
    pub async fn new(conf: Conf) -> Result<Self, Error> {
        let pool = db::create_pool(&conf.database).await?;
        let kube = vtscan_core::k8s_client::build(&conf.k8s).await?;
        let http = reqwest::Client::new();
        let task_client = TaskClient::new(http.clone(), conf.task_manager.base_url());
        Ok(Autoscaler {
            conf,
            pool,
            kube,
            http,
            task_client,
        })
    }

    pub async fn run(&self) -> ! {
        let mut interval = tokio::time::interval(self.conf.autoscaler.tick_period());
        loop {
            interval.tick().await;
            if let Err(err) = self.tick().await {
                warn!(error = %err, "autoscaler tick failed");
            }
        }
    }

    async fn tick(&self) -> Result<(), Error> {
        // --- inputs ---
        let catalog = catalog::load(self.kube.clone(), &self.conf.k8s.scanner_namespace).await?;
        let scanners = db::scanners::list_for_autoscaler(&self.pool).await?;
        let engines: Vec<EngineKind> = scanners
            .iter()
            .map(|s| s.engine.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        let engine_loads: HashMap<EngineKind, i64> =
            self.task_client.list_engine_tasks_num().await?.into_iter().collect();
        let running_counts: HashMap<Uuid, i64> = self
            .task_client
            .list_running_tasks_num(&engines)
            .await?
            .into_iter()
            .collect();
        let node_snapshots = metrics::MetricsSource::new(
            self.http.clone(),
            self.conf.metrics.base_url(),
            self.kube.clone(),
        )
        .snapshot()
        .await?;

        let mut views: HashMap<Uuid, ScannerView> = scanners
            .into_iter()
            .map(|scanner| {
                let running = running_counts.get(&scanner.id).copied().unwrap_or(0);
                (scanner.id, ScannerView { scanner, running })
            })
            .collect();

        self.load_low_scale_in(&mut views, &engine_loads, &node_snapshots).await?;
        self.node_pressure_scale_in(&mut views, &catalog, &node_snapshots).await?;
        self.headroom_scale_out(&mut views, &catalog, &engine_loads, &node_snapshots)
            .await?;
        Ok(())
    }

    /// §4.6.1: shed virtual capacity from engines whose total assigned
    /// `max_concurrency` exceeds their actual load.
    async fn load_low_scale_in(
        &self,
        views: &mut HashMap<Uuid, ScannerView>,
        engine_loads: &HashMap<EngineKind, i64>,
        node_snapshots: &NodeSnapshots,
    ) -> Result<(), Error> {
        let watermarks = &self.conf.autoscaler.watermarks;
        let engines: Vec<EngineKind> = views
            .values()
            .filter(|v| v.scanner.status == ScannerStatus::Enable)
            .map(|v| v.scanner.engine.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();

        for engine in engines {
            let total_max: i64 = views
                .values()
                .filter(|v| v.scanner.status == ScannerStatus::Enable && v.scanner.engine == engine)
                .map(|v| v.scanner.max_concurrency as i64)
                .sum();
            let load = engine_loads.get(&engine).copied().unwrap_or(0);
            if total_max <= load {
                continue;
            }
            let mut deficit = total_max - load;

            let mut candidates: Vec<(f64, i64, Uuid)> = views
                .values()
                .filter(|v| {
                    v.scanner.status == ScannerStatus::Enable
                        && v.scanner.engine == engine
                        && v.running < v.scanner.max_concurrency as i64
                })
                .filter_map(|v| {
                    let snapshot = node_snapshots.get(&v.scanner.node_name)?;
                    let usage = snapshot.combined_usage(watermarks.cpu_weight, watermarks.memory_weight);
                    let slack = v.scanner.max_concurrency as i64 - v.running;
                    Some((usage, slack, v.scanner.id))
                })
                .collect();
            // Most-loaded node first, most-slack scanner there first.
            candidates.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

            for (_, slack, scanner_id) in candidates {
                if deficit <= 0 {
                    break;
                }
                let dec = slack.min(deficit) as i32;
                if dec <= 0 {
                    continue;
                }
                let new_max = db::scanners::decrement_max_concurrency(&self.pool, scanner_id, dec).await?;
                deficit -= dec as i64;
                if let Some(view) = views.get_mut(&scanner_id) {
                    view.scanner.max_concurrency = new_max;
                }
                if new_max == 0 {
                    db::scanners::transition_status(
                        &self.pool,
                        scanner_id,
                        ScannerStatus::Enable,
                        ScannerStatus::Waiting,
                    )
                    .await?;
                    if let Some(view) = views.get_mut(&scanner_id) {
                        view.scanner.status = ScannerStatus::Waiting;
                    }
                }
            }
        }
        Ok(())
    }

    /// §4.6.2: shed real capacity (`scale_in(1)`) from the top-ranked
    /// engine on any node whose expected usage exceeds its high watermark.
    async fn node_pressure_scale_in(
        &self,
        views: &mut HashMap<Uuid, ScannerView>,
        catalog: &HashMap<EngineKind, vtscan_core::models::ScalerRegistration>,
        node_snapshots: &NodeSnapshots,
    ) -> Result<(), Error> {
        let watermarks = &self.conf.autoscaler.watermarks;
        let nodes: Vec<String> = node_snapshots.keys().cloned().collect();

        for node in nodes {
            let Some(snapshot) = node_snapshots.get(&node) else { continue };
            let mut excluded: std::collections::HashSet<Uuid> = std::collections::HashSet::new();

            loop {
                let (expected_cpu, expected_memory) =
                    expected_usage(&node, views, catalog, snapshot);
                let cpu_ratio = ratio(expected_cpu, snapshot.cpu_total);
                let mem_ratio = ratio(expected_memory, snapshot.memory_total);
                if cpu_ratio < watermarks.cpu_hwl && mem_ratio < watermarks.memory_hwl {
                    break;
                }

                let ranked = rank_engines_on_node(&node, views, catalog, engine_totals(views), true);
                let Some((engine, _)) = ranked.into_iter().find(|(e, _)| {
                    views
                        .values()
                        .any(|v| v.scanner.node_name == node && &v.scanner.engine == e && !excluded.contains(&v.scanner.id))
                }) else {
                    break;
                };

                let Some(scanner_id) = views
                    .values()
                    .filter(|v| {
                        v.scanner.node_name == node
                            && v.scanner.engine == engine
                            && !excluded.contains(&v.scanner.id)
                            && v.scanner.max_concurrency > 0
                    })
                    .max_by_key(|v| v.scanner.max_concurrency)
                    .map(|v| v.scanner.id)
                else {
                    break;
                };

                let scanner = views[&scanner_id].scanner.clone();
                let adapter = adapter::build(
                    &scanner,
                    self.http.clone(),
                    self.pool.clone(),
                    &self.conf.host_scan.partition_hosts,
                );
                match adapter.scale_in(1).await {
                    Ok(()) => {
                        let new_max = db::scanners::decrement_max_concurrency(&self.pool, scanner_id, 1).await?;
                        if let Some(view) = views.get_mut(&scanner_id) {
                            view.scanner.max_concurrency = new_max;
                        }
                        info!(node, engine = %engine.0, scanner = %scanner.name, "scaled in under node pressure");
                    }
                    Err(err) => {
                        warn!(node, scanner = %scanner.name, error = %err, "scale_in failed, dropping candidate");
                        excluded.insert(scanner_id);
                    }
                }
            }
        }
        Ok(())
    }

    /// §4.6.3: grow the most-starved engine on any node with headroom below
    /// its low watermark, up to the apply-line.
    async fn headroom_scale_out(
        &self,
        views: &mut HashMap<Uuid, ScannerView>,
        catalog: &HashMap<EngineKind, vtscan_core::models::ScalerRegistration>,
        engine_loads: &HashMap<EngineKind, i64>,
        node_snapshots: &NodeSnapshots,
    ) -> Result<(), Error> {
        let watermarks = &self.conf.autoscaler.watermarks;
        let nodes: Vec<String> = node_snapshots.keys().cloned().collect();

        for node in nodes {
            let Some(snapshot) = node_snapshots.get(&node) else { continue };
            let (expected_cpu0, expected_memory0) = expected_usage(&node, views, catalog, snapshot);
            if ratio(expected_cpu0, snapshot.cpu_total) >= watermarks.cpu_lwl
                || ratio(expected_memory0, snapshot.memory_total) >= watermarks.memory_lwl
            {
                continue;
            }
            let cpu_apply = watermarks.cpu_apply_line() * snapshot.cpu_total;
            let memory_apply = watermarks.memory_apply_line() * snapshot.memory_total;

            loop {
                let (expected_cpu, expected_memory) = expected_usage(&node, views, catalog, snapshot);
                if expected_cpu >= cpu_apply || expected_memory >= memory_apply {
                    break;
                }
                let ranked = rank_engines_on_node(&node, views, catalog, engine_loads_totals(engine_loads), false);
                let Some((engine, reg)) = ranked
                    .into_iter()
                    .filter_map(|(e, _)| catalog.get(&e).map(|r| (e, r.clone())))
                    .find(|(e, reg)| {
                        reg.modes.supports_any() && {
                            let has_scanner_here = views.values().any(|v| {
                                v.scanner.node_name == node
                                    && &v.scanner.engine == e
                                    && v.scanner.status == ScannerStatus::Enable
                            });
                            let needs_pod = !has_scanner_here;
                            let extra_cpu = reg.cpu_cost + if needs_pod { reg.external_cpu_cost } else { 0.0 };
                            let extra_mem = reg.memory_cost + if needs_pod { reg.external_memory_cost } else { 0.0 };
                            expected_cpu + extra_cpu <= cpu_apply && expected_memory + extra_mem <= memory_apply
                        }
                    })
                else {
                    break;
                };

                let existing = views
                    .values()
                    .filter(|v| {
                        v.scanner.node_name == node
                            && v.scanner.engine == engine
                            && v.scanner.status == ScannerStatus::Enable
                    })
                    .min_by_key(|v| v.scanner.max_concurrency)
                    .map(|v| v.scanner.id);

                if reg.modes.vpa && existing.is_some() {
                    let scanner_id = existing.unwrap();
                    let new_max =
                        db::scanners::increment_max_concurrency(&self.pool, scanner_id, 1).await?;
                    if let Some(view) = views.get_mut(&scanner_id) {
                        view.scanner.max_concurrency = new_max;
                    }
                    info!(node, engine = %engine.0, "grew max_concurrency under headroom");
                } else if reg.modes.hpa {
                    match self.http.get(reg.scale_out_url(&node)).send().await {
                        Ok(resp) if resp.status().is_success() => {
                            info!(node, engine = %engine.0, "requested new pod under headroom");
                        }
                        Ok(resp) => {
                            warn!(node, engine = %engine.0, status = %resp.status(), "scale_out_with_node rejected");
                            break;
                        }
                        Err(err) => {
                            warn!(node, engine = %engine.0, error = %err, "scale_out_with_node unreachable");
                            break;
                        }
                    }
                    // The new pod only surfaces through the registry on a
                    // later tick, so there's nothing more to account for
                    // locally this tick; stop growing this node.
                    break;
                } else {
                    break;
                }
            }
        }
        Ok(())
    }
}

fn ratio(value: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 1.0;
    }
    value / total
}

/// `cpu_other + Σ_engines (external_cpu_cost + cpu_cost · Σ_scanners
/// max_concurrency)` (§4.6.2), and the memory analogue.
fn expected_usage(
    node: &str,
    views: &HashMap<Uuid, ScannerView>,
    catalog: &HashMap<EngineKind, vtscan_core::models::ScalerRegistration>,
    snapshot: &vtscan_core::models::NodeSnapshot,
) -> (f64, f64) {
    let mut cpu = snapshot.cpu_other();
    let mut memory = snapshot.memory_other();
    for (engine, reg) in catalog {
        let total_slots: i64 = views
            .values()
            .filter(|v| v.scanner.node_name == node && &v.scanner.engine == engine)
            .map(|v| v.scanner.max_concurrency as i64)
            .sum();
        if total_slots == 0 {
            continue;
        }
        cpu += reg.external_cpu_cost + reg.cpu_cost * total_slots as f64;
        memory += reg.external_memory_cost + reg.memory_cost * total_slots as f64;
    }
    (cpu, memory)
}

fn engine_totals(views: &HashMap<Uuid, ScannerView>) -> HashMap<EngineKind, i64> {
    let mut totals = HashMap::new();
    for view in views.values() {
        *totals.entry(view.scanner.engine.clone()).or_insert(0) += view.scanner.max_concurrency as i64;
    }
    totals
}

fn engine_loads_totals(engine_loads: &HashMap<EngineKind, i64>) -> HashMap<EngineKind, i64> {
    engine_loads.clone()
}

/// Rank engines present on `node` by `assigned_rate/expected_rate`: each
/// engine's share of the relevant cluster total, weighted by
/// `cpu_cost · time_cost` (a resource-weighted proxy for how expensive the
/// engine is to keep loaded). `descending=true` ranks highest first (for
/// shedding the most over-provisioned engine); `false` ranks lowest first
/// (for growing the most starved engine). See DESIGN.md — the spec leaves
/// the exact assigned/expected normalization as an open question; this is
/// a documented, deterministic resolution.
fn rank_engines_on_node(
    node: &str,
    views: &HashMap<Uuid, ScannerView>,
    catalog: &HashMap<EngineKind, vtscan_core::models::ScalerRegistration>,
    cluster_totals: HashMap<EngineKind, i64>,
    descending: bool,
) -> Vec<(EngineKind, f64)> {
    let cluster_sum: i64 = cluster_totals.values().sum::<i64>().max(1);
    let mut ranked: Vec<(EngineKind, f64)> = catalog
        .iter()
        .filter_map(|(engine, reg)| {
            let node_slots: i64 = views
                .values()
                .filter(|v| v.scanner.node_name == node && &v.scanner.engine == engine)
                .map(|v| v.scanner.max_concurrency as i64)
                .sum();
            let weight = reg.cpu_cost * reg.time_cost + reg.external_cpu_cost;
            let assigned_rate = weight * node_slots as f64;
            let expected_rate =
                weight * (*cluster_totals.get(engine).unwrap_or(&0)).max(1) as f64 / cluster_sum as f64;
            if expected_rate <= 0.0 {
                return None;
            }
            Some((engine.clone(), assigned_rate / expected_rate))
        })
        .collect();
    ranked.sort_by(|a, b| {
        if descending {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
    ranked
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use vtscan_core::models::{ScalingModes, ScanFamily};

    use super::*;

    fn view(node: &str, engine: &str, max_concurrency: i32) -> (Uuid, ScannerView) {
        let id = Uuid::new_v4();
        let scanner = Scanner {
            id,
            name: format!("{engine}-{node}"),
            engine: EngineKind(engine.into()),
            family: ScanFamily::HostScan,
            node_name: node.into(),
            ip: "10.0.0.1".into(),
            port: 9390,
            filetype: "HTML".into(),
            status: ScannerStatus::Enable,
            max_concurrency,
            except_num: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        (id, ScannerView { scanner, running: 0 })
    }

    fn registration(engine: &str, cpu_cost: f64, time_cost: f64) -> vtscan_core::models::ScalerRegistration {
        vtscan_core::models::ScalerRegistration {
            engine: EngineKind(engine.into()),
            modes: ScalingModes { vpa: true, hpa: true },
            cpu_cost,
            memory_cost: 0.0,
            time_cost,
            external_cpu_cost: 0.0,
            external_memory_cost: 0.0,
            host: "scaler".into(),
            port: 8080,
        }
    }

    #[test]
    fn ratio_treats_zero_total_as_fully_used() {
        assert_eq!(ratio(5.0, 0.0), 1.0);
        assert_eq!(ratio(2.0, 8.0), 0.25);
    }

    #[test]
    fn rank_engines_descending_puts_most_over_provisioned_first() {
        let (id_a, view_a) = view("node-1", "network-scan", 8);
        let (id_b, view_b) = view("node-1", "web-scan", 1);
        let views: HashMap<Uuid, ScannerView> = HashMap::from([(id_a, view_a), (id_b, view_b)]);

        let catalog = HashMap::from([
            (EngineKind("network-scan".into()), registration("network-scan", 1.0, 1.0)),
            (EngineKind("web-scan".into()), registration("web-scan", 1.0, 1.0)),
        ]);

        // Cluster-wide, network-scan and web-scan are evenly split, but on
        // this node network-scan holds 8 of the 9 slots.
        let cluster_totals = HashMap::from([
            (EngineKind("network-scan".into()), 10),
            (EngineKind("web-scan".into()), 10),
        ]);

        let ranked = rank_engines_on_node("node-1", &views, &catalog, cluster_totals, true);
        assert_eq!(ranked[0].0, EngineKind("network-scan".into()));
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn rank_engines_ascending_puts_most_starved_first() {
        let (id_a, view_a) = view("node-1", "network-scan", 8);
        let (id_b, view_b) = view("node-1", "web-scan", 1);
        let views: HashMap<Uuid, ScannerView> = HashMap::from([(id_a, view_a), (id_b, view_b)]);

        let catalog = HashMap::from([
            (EngineKind("network-scan".into()), registration("network-scan", 1.0, 1.0)),
            (EngineKind("web-scan".into()), registration("web-scan", 1.0, 1.0)),
        ]);
        let cluster_totals = HashMap::from([
            (EngineKind("network-scan".into()), 10),
            (EngineKind("web-scan".into()), 10),
        ]);

        let ranked = rank_engines_on_node("node-1", &views, &catalog, cluster_totals, false);
        assert_eq!(ranked[0].0, EngineKind("web-scan".into()));
    }
}
