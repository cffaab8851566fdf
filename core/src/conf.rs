//! Configuration for every binary in the workspace, loaded from a YAML file
//! overlaid with environment variables (§6 "Environment configuration").
//!
//! Follows the same `config`-crate + serde-default idiom the control plane
//! this was distilled from uses for its own settings file: defaults live as
//! small free functions so a mostly-empty YAML file is still a complete,
//! sane configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use crate::utils::errors::Error;

/// The log level to run a binary at. Ordered from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{s}")
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Relational task/scanner store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Cluster-API settings shared by the scanner registry (C2) and the scaler
/// catalog (C4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct K8s {
    /// The kubeconfig context to use when not running in-cluster.
    #[serde(default = "default_context_name")]
    pub context_name: String,
    /// Namespace scanner pods live in (`SCANNER_NAMESPACE`).
    #[serde(default = "default_scanner_namespace")]
    pub scanner_namespace: String,
}

fn default_context_name() -> String {
    "kubernetes-admin@cluster.local".into()
}

fn default_scanner_namespace() -> String {
    "vtscan".into()
}

impl Default for K8s {
    fn default() -> Self {
        K8s {
            context_name: default_context_name(),
            scanner_namespace: default_scanner_namespace(),
        }
    }
}

/// Watermarks and weights used by the resource autoscaler (C6, §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Watermarks {
    #[serde(default = "default_cpu_hwl")]
    pub cpu_hwl: f64,
    #[serde(default = "default_cpu_lwl")]
    pub cpu_lwl: f64,
    #[serde(default = "default_memory_hwl")]
    pub memory_hwl: f64,
    #[serde(default = "default_memory_lwl")]
    pub memory_lwl: f64,
    #[serde(default = "default_cpu_weight")]
    pub cpu_weight: f64,
    #[serde(default = "default_memory_weight")]
    pub memory_weight: f64,
}

fn default_cpu_hwl() -> f64 {
    0.9
}
fn default_cpu_lwl() -> f64 {
    0.7
}
fn default_memory_hwl() -> f64 {
    0.9
}
fn default_memory_lwl() -> f64 {
    0.7
}
fn default_cpu_weight() -> f64 {
    0.5
}
fn default_memory_weight() -> f64 {
    0.5
}

impl Default for Watermarks {
    fn default() -> Self {
        Watermarks {
            cpu_hwl: default_cpu_hwl(),
            cpu_lwl: default_cpu_lwl(),
            memory_hwl: default_memory_hwl(),
            memory_lwl: default_memory_lwl(),
            cpu_weight: default_cpu_weight(),
            memory_weight: default_memory_weight(),
        }
    }
}

impl Watermarks {
    /// The midpoint target used when shedding load in §4.6.2.
    pub fn cpu_midpoint(&self) -> f64 {
        (self.cpu_hwl + self.cpu_lwl) / 2.0
    }

    pub fn memory_midpoint(&self) -> f64 {
        (self.memory_hwl + self.memory_lwl) / 2.0
    }

    /// The headroom apply-line target used when growing in §4.6.3: the
    /// midpoint between the low-mid point and the high watermark.
    pub fn cpu_apply_line(&self) -> f64 {
        (self.cpu_midpoint() + self.cpu_hwl) / 2.0
    }

    pub fn memory_apply_line(&self) -> f64 {
        (self.memory_midpoint() + self.memory_hwl) / 2.0
    }
}

/// A reachable service address, used for the task-manager/resource-manager
/// settings named in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAddr {
    pub host: String,
    pub port: u16,
}

impl ServiceAddr {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Registry (C2) reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default = "default_registry_tick_secs")]
    pub tick_secs: u64,
    /// `DELETE_WAIT_TIME`: quiescence a `waiting` scanner must sit in
    /// before it is eligible for `deleting` (§4.2 rule 6).
    #[serde(default = "default_delete_wait_secs")]
    pub delete_wait_secs: u64,
}

fn default_registry_tick_secs() -> u64 {
    60
}
fn default_delete_wait_secs() -> u64 {
    600
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            tick_secs: default_registry_tick_secs(),
            delete_wait_secs: default_delete_wait_secs(),
        }
    }
}

impl Registry {
    pub fn delete_wait(&self) -> Duration {
        Duration::from_secs(self.delete_wait_secs)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

/// Task scheduler (C5) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduler {
    #[serde(default = "default_scheduler_tick_secs")]
    pub tick_secs: u64,
    /// Consecutive-exception cap before a running task is reloaded
    /// (§4.5.1).
    #[serde(default = "default_except_cap")]
    pub except_cap: i32,
    /// Address this binary's small HTTP surface binds to (the endpoints
    /// C6 consumes, §6).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_scheduler_tick_secs() -> u64 {
    60
}
fn default_except_cap() -> i32 {
    5
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler {
            tick_secs: default_scheduler_tick_secs(),
            except_cap: default_except_cap(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl Scheduler {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

/// Resource autoscaler (C6) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autoscaler {
    #[serde(default = "default_autoscaler_tick_secs")]
    pub tick_secs: u64,
    #[serde(default)]
    pub watermarks: Watermarks,
}

fn default_autoscaler_tick_secs() -> u64 {
    30
}

impl Default for Autoscaler {
    fn default() -> Self {
        Autoscaler {
            tick_secs: default_autoscaler_tick_secs(),
            watermarks: Watermarks::default(),
        }
    }
}

impl Autoscaler {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

/// Host-scan sub-scan fan-out settings (§4.1, §9, §11): additional backend
/// scanner hosts a host-scan engine's tasks are split across, keyed by
/// engine name. An engine absent from this map (the common case) isn't
/// fanned out; its scanner handles the whole task itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostScan {
    #[serde(default)]
    pub partition_hosts: HashMap<String, Vec<String>>,
}

/// The root configuration object every binary loads at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conf {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    pub database: Database,
    #[serde(default)]
    pub k8s: K8s,
    #[serde(default)]
    pub registry: Registry,
    #[serde(default)]
    pub scheduler: Scheduler,
    #[serde(default)]
    pub autoscaler: Autoscaler,
    #[serde(default)]
    pub host_scan: HostScan,
    /// `TASK_MANAGER_HOST`/`TASK_MANAGER_PORT`.
    pub task_manager: ServiceAddr,
    /// `RESOURCE_MANAGER_HOST`/`RESOURCE_MANAGER_PORT`.
    pub resource_manager: ServiceAddr,
    /// The metrics API C3 queries for per-node CPU/memory readings.
    pub metrics: ServiceAddr,
}

impl Conf {
    /// Load settings from a YAML file at `path`, overlaid with environment
    /// variables prefixed `VTSCAN__` (double underscore separates nesting,
    /// e.g. `VTSCAN__DATABASE__URL`).
    pub fn new(path: &str) -> Result<Self, Error> {
        let mut builder = Config::builder();
        if Path::new(path).exists() {
            builder = builder.add_source(File::new(path, FileFormat::Yaml));
        }
        let settings = builder
            .add_source(Environment::with_prefix("VTSCAN").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
