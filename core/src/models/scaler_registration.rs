//! Declarative per-engine scaling registrations (C4), sourced from
//! `scalerregisters.cstcloud.cn` custom resources.

use serde::{Deserialize, Serialize};

use crate::models::engine::{EngineKind, ScalingModes};

/// What an engine costs to run and how it can be scaled, as declared by its
/// operator. Built fresh from the cluster API every autoscaler tick; rows
/// missing `engine` or `type` are skipped at catalog-load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerRegistration {
    pub engine: EngineKind,
    pub modes: ScalingModes,
    /// Cores consumed per running task of this engine. Units are cores,
    /// matching the cluster metrics source; validated on catalog load
    /// (Open Question (b)).
    pub cpu_cost: f64,
    /// Bytes of memory consumed per running task.
    pub memory_cost: f64,
    /// Average wall-clock seconds a task of this engine takes; used to
    /// weight `assigned_rate`/`expected_rate` ranking.
    pub time_cost: f64,
    /// Fixed cores overhead of starting one additional pod of this engine.
    pub external_cpu_cost: f64,
    /// Fixed memory overhead of starting one additional pod of this engine.
    pub external_memory_cost: f64,
    /// The engine's own scaler endpoint, used for `/scale_out_with_node`.
    pub host: String,
    pub port: u16,
}

impl ScalerRegistration {
    pub fn scale_out_url(&self, node_name: &str) -> String {
        format!(
            "http://{}:{}/scale_out_with_node?node_name={}",
            self.host, self.port, node_name
        )
    }

    /// Validate that costs are non-negative, sane core/byte quantities.
    /// Catalog load drops registrations that fail this (Open Question (b)).
    pub fn validate(&self) -> bool {
        self.cpu_cost >= 0.0
            && self.memory_cost >= 0.0
            && self.time_cost >= 0.0
            && self.external_cpu_cost >= 0.0
            && self.external_memory_cost >= 0.0
    }
}
