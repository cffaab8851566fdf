//! Ephemeral per-node resource readings pulled from the cluster metrics
//! source (C3) each autoscaler tick.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeSnapshot {
    pub cpu_total: f64,
    pub cpu_available: f64,
    pub cpu_namespace_used: f64,
    pub memory_total: f64,
    pub memory_available: f64,
    pub memory_namespace_used: f64,
}

impl NodeSnapshot {
    /// `1 - available/total`; the canonical usage formula (§4.6). Zero total
    /// reads as fully used so a node lacking data never looks idle.
    pub fn cpu_usage(&self) -> f64 {
        if self.cpu_total <= 0.0 {
            return 1.0;
        }
        1.0 - (self.cpu_available / self.cpu_total)
    }

    pub fn memory_usage(&self) -> f64 {
        if self.memory_total <= 0.0 {
            return 1.0;
        }
        1.0 - (self.memory_available / self.memory_total)
    }

    /// Load attributable to non-scanner workloads on this node:
    /// `total - available - namespace_used` (§4.6.2).
    pub fn cpu_other(&self) -> f64 {
        (self.cpu_total - self.cpu_available - self.cpu_namespace_used).max(0.0)
    }

    pub fn memory_other(&self) -> f64 {
        (self.memory_total - self.memory_available - self.memory_namespace_used).max(0.0)
    }

    /// Weighted combination of CPU and memory usage (default weights
    /// 0.5/0.5, configurable; not required to sum to 1, see Open
    /// Question (c)).
    pub fn combined_usage(&self, cpu_weight: f64, memory_weight: f64) -> f64 {
        cpu_weight * self.cpu_usage() + memory_weight * self.memory_usage()
    }
}

/// Map of node name to its snapshot, as collected for one autoscaler tick.
/// A node missing from this map had its metrics query fail this tick and is
/// skipped by scale decisions rather than treated as a crash (§4.3).
pub type NodeSnapshots = HashMap<String, NodeSnapshot>;
