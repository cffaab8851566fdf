//! The authoritative table of live scanner instances (C2's output, C5 and
//! C6's shared input).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::engine::{EngineKind, ScanFamily};

/// A scanner's health/lifecycle state.
///
/// See `db::scanners` for the transition guards; §4.2 of the reconciler
/// design enumerates every edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScannerStatus {
    Enable,
    Disable,
    Waiting,
    Deleting,
    Deleted,
}

impl ScannerStatus {
    /// `deleted` is absorbing: once set, no reconciler may move a row out
    /// of it.
    pub fn is_absorbing(&self) -> bool {
        matches!(self, ScannerStatus::Deleted)
    }
}

impl std::fmt::Display for ScannerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ScannerStatus::Enable => "enable",
            ScannerStatus::Disable => "disable",
            ScannerStatus::Waiting => "waiting",
            ScannerStatus::Deleting => "deleting",
            ScannerStatus::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

/// One scanner pod's row. Identity is its `name`, which must match exactly
/// one observed pod (see `registry::reconcile`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Scanner {
    pub id: Uuid,
    pub name: String,
    pub engine: EngineKind,
    pub family: ScanFamily,
    pub node_name: String,
    pub ip: String,
    pub port: i32,
    pub filetype: String,
    pub status: ScannerStatus,
    /// Currently assigned concurrency slots.
    pub max_concurrency: i32,
    /// Rolling failure counter; reaching `max_concurrency` forces deletion.
    pub except_num: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scanner {
    /// A scanner with `except_num >= max_concurrency` is forcibly
    /// scheduled for deletion (§4.2 rule 7, §4.5.1 error taxonomy).
    pub fn exhausted(&self) -> bool {
        self.except_num >= self.max_concurrency
    }
}

/// A pod observed in the scanner namespace, as read by C2 from the cluster
/// API. Labels are mapped into these fields; `port` defaults to 80 and
/// `filetype` defaults to `HTML` when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedPod {
    pub name: String,
    pub engine: EngineKind,
    pub family: ScanFamily,
    pub max_concurrency: i32,
    pub port: i32,
    pub filetype: String,
    pub ip: Option<String>,
    pub node_name: Option<String>,
    pub phase: PodPhase,
}

/// Kubernetes pod phase, as reported by the cluster API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl std::str::FromStr for PodPhase {
    type Err = crate::models::errors::InvalidEnum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PodPhase::Pending),
            "Running" => Ok(PodPhase::Running),
            "Succeeded" => Ok(PodPhase::Succeeded),
            "Failed" => Ok(PodPhase::Failed),
            _ => Ok(PodPhase::Unknown),
        }
    }
}

/// A scanner free-capacity triple used by the dispatch phase:
/// `(scanner_id, free_slots, total_slots)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerCapacity {
    pub scanner_id: Uuid,
    pub free: i32,
    pub total: i32,
}

impl ScannerCapacity {
    /// Fraction of slots still free. Dispatch re-sorts candidates by this,
    /// highest first, before every placement: the scanner with the most
    /// slack (least loaded) wins the head of the list.
    pub fn slack_ratio(&self) -> f64 {
        if self.total <= 0 {
            return 0.0;
        }
        self.free as f64 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn scanner(except_num: i32, max_concurrency: i32) -> Scanner {
        Scanner {
            id: Uuid::nil(),
            name: "s1".into(),
            engine: EngineKind("network-scan".into()),
            family: ScanFamily::HostScan,
            node_name: "node-1".into(),
            ip: "10.0.0.1".into(),
            port: 9390,
            filetype: "HTML".into(),
            status: ScannerStatus::Enable,
            max_concurrency,
            except_num,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn exhausted_at_and_above_max_concurrency() {
        assert!(!scanner(2, 3).exhausted());
        assert!(scanner(3, 3).exhausted());
        assert!(scanner(4, 3).exhausted());
    }

    #[test]
    fn deleted_is_absorbing_other_statuses_are_not() {
        assert!(ScannerStatus::Deleted.is_absorbing());
        assert!(!ScannerStatus::Deleting.is_absorbing());
        assert!(!ScannerStatus::Enable.is_absorbing());
    }

    #[test]
    fn pod_phase_parses_known_values_and_falls_back_to_unknown() {
        assert_eq!(PodPhase::from_str("Running").unwrap(), PodPhase::Running);
        assert_eq!(PodPhase::from_str("Failed").unwrap(), PodPhase::Failed);
        assert_eq!(PodPhase::from_str("Bogus").unwrap(), PodPhase::Unknown);
    }

    #[test]
    fn slack_ratio_orders_most_free_first() {
        let a = ScannerCapacity { scanner_id: Uuid::nil(), free: 1, total: 10 };
        let b = ScannerCapacity { scanner_id: Uuid::nil(), free: 5, total: 10 };
        assert!(b.slack_ratio() > a.slack_ratio());
    }

    #[test]
    fn slack_ratio_is_zero_for_a_zero_total_scanner() {
        let c = ScannerCapacity { scanner_id: Uuid::nil(), free: 0, total: 0 };
        assert_eq!(c.slack_ratio(), 0.0);
    }
}
