//! The data model shared by every reconciler: tasks, scanners, reports,
//! scaler registrations and node snapshots.

pub mod engine;
pub mod errors;
pub mod node_snapshot;
pub mod report;
pub mod retry;
pub mod scaler_registration;
pub mod scanner;
pub mod task;

pub use engine::{EngineKind, ScalingModes, ScanFamily};
pub use errors::InvalidEnum;
pub use node_snapshot::{NodeSnapshot, NodeSnapshots};
pub use report::{Report, ReportContent};
pub use retry::{RetriableClass, RetryPolicy};
pub use scaler_registration::ScalerRegistration;
pub use scanner::{ObservedPod, PodPhase, Scanner, ScannerCapacity, ScannerStatus};
pub use task::{EngineTaskCount, ScannerTaskCount, Task, TaskRequest, TaskStatus};
