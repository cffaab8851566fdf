//! The relational store for tasks and scanners. Out of scope as a system
//! (§1), but the query layer against it is squarely in scope for every
//! reconciler that reads or mutates those rows.

pub mod pool;
pub mod reports;
pub mod scanners;
pub mod subscans;
pub mod tasks;
pub mod web_scan_phase;

pub use pool::{create_pool, run_migrations};
