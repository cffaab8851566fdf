//! The shared control-plane library: data model, relational store, engine
//! adapter, scaler catalog, and cluster metrics source. The scheduler,
//! autoscaler and registry binaries each depend on this crate and add
//! their own reconciliation loop on top.

pub mod adapter;
pub mod catalog;
pub mod conf;
pub mod db;
pub mod k8s_client;
pub mod metrics;
pub mod models;
pub mod task_client;
pub mod utils;

pub use conf::Conf;
pub use utils::errors::{Error, Kind};
