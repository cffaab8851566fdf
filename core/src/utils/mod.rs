//! Cross-cutting utilities: the error type, logging macros, tracing setup
//! and small helpers used by every reconciler.

pub mod errors;
pub mod helpers;
#[macro_use]
pub mod macros;
#[cfg(feature = "http")]
pub mod ids;
pub mod trace;

pub use errors::{Error, Kind};
pub use helpers::with_retry;
