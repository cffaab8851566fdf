//! Sets up structured logging for every binary in the workspace.
//!
//! The spec names no external tracing backend, so unlike the stack this
//! idiom is borrowed from we only ever register a local stdout subscriber;
//! see DESIGN.md for the dropped jaeger/otlp exporters.

use tracing_subscriber::prelude::*;

use crate::conf::LogLevel;

/// Get the current span's trace id, if any. Used to stitch a logged error
/// back to the tick that produced it.
pub fn get_trace() -> Option<String> {
    use tracing::Span;
    let context_id = Span::current().id();
    context_id.map(|id| format!("{id:?}"))
}

/// Install a stdout subscriber filtered at `level` for the binary named
/// `name`.
pub fn setup(name: &str, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(layer.with_filter(level.to_filter()))
        .try_init()
        .unwrap_or_else(|_| eprintln!("{name}: tracing already initialized"));
}
