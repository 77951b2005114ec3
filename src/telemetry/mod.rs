//! Telemetry for the Swapline runtime.
//!
//! Structured logging, operation spans, the lifecycle audit log, and
//! counters exported through the `metrics` facade with an in-process mirror.

mod events;
mod logging;
mod metrics;
mod spans;
mod store;

pub use events::{log_lifecycle_event, LifecycleEvent, Severity};
pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    metrics_store, record_build, record_load, record_message, record_swap, record_unload,
    set_loaded_components,
};
pub use spans::{OperationSpan, SpanExt};
pub use store::{HistogramSummary, MetricsSnapshot, MetricsStore};
