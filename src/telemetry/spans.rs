//! Operation spans shared by the registry, the build executor and the
//! swap coordinator.

use std::fmt::Display;
use std::time::Instant;

use tracing::{field, info_span, Span};

/// Outcome recording on an operation span.
pub trait SpanExt {
    /// Fill `outcome`, and `error.message` when `result` is an error.
    fn record_result<T, E: Display>(&self, result: &Result<T, E>);

    /// Fill `latency_ms` with the time elapsed since `started`.
    fn record_latency(&self, started: Instant);
}

impl SpanExt for Span {
    fn record_result<T, E: Display>(&self, result: &Result<T, E>) {
        if let Err(e) = result {
            self.record("outcome", "error");
            self.record("error.message", field::display(e));
        } else {
            self.record("outcome", "ok");
        }
    }

    fn record_latency(&self, started: Instant) {
        self.record("latency_ms", started.elapsed().as_millis() as u64);
    }
}

/// Builder of `swapline_operation` spans.
pub struct OperationSpan;

impl OperationSpan {
    /// `operation` is e.g. `load`, `update_module`, `build` or `swap`;
    /// `component` is the identifier or target path it acts on.
    pub fn new(operation: &'static str, component: &str) -> Span {
        info_span!(
            "swapline_operation",
            operation,
            component = %component,
            outcome = field::Empty,
            error.message = field::Empty,
            latency_ms = field::Empty,
        )
    }
}
