//! Counters exported through the `metrics` facade.
//!
//! Each recorder also updates the process-wide [`MetricsStore`] so the CLI
//! and tests can read values without installing an exporter.

use std::sync::OnceLock;

use metrics::{counter, gauge, histogram};

use super::store::MetricsStore;

static STORE: OnceLock<MetricsStore> = OnceLock::new();

/// Process-wide mirror of every recorded value.
pub fn metrics_store() -> &'static MetricsStore {
    STORE.get_or_init(MetricsStore::new)
}

pub fn record_load(component: &str) {
    counter!("swapline_loads_total", "component" => component.to_string()).increment(1);
    metrics_store().increment_counter("swapline_loads_total", 1);
}

pub fn record_unload(component: &str) {
    counter!("swapline_unloads_total", "component" => component.to_string()).increment(1);
    metrics_store().increment_counter("swapline_unloads_total", 1);
}

pub fn record_swap(component: &str) {
    counter!("swapline_swaps_total", "component" => component.to_string()).increment(1);
    metrics_store().increment_counter("swapline_swaps_total", 1);
}

/// `outcome` is one of `success`, `compile_failed`, `build_failed`, `tests_failed`.
pub fn record_build(outcome: &str, seconds: f64) {
    counter!("swapline_builds_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("swapline_build_seconds").record(seconds);
    let store = metrics_store();
    store.increment_counter(&format!("swapline_builds_total.{}", outcome), 1);
    store.record_histogram("swapline_build_seconds", seconds);
}

/// `outcome` is one of `delivered`, `failed`, `skipped`.
pub fn record_message(outcome: &str) {
    counter!("swapline_messages_total", "outcome" => outcome.to_string()).increment(1);
    metrics_store().increment_counter(&format!("swapline_messages_total.{}", outcome), 1);
}

pub fn set_loaded_components(count: usize) {
    gauge!("swapline_loaded_components").set(count as f64);
    metrics_store().set_gauge("swapline_loaded_components", count as f64);
}
