//! In-process metrics store.
//!
//! Complements the `metrics` facade: values recorded here can be read back
//! as a serializable snapshot without any exporter installed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, f64>,
    pub histograms: HashMap<String, HistogramSummary>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

/// f64 values are stored as bits in atomics.
struct HistogramData {
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl HistogramData {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(f64::to_bits(0.0)),
            min: AtomicU64::new(f64::to_bits(f64::MAX)),
            max: AtomicU64::new(f64::to_bits(f64::MIN)),
        }
    }

    fn record(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        update_f64(&self.sum, |current| Some(current + value));
        update_f64(&self.min, |current| (value < current).then_some(value));
        update_f64(&self.max, |current| (value > current).then_some(value));
    }

    fn summary(&self) -> HistogramSummary {
        let count = self.count.load(Ordering::Relaxed);
        let load = |a: &AtomicU64| f64::from_bits(a.load(Ordering::Relaxed));
        HistogramSummary {
            count,
            sum: load(&self.sum),
            min: if count == 0 { 0.0 } else { load(&self.min) },
            max: if count == 0 { 0.0 } else { load(&self.max) },
        }
    }
}

/// Compare-and-swap loop; `f` returns `None` to leave the value alone.
fn update_f64(atomic: &AtomicU64, f: impl Fn(f64) -> Option<f64>) {
    let _ = atomic.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
        f(f64::from_bits(bits)).map(f64::to_bits)
    });
}

/// Apply `f` to the slot for `name`, creating it on first use. The read
/// lock covers the common case of an existing slot.
fn with_slot<V>(map: &RwLock<HashMap<String, V>>, name: &str, make: impl FnOnce() -> V, f: impl FnOnce(&V)) {
    if let Some(slot) = map.read().get(name) {
        f(slot);
        return;
    }
    f(map.write().entry(name.to_string()).or_insert_with(make));
}

#[derive(Default)]
pub struct MetricsStore {
    counters: RwLock<HashMap<String, AtomicU64>>,
    gauges: RwLock<HashMap<String, AtomicU64>>,
    histograms: RwLock<HashMap<String, HistogramData>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_counter(&self, name: &str, value: u64) {
        with_slot(&self.counters, name, || AtomicU64::new(0), |c| {
            c.fetch_add(value, Ordering::Relaxed);
        });
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        with_slot(&self.gauges, name, || AtomicU64::new(0), |g| {
            g.store(f64::to_bits(value), Ordering::Relaxed)
        });
    }

    pub fn record_histogram(&self, name: &str, value: f64) {
        with_slot(&self.histograms, name, HistogramData::new, |h| h.record(value));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self
                .counters
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
                .collect(),
            gauges: self
                .gauges
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), f64::from_bits(v.load(Ordering::Relaxed))))
                .collect(),
            histograms: self
                .histograms
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.summary()))
                .collect(),
        }
    }
}
