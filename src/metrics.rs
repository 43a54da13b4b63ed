/* src/metrics.rs */
//! # Structured Metrics
//!
//! Lightweight metrics that emit structured `tracing` events instead of
//! exporting to a collector. Call sites obtain a static instance through the
//! `counter!`, `gauge!` and `histogram!` macros.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

/// A counter metric that emits structured logs with `tracing`.
#[derive(Debug)]
pub struct Counter {
    /// Name of the counter metric.
    name: &'static str,
    /// Atomic value of the counter.
    value: AtomicU64,
}

impl Counter {
    /// Creates a new `Counter` with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self { name, value: AtomicU64::new(0) }
    }

    /// Increments the counter by a given delta.
    pub fn increment(&self, delta: u64) {
        let new_value = self.value.fetch_add(delta, Ordering::Relaxed) + delta;
        trace!(
            metric_type = "counter",
            metric_name = self.name,
            value = new_value,
            delta,
            "Counter incremented"
        );
    }

    /// Current counter value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge metric that emits structured logs with `tracing`.
#[derive(Debug)]
pub struct Gauge {
    /// Name of the gauge metric.
    name: &'static str,
    /// Last value stored, as raw `f64` bits.
    bits: AtomicU64,
}

impl Gauge {
    /// Creates a new `Gauge` with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self { name, bits: AtomicU64::new(0) }
    }

    /// Sets the gauge to a new value.
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
        debug!(
            metric_type = "gauge",
            metric_name = self.name,
            value,
            "Gauge updated"
        );
    }

    /// Last value set.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// A histogram metric that emits structured logs with `tracing`.
#[derive(Debug)]
pub struct Histogram {
    /// Name of the histogram metric.
    name: &'static str,
}

impl Histogram {
    /// Creates a new `Histogram` with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Records a single observation.
    pub fn record(&self, value: f64) {
        debug!(
            metric_type = "histogram",
            metric_name = self.name,
            value,
            "Histogram value recorded"
        );
    }
}

/// Creates or retrieves a static `Counter` instance.
macro_rules! counter {
    ($name:expr) => {{
        static COUNTER: $crate::metrics::Counter = $crate::metrics::Counter::new($name);
        &COUNTER
    }};
}

/// Creates or retrieves a static `Gauge` instance.
macro_rules! gauge {
    ($name:expr) => {{
        static GAUGE: $crate::metrics::Gauge = $crate::metrics::Gauge::new($name);
        &GAUGE
    }};
}

/// Creates or retrieves a static `Histogram` instance.
macro_rules! histogram {
    ($name:expr) => {{
        static HISTOGRAM: $crate::metrics::Histogram = $crate::metrics::Histogram::new($name);
        &HISTOGRAM
    }};
}

pub(crate) use counter;
pub(crate) use gauge;
pub(crate) use histogram;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let counter = Counter::new("test_counter");
        counter.increment(2);
        counter.increment(3);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn gauge_keeps_last_value() {
        let gauge = Gauge::new("test_gauge");
        gauge.set(1.5);
        gauge.set(-4.25);
        assert_eq!(gauge.get(), -4.25);
    }

    #[test]
    fn macros_hand_out_one_instance_per_site() {
        fn bump() -> u64 {
            let c = counter!("macro_site");
            c.increment(1);
            c.get()
        }
        assert_eq!(bump(), 1);
        assert_eq!(bump(), 2);
        histogram!("macro_histogram").record(3.0);
        gauge!("macro_gauge").set(7.0);
    }
}
