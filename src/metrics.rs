//! Metrics collection for batch execution
//!
//! Provides Prometheus-compatible metrics for monitoring batch throughput,
//! unit outcomes and concurrency.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::batch::ConcurrencyStrategy;

lazy_static! {
    /// Counter for finished batches
    static ref BATCHES: IntCounterVec = register_int_counter_vec!(
        "batchpool_batches_total",
        "Total number of batch executions",
        &["strategy", "status"]
    ).expect("batchpool_batches_total registers once");

    /// Counter for finished units
    static ref UNITS: IntCounterVec = register_int_counter_vec!(
        "batchpool_units_total",
        "Total number of units executed",
        &["strategy", "outcome"]
    ).expect("batchpool_units_total registers once");

    /// Gauge for units currently running
    static ref ACTIVE_UNITS: IntGauge = register_int_gauge!(
        "batchpool_active_units",
        "Number of units currently running across all batches"
    ).expect("batchpool_active_units registers once");

    /// Histogram for whole-batch wall clock
    static ref BATCH_DURATION: HistogramVec = register_histogram_vec!(
        "batchpool_batch_duration_seconds",
        "Batch execution duration in seconds",
        &["strategy"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0]
    ).expect("batchpool_batch_duration_seconds registers once");

    /// Histogram for single-unit duration
    static ref UNIT_DURATION: HistogramVec = register_histogram_vec!(
        "batchpool_unit_duration_seconds",
        "Unit of work duration in seconds",
        &["strategy"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).expect("batchpool_unit_duration_seconds registers once");
}

/// Metrics collector for one strategy
#[derive(Debug, Clone, Copy)]
pub struct BatchMetrics {
    strategy: &'static str,
}

impl BatchMetrics {
    /// Create a collector labelled with `strategy`
    pub fn new(strategy: ConcurrencyStrategy) -> Self {
        Self {
            strategy: strategy.as_str(),
        }
    }

    /// Record a finished batch
    pub fn record_batch(&self, status: &str, duration_secs: f64) {
        BATCHES.with_label_values(&[self.strategy, status]).inc();
        BATCH_DURATION
            .with_label_values(&[self.strategy])
            .observe(duration_secs);
    }

    /// Record a finished unit
    pub fn record_unit(&self, success: bool, duration_secs: f64) {
        let outcome = if success { "succeeded" } else { "failed" };
        UNITS.with_label_values(&[self.strategy, outcome]).inc();
        UNIT_DURATION
            .with_label_values(&[self.strategy])
            .observe(duration_secs);
    }

    /// Record a unit entering the running state
    pub fn unit_started(&self) {
        ACTIVE_UNITS.inc();
    }

    /// Record a unit leaving the running state
    pub fn unit_finished(&self) {
        ACTIVE_UNITS.dec();
    }
}

/// Export metrics in Prometheus format
pub fn export_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e).into())
}
