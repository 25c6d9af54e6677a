//! # Metrics
//!
//! Prometheus metrics for render passes and key lifecycle operations.
//!
//! ## Metrics Exposed
//!
//! - `qust_patches_rendered_total{concern}` - Patch files written, by concern
//! - `qust_key_operations_total{category,outcome}` - Key restores and generations
//! - `qust_backup_operations_total{operation}` - Backup object reads and writes
//! - `qust_render_errors_total` - Failed render passes
//! - `qust_render_duration_seconds` - Duration of render passes

use anyhow::Result;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static PATCHES_RENDERED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "qust_patches_rendered_total",
            "Total number of patch files written, by concern",
        ),
        &["concern"],
    )
    .expect("Failed to create PATCHES_RENDERED_TOTAL metric - this should never happen")
});

static KEY_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "qust_key_operations_total",
            "Total number of key operations by key category and outcome",
        ),
        &["category", "outcome"],
    )
    .expect("Failed to create KEY_OPERATIONS_TOTAL metric - this should never happen")
});

static BACKUP_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "qust_backup_operations_total",
            "Total number of backup object operations",
        ),
        &["operation"],
    )
    .expect("Failed to create BACKUP_OPERATIONS_TOTAL metric - this should never happen")
});

static RENDER_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("qust_render_errors_total", "Total number of failed render passes")
        .expect("Failed to create RENDER_ERRORS_TOTAL metric - this should never happen")
});

static RENDER_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "qust_render_duration_seconds",
            "Duration of render passes in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RENDER_DURATION metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(PATCHES_RENDERED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEY_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKUP_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RENDER_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RENDER_DURATION.clone()))?;

    Ok(())
}

pub fn increment_patches_rendered(concern: &str) {
    PATCHES_RENDERED_TOTAL.with_label_values(&[concern]).inc();
}

pub fn record_key_operation(category: &str, outcome: &str) {
    KEY_OPERATIONS_TOTAL
        .with_label_values(&[category, outcome])
        .inc();
}

pub fn increment_backup_operations(operation: &str) {
    BACKUP_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_render_errors() {
    RENDER_ERRORS_TOTAL.inc();
}

pub fn observe_render_duration(duration: f64) {
    RENDER_DURATION.observe(duration);
}

/// Text exposition of every registered metric
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = PATCHES_RENDERED_TOTAL.with_label_values(&["test"]).get();
        increment_patches_rendered("test");
        assert_eq!(
            PATCHES_RENDERED_TOTAL.with_label_values(&["test"]).get(),
            before + 1
        );
    }

    #[test]
    fn test_key_operation_labels() {
        record_key_operation("ejson", "generated");
        assert!(KEY_OPERATIONS_TOTAL
            .with_label_values(&["ejson", "generated"])
            .get()
            >= 1);
    }
}
