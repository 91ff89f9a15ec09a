//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `decofile_reconciliations_total` - Total number of reconciliations
//! - `decofile_reconciliation_errors_total` - Total number of reconciliation errors
//! - `decofile_configmap_writes_total` - Total number of ConfigMap creates and rewrites
//! - `decofile_pods_notified_total` - Total number of pods successfully notified
//! - `decofile_notification_failures_total` - Total number of failed notification fan-outs
//! - `decofile_archive_downloads_total` - Total number of archive downloads

use std::sync::LazyLock;

use anyhow::Result;
use prometheus::{IntCounter, Registry};

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "decofile_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "decofile_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static CONFIGMAP_WRITES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "decofile_configmap_writes_total",
        "Total number of ConfigMap creates and rewrites",
    )
    .expect("Failed to create CONFIGMAP_WRITES_TOTAL metric - this should never happen")
});

static PODS_NOTIFIED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "decofile_pods_notified_total",
        "Total number of pods successfully notified",
    )
    .expect("Failed to create PODS_NOTIFIED_TOTAL metric - this should never happen")
});

static NOTIFICATION_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "decofile_notification_failures_total",
        "Total number of failed notification fan-outs",
    )
    .expect("Failed to create NOTIFICATION_FAILURES_TOTAL metric - this should never happen")
});

static ARCHIVE_DOWNLOADS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "decofile_archive_downloads_total",
        "Total number of archive downloads",
    )
    .expect("Failed to create ARCHIVE_DOWNLOADS_TOTAL metric - this should never happen")
});

/// Register all metrics with the crate registry. Call once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONFIGMAP_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PODS_NOTIFIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(NOTIFICATION_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARCHIVE_DOWNLOADS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn increment_configmap_writes() {
    CONFIGMAP_WRITES_TOTAL.inc();
}

pub fn add_pods_notified(count: u64) {
    PODS_NOTIFIED_TOTAL.inc_by(count);
}

pub fn increment_notification_failures() {
    NOTIFICATION_FAILURES_TOTAL.inc();
}

pub fn increment_archive_downloads() {
    ARCHIVE_DOWNLOADS_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        assert_eq!(RECONCILIATIONS_TOTAL.get(), before + 1);

        let before = PODS_NOTIFIED_TOTAL.get();
        add_pods_notified(4);
        assert_eq!(PODS_NOTIFIED_TOTAL.get(), before + 4);
    }
}
