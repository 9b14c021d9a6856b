// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for certwarden.
//!
//! All metrics carry the `certwarden_` prefix and live in [`METRICS_REGISTRY`],
//! which the `/metrics` endpoint encodes with [`gather_metrics`].
//!
//! # Metrics Categories
//!
//! - **Cycle Metrics** - Renewal cycles and their duration
//! - **Certificate Metrics** - Per-secret renewal outcomes and expiry times
//! - **Replication Metrics** - Secret writes per namespace
//! - **DNS Metrics** - Challenge record operations
//!
//! # Example
//!
//! ```rust,no_run
//! use certwarden::metrics::record_cycle_completed;
//!
//! record_cycle_completed(true, std::time::Duration::from_secs(3));
//! ```

use chrono::{DateTime, Utc};
use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all certwarden metrics
const METRICS_NAMESPACE: &str = "certwarden";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Cycle Metrics
// ============================================================================

/// Total number of renewal cycles
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static RENEWAL_CYCLES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_renewal_cycles_total"),
        "Total number of renewal cycles by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of renewal cycles in seconds
pub static RENEWAL_CYCLE_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_renewal_cycle_duration_seconds"),
        "Duration of renewal cycles in seconds",
    )
    .buckets(vec![0.1, 1.0, 5.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Certificate Metrics
// ============================================================================

/// Total number of certificate processing outcomes
///
/// Labels:
/// - `secret`: Secret name of the certificate spec
/// - `status`: Outcome (`valid`, `renewed`, `failed`)
pub static CERTIFICATE_RENEWALS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_certificate_renewals_total"),
        "Total number of certificate processing outcomes by secret and status",
    );
    let counter = CounterVec::new(opts, &["secret", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Expiry of the certificate currently stored, as a Unix timestamp
///
/// Labels:
/// - `secret`: Secret name of the certificate spec
pub static CERTIFICATE_EXPIRY_TIMESTAMP_SECONDS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_certificate_expiry_timestamp_seconds"),
        "Expiry (notAfter) of the stored certificate as a Unix timestamp",
    );
    let gauge = GaugeVec::new(opts, &["secret"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Replication Metrics
// ============================================================================

/// Total number of secret writes
///
/// Labels:
/// - `namespace`: Target namespace
/// - `outcome`: `created`, `updated`, `unchanged` or `error`
pub static SECRET_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_secret_writes_total"),
        "Total number of TLS secret writes by namespace and outcome",
    );
    let counter = CounterVec::new(opts, &["namespace", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// DNS Metrics
// ============================================================================

/// Total number of challenge record operations
///
/// Labels:
/// - `operation`: `present` or `cleanup`
/// - `status`: `success` or `error`
pub static DNS_RECORD_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dns_record_operations_total"),
        "Total number of DNS challenge record operations by operation and status",
    );
    let counter = CounterVec::new(opts, &["operation", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Record a finished renewal cycle
///
/// # Arguments
/// * `success` - Whether the cycle ended without an aborting error
/// * `duration` - Wall time of the cycle
pub fn record_cycle_completed(success: bool, duration: Duration) {
    RENEWAL_CYCLES_TOTAL
        .with_label_values(&[status_label(success)])
        .inc();
    RENEWAL_CYCLE_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record the outcome of processing one certificate spec
///
/// # Arguments
/// * `secret` - Secret name of the certificate spec
/// * `status` - `valid`, `renewed` or `failed`
pub fn record_certificate_outcome(secret: &str, status: &str) {
    CERTIFICATE_RENEWALS_TOTAL
        .with_label_values(&[secret, status])
        .inc();
}

/// Record the expiry of the certificate now stored for `secret`
#[allow(clippy::cast_precision_loss)]
pub fn record_certificate_expiry(secret: &str, not_after: DateTime<Utc>) {
    CERTIFICATE_EXPIRY_TIMESTAMP_SECONDS
        .with_label_values(&[secret])
        .set(not_after.timestamp() as f64);
}

/// Record a secret write (or skipped write) in one namespace
pub fn record_secret_write(namespace: &str, outcome: &str) {
    SECRET_WRITES_TOTAL
        .with_label_values(&[namespace, outcome])
        .inc();
}

/// Record a challenge record `present` or `cleanup`
pub fn record_dns_operation(operation: &str, success: bool) {
    DNS_RECORD_OPERATIONS_TOTAL
        .with_label_values(&[operation, status_label(success)])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
