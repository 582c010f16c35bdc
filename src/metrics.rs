//! Prometheus metrics for migration runs
//!
//! Enabled with the `metrics` feature. Metrics live in their own
//! [`prometheus::Registry`] so a host can merge them into its exporter with
//! [`MigrationMetrics::gather`] or serve them directly from [`encode_text`].

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

pub static MIGRATION_METRICS: Lazy<Option<MigrationMetrics>> =
    Lazy::new(|| match MigrationMetrics::init() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            log::warn!("Failed to register migration metrics: {e}");
            None
        }
    });

pub struct MigrationMetrics {
    pub registry: Registry,
    pub migrations_applied: IntCounterVec,
    pub migrations_failed: IntCounterVec,
    pub migrations_skipped: IntCounterVec,
    pub statements_total: IntCounter,
    pub migration_duration: HistogramVec,
}

impl MigrationMetrics {
    /// Build and register all collectors
    ///
    /// # Errors
    ///
    /// Returns `prometheus::Error` if a collector cannot be created or registered.
    pub fn init() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let migrations_applied = IntCounterVec::new(
            Opts::new(
                "tidemark_migrations_applied_total",
                "Migrations committed, by direction",
            ),
            &["direction"],
        )?;
        let migrations_failed = IntCounterVec::new(
            Opts::new(
                "tidemark_migrations_failed_total",
                "Migrations rolled back after a failure, by direction",
            ),
            &["direction"],
        )?;
        let migrations_skipped = IntCounterVec::new(
            Opts::new(
                "tidemark_migrations_skipped_total",
                "Migrations recorded or unrecorded without running their SQL, by direction",
            ),
            &["direction"],
        )?;
        let statements_total = IntCounter::new(
            "tidemark_statements_total",
            "Migration statements executed",
        )?;
        let migration_duration = HistogramVec::new(
            HistogramOpts::new(
                "tidemark_migration_duration_seconds",
                "Wall time of one migration, including its transaction",
            ),
            &["direction"],
        )?;

        registry.register(Box::new(migrations_applied.clone()))?;
        registry.register(Box::new(migrations_failed.clone()))?;
        registry.register(Box::new(migrations_skipped.clone()))?;
        registry.register(Box::new(statements_total.clone()))?;
        registry.register(Box::new(migration_duration.clone()))?;

        Ok(Self {
            registry,
            migrations_applied,
            migrations_failed,
            migrations_skipped,
            statements_total,
            migration_duration,
        })
    }

    pub fn record_applied(&self, direction: &str, elapsed: Duration) {
        self.migrations_applied.with_label_values(&[direction]).inc();
        self.migration_duration
            .with_label_values(&[direction])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_failed(&self, direction: &str) {
        self.migrations_failed.with_label_values(&[direction]).inc();
    }

    /// A record-only run; not counted as applied and not timed
    pub fn record_skipped(&self, direction: &str) {
        self.migrations_skipped.with_label_values(&[direction]).inc();
    }

    pub fn record_statement(&self) {
        self.statements_total.inc();
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}

/// Render the migration metrics in the Prometheus text format
///
/// Returns an empty string if the metrics failed to register.
///
/// # Errors
///
/// Returns `prometheus::Error` if encoding fails.
pub fn encode_text() -> Result<String, prometheus::Error> {
    let Some(metrics) = MIGRATION_METRICS.as_ref() else {
        return Ok(String::new());
    };
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metrics.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
