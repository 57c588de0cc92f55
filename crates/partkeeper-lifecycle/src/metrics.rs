//! Metrics for the partition lifecycle manager
//!
//! Provides Prometheus metrics for monitoring partition maintenance:
//! - Partitions created and dropped per table
//! - Capacity-triggered extensions, labelled by reason
//! - Per-table failures of batch operations
//! - Rows archived into monthly aggregates
//! - Partition counts observed by health reports
//! - Operation durations

use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector for partition lifecycle operations
#[derive(Clone)]
pub struct LifecycleMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Partitions created by the provisioner
    pub partitions_created_total: CounterVec,
    /// Partitions dropped by retention cleanup
    pub partitions_dropped_total: CounterVec,
    /// Capacity-triggered extensions
    pub capacity_extensions_total: CounterVec,
    /// Failures recorded by batch operations
    pub failures_total: CounterVec,
    /// Aggregate rows inserted into archive tables
    pub archived_rows_total: CounterVec,
    /// Dated partitions seen by the last health report
    pub partition_count: GaugeVec,
    /// Operation duration
    pub operation_duration_seconds: HistogramVec,
}

impl LifecycleMetrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let partitions_created_total = CounterVec::new(
            Opts::new(
                "partkeeper_partitions_created_total",
                "Total number of partitions created",
            ),
            &["table_name"],
        )?;

        let partitions_dropped_total = CounterVec::new(
            Opts::new(
                "partkeeper_partitions_dropped_total",
                "Total number of expired partitions dropped",
            ),
            &["table_name"],
        )?;

        let capacity_extensions_total = CounterVec::new(
            Opts::new(
                "partkeeper_capacity_extensions_total",
                "Total number of capacity-triggered partition extensions",
            ),
            &["table_name", "reason"],
        )?;

        let failures_total = CounterVec::new(
            Opts::new(
                "partkeeper_failures_total",
                "Total number of failures recorded by lifecycle operations",
            ),
            &["operation", "table_name"],
        )?;

        let archived_rows_total = CounterVec::new(
            Opts::new(
                "partkeeper_archived_rows_total",
                "Total number of monthly aggregate rows archived",
            ),
            &["table_name"],
        )?;

        let partition_count = GaugeVec::new(
            Opts::new(
                "partkeeper_partition_count",
                "Number of dated partitions per table at the last health report",
            ),
            &["table_name"],
        )?;

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "partkeeper_operation_duration_seconds",
                "Lifecycle operation duration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
            &["operation"],
        )?;

        // Register all metrics
        registry.register(Box::new(partitions_created_total.clone()))?;
        registry.register(Box::new(partitions_dropped_total.clone()))?;
        registry.register(Box::new(capacity_extensions_total.clone()))?;
        registry.register(Box::new(failures_total.clone()))?;
        registry.register(Box::new(archived_rows_total.clone()))?;
        registry.register(Box::new(partition_count.clone()))?;
        registry.register(Box::new(operation_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            partitions_created_total,
            partitions_dropped_total,
            capacity_extensions_total,
            failures_total,
            archived_rows_total,
            partition_count,
            operation_duration_seconds,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a created partition
    pub fn record_partition_created(&self, table_name: &str) {
        self.partitions_created_total
            .with_label_values(&[table_name])
            .inc();
    }

    /// Record a dropped partition
    pub fn record_partition_dropped(&self, table_name: &str) {
        self.partitions_dropped_total
            .with_label_values(&[table_name])
            .inc();
    }

    /// Record a capacity-triggered extension
    pub fn record_extension(&self, table_name: &str, reason: &str) {
        self.capacity_extensions_total
            .with_label_values(&[table_name, reason])
            .inc();
    }

    /// Record a failure inside a batch operation
    pub fn record_failure(&self, operation: &str, table_name: &str) {
        self.failures_total
            .with_label_values(&[operation, table_name])
            .inc();
    }

    /// Record archived aggregate rows
    pub fn record_archived(&self, table_name: &str, rows: u64) {
        self.archived_rows_total
            .with_label_values(&[table_name])
            .inc_by(rows as f64);
    }

    /// Set the observed partition count for a table
    pub fn set_partition_count(&self, table_name: &str, count: usize) {
        self.partition_count
            .with_label_values(&[table_name])
            .set(count as f64);
    }

    /// Record an operation duration
    pub fn record_operation(&self, operation: &str, duration_secs: f64) {
        self.operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}

impl Default for LifecycleMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create lifecycle metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = LifecycleMetrics::new().unwrap();
        metrics.record_operation("cleanup", 0.1);
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_partition_created() {
        let metrics = LifecycleMetrics::new().unwrap();
        metrics.record_partition_created("StudySession");
        metrics.record_partition_created("StudySession");

        let gathered = metrics.registry().gather();
        let created_metric = gathered
            .iter()
            .find(|m| m.name() == "partkeeper_partitions_created_total")
            .expect("partitions_created_total metric not found");

        assert_eq!(
            created_metric.metric[0]
                .counter
                .as_ref()
                .unwrap()
                .value
                .unwrap(),
            2.0
        );
    }

    #[test]
    fn test_record_extension_labels_by_reason() {
        let metrics = LifecycleMetrics::new().unwrap();
        metrics.record_extension("StudySession", "rows");
        metrics.record_extension("StudySession", "size");

        let gathered = metrics.registry().gather();
        let extension_metric = gathered
            .iter()
            .find(|m| m.name() == "partkeeper_capacity_extensions_total")
            .expect("capacity_extensions_total metric not found");

        assert_eq!(extension_metric.metric.len(), 2);
    }

    #[test]
    fn test_record_archived() {
        let metrics = LifecycleMetrics::new().unwrap();
        metrics.record_archived("StudySession", 7);
        metrics.record_archived("StudySession", 3);

        let gathered = metrics.registry().gather();
        let archived_metric = gathered
            .iter()
            .find(|m| m.name() == "partkeeper_archived_rows_total")
            .expect("archived_rows_total metric not found");

        assert_eq!(
            archived_metric.metric[0]
                .counter
                .as_ref()
                .unwrap()
                .value
                .unwrap(),
            10.0
        );
    }

    #[test]
    fn test_set_partition_count() {
        let metrics = LifecycleMetrics::new().unwrap();
        metrics.set_partition_count("ActivityLog", 12);
        metrics.set_partition_count("ActivityLog", 13);

        let gathered = metrics.registry().gather();
        let count_metric = gathered
            .iter()
            .find(|m| m.name() == "partkeeper_partition_count")
            .expect("partition_count metric not found");

        assert_eq!(
            count_metric.metric[0].gauge.as_ref().unwrap().value.unwrap(),
            13.0
        );
    }
}
