//! PartitionManager - entry point of the partition lifecycle
//!
//! The manager owns no mutable state. Every operation reads the current layout
//! from the store, acts on it, and returns a report. Each responsibility lives in
//! its own module as an `impl PartitionManager` block:
//! - `inspector`: `get_partition_info`
//! - `provisioner`: `create_monthly_partitions`
//! - `archival`: `archive_expiring_rows`
//! - `retention`: `cleanup_old_partitions`
//! - `capacity`: `check_and_extend_partitions_if_needed`
//! - `health`: `get_partition_health_report`

use partkeeper_core::{PartitionStore, PartitioningConfig, Result};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::LifecycleMetrics;

/// Partition lifecycle manager
#[derive(Clone)]
pub struct PartitionManager {
    pub(crate) store: Arc<dyn PartitionStore>,
    pub(crate) config: Arc<PartitioningConfig>,
    pub(crate) metrics: Arc<LifecycleMetrics>,
}

impl PartitionManager {
    /// Create a manager over a store with a validated configuration
    ///
    /// # Errors
    /// - `Error::ConfigValidation` if the configuration is invalid
    pub fn new(store: Arc<dyn PartitionStore>, config: PartitioningConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config: Arc::new(config),
            metrics: Arc::new(LifecycleMetrics::default()),
        })
    }

    /// Replace the metrics collector (e.g. to share a registry with an exporter)
    pub fn with_metrics(mut self, metrics: Arc<LifecycleMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<dyn PartitionStore> {
        &self.store
    }

    pub fn config(&self) -> &PartitioningConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<LifecycleMetrics> {
        &self.metrics
    }

    pub(crate) fn observe(&self, operation: &str, started: Instant) {
        self.metrics
            .record_operation(operation, started.elapsed().as_secs_f64());
    }
}

impl std::fmt::Debug for PartitionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
