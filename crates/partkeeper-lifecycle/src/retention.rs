//! Retention enforcement: drop partitions that aged past their table's policy

use chrono::{DateTime, Utc};
use partkeeper_core::calendar::days_before;
use partkeeper_core::RetentionPolicy;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::manager::PartitionManager;
use crate::report::{CleanupReport, LifecycleFailure, LifecycleOperation};

impl PartitionManager {
    /// Archive aging rows, then drop every expired partition
    pub async fn cleanup_old_partitions(&self) -> CleanupReport {
        self.cleanup_old_partitions_at(Utc::now()).await
    }

    /// `cleanup_old_partitions` evaluated at a fixed instant
    ///
    /// Archival runs once, before any partition is dropped, and its failures only
    /// show up in `archive_runs`. A partition is expired when its whole range lies
    /// before `now - retention_days`. Expired partitions are dropped oldest first.
    /// A table that cannot be inspected or a partition that cannot be dropped is
    /// recorded as a failure and the pass moves on.
    pub async fn cleanup_old_partitions_at(&self, now: DateTime<Utc>) -> CleanupReport {
        let started = Instant::now();
        let mut report = CleanupReport {
            archive_runs: self.archive_expiring_rows_at(now).await,
            ..Default::default()
        };

        for policy in &self.config.retention {
            if !policy.cleanup_enabled {
                debug!("Cleanup disabled for {}", policy.table_name);
                continue;
            }
            self.cleanup_table(policy, now, &mut report).await;
        }

        if let Some(message) = report.error() {
            error!("Partition cleanup finished with failures: {}", message);
        } else {
            info!(
                "Partition cleanup finished, {} partition(s) dropped",
                report.deleted_partitions.len()
            );
        }

        self.observe("cleanup", started);
        report
    }

    async fn cleanup_table(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) {
        let table_name = policy.table_name.as_str();
        let cutoff = match days_before(now, policy.retention_days) {
            Ok(cutoff) => cutoff,
            Err(e) => {
                error!("Cannot compute retention cutoff for {}: {}", table_name, e);
                self.metrics.record_failure("drop", table_name);
                report
                    .failures
                    .push(LifecycleFailure::table(LifecycleOperation::Drop, table_name, e));
                return;
            }
        };

        let partitions = match self.try_get_partition_info(table_name).await {
            Ok(partitions) => partitions,
            Err(e) => {
                error!("Failed to inspect {} for cleanup: {}", table_name, e);
                self.metrics.record_failure("inspect", table_name);
                report.failures.push(LifecycleFailure::table(
                    LifecycleOperation::Inspect,
                    table_name,
                    e,
                ));
                return;
            }
        };

        let mut expired: Vec<_> = partitions
            .into_iter()
            .filter(|p| p.expired_before(cutoff))
            .collect();
        expired.sort_by_key(|p| p.start_date);

        for partition in expired {
            match self
                .store
                .drop_partition(table_name, &partition.partition_name)
                .await
            {
                Ok(()) => {
                    info!(
                        "Dropped partition {} (ended {}, cutoff {})",
                        partition.partition_name, partition.end_date, cutoff
                    );
                    self.metrics.record_partition_dropped(table_name);
                    report.deleted_partitions.push(partition.partition_name);
                }
                Err(e) => {
                    error!("Failed to drop partition {}: {}", partition.partition_name, e);
                    self.metrics.record_failure("drop", table_name);
                    report.failures.push(LifecycleFailure::partition(
                        LifecycleOperation::Drop,
                        table_name,
                        &partition.partition_name,
                        e,
                    ));
                }
            }
        }
    }
}
