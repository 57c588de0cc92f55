//! Health reporting: per-table partition summary and maintenance recommendations

use chrono::{DateTime, NaiveDate, Utc};
use partkeeper_core::calendar::{add_months, days_before, months_until};
use partkeeper_core::PartitionDescriptor;
use std::time::Instant;
use tracing::{debug, warn};

use crate::manager::PartitionManager;
use crate::report::{HealthReport, Recommendation, TableHealth};

impl PartitionManager {
    /// Summarize the partitions of every monitored table
    pub async fn get_partition_health_report(&self) -> HealthReport {
        self.get_partition_health_report_at(Utc::now()).await
    }

    /// `get_partition_health_report` evaluated at a fixed instant
    ///
    /// Read-only. Expired partitions are counted with the same rule retention
    /// cleanup applies, and only for tables whose cleanup is enabled.
    pub async fn get_partition_health_report_at(&self, now: DateTime<Utc>) -> HealthReport {
        let started = Instant::now();
        let mut tables = Vec::new();

        for table_name in self.config.monitored_tables() {
            let partitions = self.get_partition_info(&table_name).await;
            self.metrics.set_partition_count(&table_name, partitions.len());

            // A cutoff before the representable calendar expires nothing
            let retention_cutoff = self
                .config
                .retention_for(&table_name)
                .filter(|p| p.cleanup_enabled)
                .and_then(|p| match days_before(now, p.retention_days) {
                    Ok(cutoff) => Some(cutoff),
                    Err(e) => {
                        warn!("Skipping expiry check for {}: {}", table_name, e);
                        None
                    }
                });

            let health = summarize_table(table_name, partitions, retention_cutoff, now);
            debug!(
                "{}: {} partition(s), {} recommendation(s)",
                health.table_name,
                health.partition_count,
                health.recommended_actions.len()
            );
            tables.push(health);
        }

        self.observe("health", started);
        HealthReport {
            generated_at: now,
            tables,
        }
    }
}

fn summarize_table(
    table_name: String,
    partitions: Vec<PartitionDescriptor>,
    retention_cutoff: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> TableHealth {
    let mut recommended_actions = Vec::new();

    if partitions.is_empty() {
        recommended_actions.push(Recommendation::CreateInitialPartitions);
    }

    if let Some(cutoff) = retention_cutoff {
        let count = partitions.iter().filter(|p| p.expired_before(cutoff)).count();
        if count > 0 {
            recommended_actions.push(Recommendation::RemoveExpiredPartitions { count });
        }
    }

    let newest_partition = partitions.iter().max_by_key(|p| p.end_date).cloned();
    if let Some(newest) = &newest_partition
        && let Ok(horizon) = add_months(now.date_naive(), 1)
        && newest.end_date < horizon
        && let Ok(count) = months_until(newest.end_date, horizon)
    {
        recommended_actions.push(Recommendation::CreateFuturePartitions { count });
    }

    TableHealth {
        table_name,
        partition_count: partitions.len(),
        largest_partition: partitions
            .iter()
            .filter(|p| p.row_count.is_some())
            .max_by_key(|p| p.row_count)
            .cloned(),
        oldest_partition: partitions.iter().min_by_key(|p| p.start_date).cloned(),
        newest_partition,
        recommended_actions,
    }
}
