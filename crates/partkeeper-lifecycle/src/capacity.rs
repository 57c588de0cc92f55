//! Capacity monitoring: extend partition coverage of tables over their thresholds

use chrono::{DateTime, Days, NaiveDate, Utc};
use partkeeper_core::calendar::{add_months, month_start};
use partkeeper_core::{CapacityThreshold, Result, TableStats};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::manager::PartitionManager;
use crate::report::{CapacityAction, CapacityReason, ExtensionReport, LifecycleFailure, LifecycleOperation};

/// Which threshold, if any, the stats exceed
pub fn exceedance(stats: &TableStats, threshold: &CapacityThreshold) -> Option<CapacityReason> {
    CapacityReason::classify(
        stats.row_count > threshold.max_rows,
        stats.size_mb() > threshold.max_size_in_mb,
    )
}

impl PartitionManager {
    /// Extend every table whose volume exceeds its capacity threshold
    pub async fn check_and_extend_partitions_if_needed(&self) -> ExtensionReport {
        self.check_and_extend_partitions_if_needed_at(Utc::now()).await
    }

    /// `check_and_extend_partitions_if_needed` evaluated at a fixed instant
    ///
    /// For a table over its row or size threshold, `auto_extend_months` further
    /// monthly partitions are provisioned starting at the newest partition's end
    /// (or the current month when the table has none). Provisioning is idempotent,
    /// so repeated runs never create a partition twice. Per-table errors are
    /// recorded and the remaining tables are still checked.
    pub async fn check_and_extend_partitions_if_needed_at(&self, now: DateTime<Utc>) -> ExtensionReport {
        let started = Instant::now();
        let mut report = ExtensionReport::default();

        for threshold in &self.config.capacity {
            let table_name = threshold.table_name.as_str();

            let stats = match self.store.table_stats(table_name).await {
                Ok(stats) => stats,
                Err(e) => {
                    error!("Failed to read stats of {}: {}", table_name, e);
                    self.metrics.record_failure("stats", table_name);
                    report
                        .failures
                        .push(LifecycleFailure::table(LifecycleOperation::Stats, table_name, e));
                    continue;
                }
            };

            let Some(reason) = exceedance(&stats, threshold) else {
                debug!(
                    "{} within capacity ({} rows, {:.1} MB)",
                    table_name,
                    stats.row_count,
                    stats.size_mb()
                );
                continue;
            };

            match self.extend_table(threshold, stats, reason, now).await {
                Ok(action) => {
                    info!("{}", action.description);
                    self.metrics.record_extension(table_name, reason.as_str());
                    report.actions.push(action);
                }
                Err(e) => {
                    error!("Failed to extend partitions of {}: {}", table_name, e);
                    self.metrics.record_failure("provision", table_name);
                    report.failures.push(LifecycleFailure::table(
                        LifecycleOperation::Provision,
                        table_name,
                        e,
                    ));
                }
            }
        }

        self.observe("extend", started);
        report
    }

    async fn extend_table(
        &self,
        threshold: &CapacityThreshold,
        stats: TableStats,
        reason: CapacityReason,
        now: DateTime<Utc>,
    ) -> Result<CapacityAction> {
        let table_name = threshold.table_name.as_str();
        let base_date = self
            .get_partition_info(table_name)
            .await
            .into_iter()
            .map(|p| p.end_date)
            .max()
            .unwrap_or_else(|| month_start(now.date_naive()));

        let extended_through = last_day_before(add_months(base_date, threshold.auto_extend_months)?);
        let provisioned = self
            .create_monthly_partitions(table_name, base_date, extended_through)
            .await?;

        let description = format!(
            "Extended {} by {} month(s) from {} through {}: {} (observed {} / {:.1} MB, limits {} / {:.1} MB)",
            table_name,
            threshold.auto_extend_months,
            base_date,
            extended_through,
            reason_text(reason),
            stats.row_count,
            stats.size_mb(),
            threshold.max_rows,
            threshold.max_size_in_mb
        );

        Ok(CapacityAction {
            table_name: table_name.to_string(),
            reason,
            row_count: stats.row_count,
            size_mb: stats.size_mb(),
            base_date,
            extended_through,
            partitions_created: provisioned.created,
            description,
        })
    }
}

fn last_day_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}

fn reason_text(reason: CapacityReason) -> &'static str {
    match reason {
        CapacityReason::Rows => "row count exceeded",
        CapacityReason::Size => "size exceeded",
        CapacityReason::Both => "row count and size exceeded",
    }
}
