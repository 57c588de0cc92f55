//! Archival of aging operational rows into monthly aggregates

use chrono::{DateTime, NaiveDate, Utc};
use partkeeper_core::calendar::{days_before, month_start};
use partkeeper_core::{ArchivalPolicy, Result};
use std::time::Instant;
use tracing::{error, info};

use crate::manager::PartitionManager;
use crate::report::ArchiveRun;

/// First day of the month containing `now - horizon_days`
///
/// Rows strictly before this date belong to whole months that are past the horizon.
pub fn archive_cutoff(now: DateTime<Utc>, horizon_days: u32) -> Result<NaiveDate> {
    Ok(month_start(days_before(now, horizon_days)?))
}

impl PartitionManager {
    /// Upsert monthly aggregates for every enabled archival policy
    pub async fn archive_expiring_rows(&self) -> Vec<ArchiveRun> {
        self.archive_expiring_rows_at(Utc::now()).await
    }

    /// `archive_expiring_rows` evaluated at a fixed instant
    ///
    /// Never fails: each policy's error is captured in its `ArchiveRun`.
    pub async fn archive_expiring_rows_at(&self, now: DateTime<Utc>) -> Vec<ArchiveRun> {
        let started = Instant::now();
        let mut runs = Vec::new();

        for policy in self.config.archival.iter().filter(|p| p.enabled) {
            runs.push(self.archive_policy(policy, now).await);
        }

        self.observe("archive", started);
        runs
    }

    async fn archive_policy(&self, policy: &ArchivalPolicy, now: DateTime<Utc>) -> ArchiveRun {
        let mut run = ArchiveRun {
            table_name: policy.table_name.clone(),
            archive_table: format!("archive.{}", policy.archive_table_name()),
            cutoff: None,
            rows_archived: None,
            error: None,
        };

        let cutoff = match archive_cutoff(now, policy.horizon_days) {
            Ok(cutoff) => cutoff,
            Err(e) => {
                error!("Cannot compute archive cutoff for {}: {}", policy.table_name, e);
                self.metrics.record_failure("archive", &policy.table_name);
                run.error = Some(e.to_string());
                return run;
            }
        };
        run.cutoff = Some(cutoff);

        match self.store.archive_monthly(policy, cutoff).await {
            Ok(rows) => {
                info!(
                    "Archived {} monthly aggregate(s) of {} before {}",
                    rows, policy.table_name, cutoff
                );
                self.metrics.record_archived(&policy.table_name, rows);
                run.rows_archived = Some(rows);
            }
            Err(e) => {
                error!("Failed to archive {}: {}", policy.table_name, e);
                self.metrics.record_failure("archive", &policy.table_name);
                run.error = Some(e.to_string());
            }
        }

        run
    }
}
