//! Partition provisioning: monthly partitions covering a date range

use chrono::NaiveDate;
use partkeeper_core::calendar::months_in_range;
use partkeeper_core::partition::validate_table_name;
use partkeeper_core::{CreateOutcome, PartitionSpec, Result};
use std::time::Instant;
use tracing::{debug, info};

use crate::manager::PartitionManager;
use crate::report::ProvisionReport;

impl PartitionManager {
    /// Ensure one partition exists for every calendar month intersecting
    /// `[start_date, end_date]`
    ///
    /// Existing partitions are skipped. Creation is conditional at the store, so a
    /// concurrent creator winning the race shows up in `existing`, not as an error.
    /// The first store error aborts the walk; months already created stay created
    /// and a later call resumes where this one stopped.
    ///
    /// # Errors
    /// - `Error::InvalidRange` if `start_date > end_date`
    /// - `Error::InvalidIdentifier` if the table name is not a plain identifier
    /// - store errors from the existence check or the creation
    pub async fn create_monthly_partitions(
        &self,
        table_name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ProvisionReport> {
        let started = Instant::now();
        validate_table_name(table_name)?;
        let months = months_in_range(start_date, end_date)?;

        let mut report = ProvisionReport {
            table_name: table_name.to_string(),
            ..Default::default()
        };

        for month in months {
            let spec = PartitionSpec::for_month(table_name, month)?;

            if self
                .store
                .partition_exists(table_name, &spec.partition_name)
                .await?
            {
                debug!("Partition {} already exists", spec.partition_name);
                report.existing.push(spec.partition_name);
                continue;
            }

            match self.store.create_partition(&spec).await? {
                CreateOutcome::Created => {
                    info!(
                        "Created partition {} for [{}, {})",
                        spec.partition_name, spec.start_date, spec.end_date
                    );
                    self.metrics.record_partition_created(table_name);
                    report.created.push(spec.partition_name);
                }
                CreateOutcome::AlreadyExists => {
                    debug!("Partition {} was created concurrently", spec.partition_name);
                    report.existing.push(spec.partition_name);
                }
            }
        }

        self.observe("provision", started);
        Ok(report)
    }
}
