//! Structured results of lifecycle operations
//!
//! Batch operations never fail as a whole. They return a report holding what
//! succeeded plus one `LifecycleFailure` per table or partition that did not.

use chrono::{DateTime, NaiveDate, Utc};
use partkeeper_core::PartitionDescriptor;
use serde::Serialize;
use std::fmt;

/// Lifecycle step a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleOperation {
    Inspect,
    Provision,
    Drop,
    Stats,
}

impl LifecycleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOperation::Inspect => "inspect",
            LifecycleOperation::Provision => "provision",
            LifecycleOperation::Drop => "drop",
            LifecycleOperation::Stats => "stats",
        }
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed unit of work inside a batch operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleFailure {
    pub operation: LifecycleOperation,
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_name: Option<String>,
    pub cause: String,
}

impl LifecycleFailure {
    pub fn table(operation: LifecycleOperation, table_name: &str, cause: impl fmt::Display) -> Self {
        Self {
            operation,
            table_name: table_name.to_string(),
            partition_name: None,
            cause: cause.to_string(),
        }
    }

    pub fn partition(
        operation: LifecycleOperation,
        table_name: &str,
        partition_name: &str,
        cause: impl fmt::Display,
    ) -> Self {
        Self {
            operation,
            table_name: table_name.to_string(),
            partition_name: Some(partition_name.to_string()),
            cause: cause.to_string(),
        }
    }
}

impl fmt::Display for LifecycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.partition_name {
            Some(partition) => write!(
                f,
                "{} failed for {} ({}): {}",
                self.operation, partition, self.table_name, self.cause
            ),
            None => write!(f, "{} failed for {}: {}", self.operation, self.table_name, self.cause),
        }
    }
}

/// Fold failures into one human-readable message
fn summarize(failures: &[LifecycleFailure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    Some(
        failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Outcome of `create_monthly_partitions`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub table_name: String,
    /// Partitions created by this call
    pub created: Vec<String>,
    /// Partitions that were already present (or created concurrently)
    pub existing: Vec<String>,
}

/// Outcome of one archival policy run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveRun {
    pub table_name: String,
    pub archive_table: String,
    /// Rows strictly before this date were aggregated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_archived: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArchiveRun {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of `cleanup_old_partitions`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted_partitions: Vec<String>,
    pub archive_runs: Vec<ArchiveRun>,
    pub failures: Vec<LifecycleFailure>,
}

impl CleanupReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Aggregated failure message, `None` when every table was processed
    pub fn error(&self) -> Option<String> {
        summarize(&self.failures)
    }
}

/// Which threshold a table exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityReason {
    Rows,
    Size,
    Both,
}

impl CapacityReason {
    /// Classify an exceedance, `None` when neither threshold is crossed
    pub fn classify(rows_exceeded: bool, size_exceeded: bool) -> Option<Self> {
        match (rows_exceeded, size_exceeded) {
            (true, true) => Some(CapacityReason::Both),
            (true, false) => Some(CapacityReason::Rows),
            (false, true) => Some(CapacityReason::Size),
            (false, false) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityReason::Rows => "rows",
            CapacityReason::Size => "size",
            CapacityReason::Both => "both",
        }
    }
}

impl fmt::Display for CapacityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension performed for a table over its capacity threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityAction {
    pub table_name: String,
    pub reason: CapacityReason,
    pub row_count: i64,
    pub size_mb: f64,
    /// Start of the newly provisioned span
    pub base_date: NaiveDate,
    /// Last day covered after the extension
    pub extended_through: NaiveDate,
    pub partitions_created: Vec<String>,
    pub description: String,
}

/// Outcome of `check_and_extend_partitions_if_needed`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtensionReport {
    pub actions: Vec<CapacityAction>,
    pub failures: Vec<LifecycleFailure>,
}

impl ExtensionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn error(&self) -> Option<String> {
        summarize(&self.failures)
    }
}

/// Maintenance suggested by the health reporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Recommendation {
    CreateInitialPartitions,
    RemoveExpiredPartitions { count: usize },
    CreateFuturePartitions { count: u32 },
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::CreateInitialPartitions => f.write_str("Create initial partitions"),
            Recommendation::RemoveExpiredPartitions { count } => {
                write!(f, "Remove {} expired partition(s) past the retention period", count)
            }
            Recommendation::CreateFuturePartitions { count } => {
                write!(f, "Create {} additional future partition(s)", count)
            }
        }
    }
}

/// Health summary of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableHealth {
    pub table_name: String,
    pub partition_count: usize,
    pub largest_partition: Option<PartitionDescriptor>,
    pub oldest_partition: Option<PartitionDescriptor>,
    pub newest_partition: Option<PartitionDescriptor>,
    pub recommended_actions: Vec<Recommendation>,
}

/// Outcome of `get_partition_health_report`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub generated_at: DateTime<Utc>,
    pub tables: Vec<TableHealth>,
}

impl HealthReport {
    pub fn table(&self, table_name: &str) -> Option<&TableHealth> {
        self.tables.iter().find(|t| t.table_name == table_name)
    }
}
