//! Retention, capacity and archival policies
//!
//! Policies are static configuration: loaded once at startup, validated, and handed
//! to the lifecycle manager as an immutable `PartitioningConfig`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::partition::{validate_identifier, validate_table_name};
use crate::{Error, Result};

/// Per-table retention rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Parent table the policy applies to
    pub table_name: String,

    /// Age in days after which partitions are removed
    pub retention_days: u32,

    /// Kill switch for cleanup of this table
    #[serde(default = "default_true")]
    pub cleanup_enabled: bool,
}

/// Per-table volume thresholds that trigger partition extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityThreshold {
    /// Parent table the threshold applies to
    pub table_name: String,

    /// Row count above which coverage is extended
    pub max_rows: i64,

    /// Physical size in megabytes above which coverage is extended
    pub max_size_in_mb: f64,

    /// Number of months to provision past the newest partition
    #[serde(default = "default_auto_extend_months")]
    pub auto_extend_months: u32,
}

/// Source columns read by the monthly archive aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveColumns {
    #[serde(default = "default_user_id_column")]
    pub user_id: String,

    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,

    /// Duration in minutes, summed per month
    #[serde(default = "default_minutes_column")]
    pub minutes: String,

    /// Averaged per month when present
    #[serde(default = "default_focus_score_column")]
    pub focus_score: Option<String>,
}

impl Default for ArchiveColumns {
    fn default() -> Self {
        Self {
            user_id: default_user_id_column(),
            timestamp: default_timestamp_column(),
            minutes: default_minutes_column(),
            focus_score: default_focus_score_column(),
        }
    }
}

/// Monthly aggregation of rows about to age out of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivalPolicy {
    /// Operational table whose rows are aggregated
    pub table_name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Rows older than this many days (whole months only) are archived
    #[serde(default = "default_archive_horizon_days")]
    pub horizon_days: u32,

    #[serde(default)]
    pub columns: ArchiveColumns,
}

impl ArchivalPolicy {
    /// Archive table name inside the `archive` schema
    pub fn archive_table_name(&self) -> String {
        format!("{}_monthly", self.table_name.to_lowercase())
    }
}

/// Complete partition lifecycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitioningConfig {
    #[serde(default)]
    pub retention: Vec<RetentionPolicy>,

    #[serde(default)]
    pub capacity: Vec<CapacityThreshold>,

    #[serde(default)]
    pub archival: Vec<ArchivalPolicy>,
}

impl Default for PartitioningConfig {
    fn default() -> Self {
        Self {
            retention: vec![
                RetentionPolicy {
                    table_name: "StudySession".to_string(),
                    retention_days: 730,
                    cleanup_enabled: true,
                },
                RetentionPolicy {
                    table_name: "ActivityLog".to_string(),
                    retention_days: 365,
                    cleanup_enabled: true,
                },
                RetentionPolicy {
                    table_name: "Notification".to_string(),
                    retention_days: 90,
                    cleanup_enabled: true,
                },
            ],
            capacity: vec![
                CapacityThreshold {
                    table_name: "StudySession".to_string(),
                    max_rows: 10_000_000,
                    max_size_in_mb: 5120.0,
                    auto_extend_months: 3,
                },
                CapacityThreshold {
                    table_name: "ActivityLog".to_string(),
                    max_rows: 5_000_000,
                    max_size_in_mb: 2048.0,
                    auto_extend_months: 2,
                },
                CapacityThreshold {
                    table_name: "Notification".to_string(),
                    max_rows: 1_000_000,
                    max_size_in_mb: 512.0,
                    auto_extend_months: 1,
                },
            ],
            archival: vec![ArchivalPolicy {
                table_name: "StudySession".to_string(),
                enabled: true,
                horizon_days: default_archive_horizon_days(),
                columns: ArchiveColumns::default(),
            }],
        }
    }
}

impl PartitioningConfig {
    /// An empty configuration (no monitored tables)
    pub fn empty() -> Self {
        Self {
            retention: Vec::new(),
            capacity: Vec::new(),
            archival: Vec::new(),
        }
    }

    /// Retention policy for a table
    pub fn retention_for(&self, table_name: &str) -> Option<&RetentionPolicy> {
        self.retention.iter().find(|p| p.table_name == table_name)
    }

    /// Capacity threshold for a table
    pub fn capacity_for(&self, table_name: &str) -> Option<&CapacityThreshold> {
        self.capacity.iter().find(|t| t.table_name == table_name)
    }

    /// Tables named by any retention or capacity entry, in declaration order
    pub fn monitored_tables(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.retention
            .iter()
            .map(|p| &p.table_name)
            .chain(self.capacity.iter().map(|t| &t.table_name))
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut retention_tables = HashSet::new();
        for policy in &self.retention {
            validate_table_name(&policy.table_name).map_err(invalid)?;
            if policy.retention_days == 0 {
                return Err(Error::ConfigValidation(format!(
                    "retention_days for '{}' must be at least 1",
                    policy.table_name
                )));
            }
            if !retention_tables.insert(policy.table_name.as_str()) {
                return Err(Error::ConfigValidation(format!(
                    "duplicate retention policy for '{}'",
                    policy.table_name
                )));
            }
        }

        let mut capacity_tables = HashSet::new();
        for threshold in &self.capacity {
            validate_table_name(&threshold.table_name).map_err(invalid)?;
            if threshold.max_rows <= 0 {
                return Err(Error::ConfigValidation(format!(
                    "max_rows for '{}' must be positive",
                    threshold.table_name
                )));
            }
            if threshold.max_size_in_mb.is_nan() || threshold.max_size_in_mb <= 0.0 {
                return Err(Error::ConfigValidation(format!(
                    "max_size_in_mb for '{}' must be positive",
                    threshold.table_name
                )));
            }
            if threshold.auto_extend_months == 0 {
                return Err(Error::ConfigValidation(format!(
                    "auto_extend_months for '{}' must be at least 1",
                    threshold.table_name
                )));
            }
            if !capacity_tables.insert(threshold.table_name.as_str()) {
                return Err(Error::ConfigValidation(format!(
                    "duplicate capacity threshold for '{}'",
                    threshold.table_name
                )));
            }
        }

        let mut archival_tables = HashSet::new();
        for policy in &self.archival {
            validate_identifier(&policy.table_name).map_err(invalid)?;
            validate_identifier(&policy.archive_table_name()).map_err(invalid)?;
            validate_identifier(&policy.columns.user_id).map_err(invalid)?;
            validate_identifier(&policy.columns.timestamp).map_err(invalid)?;
            validate_identifier(&policy.columns.minutes).map_err(invalid)?;
            if let Some(column) = &policy.columns.focus_score {
                validate_identifier(column).map_err(invalid)?;
            }
            if policy.horizon_days == 0 {
                return Err(Error::ConfigValidation(format!(
                    "horizon_days for '{}' must be at least 1",
                    policy.table_name
                )));
            }
            if !archival_tables.insert(policy.table_name.as_str()) {
                return Err(Error::ConfigValidation(format!(
                    "duplicate archival policy for '{}'",
                    policy.table_name
                )));
            }
        }

        Ok(())
    }
}

fn invalid(e: Error) -> Error {
    Error::ConfigValidation(e.to_string())
}

fn default_true() -> bool {
    true
}

fn default_auto_extend_months() -> u32 {
    3
}

fn default_archive_horizon_days() -> u32 {
    365
}

fn default_user_id_column() -> String {
    "userId".to_string()
}

fn default_timestamp_column() -> String {
    "startTime".to_string()
}

fn default_minutes_column() -> String {
    "duration".to_string()
}

fn default_focus_score_column() -> Option<String> {
    Some("focusScore".to_string())
}
