//! Partition descriptors and related store records

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::{Error, Result};

/// Longest identifier PostgreSQL keeps without truncation
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Length of the `_YYYY_MM` suffix appended to partition names
const PARTITION_SUFFIX_LEN: usize = 8;

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validate a plain SQL identifier (table or partition name)
pub fn validate_identifier(name: &str) -> Result<()> {
    if !IDENTIFIER_REGEX.is_match(name) {
        return Err(Error::InvalidIdentifier(format!(
            "'{}' must match [A-Za-z_][A-Za-z0-9_]*",
            name
        )));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidIdentifier(format!(
            "'{}' exceeds {} bytes",
            name, MAX_IDENTIFIER_LEN
        )));
    }
    Ok(())
}

/// Validate a parent table name, leaving room for the monthly partition suffix
pub fn validate_table_name(name: &str) -> Result<()> {
    validate_identifier(name)?;
    if name.len() + PARTITION_SUFFIX_LEN > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidIdentifier(format!(
            "table name '{}' leaves no room for the partition suffix",
            name
        )));
    }
    Ok(())
}

/// A dated partition of a parent table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    /// Logical (parent) table
    pub table_name: String,
    /// Physical partition name
    pub partition_name: String,
    /// Inclusive lower bound (first day of the month)
    pub start_date: NaiveDate,
    /// Exclusive upper bound (first day of the following month)
    pub end_date: NaiveDate,
    /// Observed row count, when the store could report one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<i64>,
    /// Physical size in bytes, when the store could report one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
}

impl PartitionDescriptor {
    /// True when the whole `[start, end)` range lies before `cutoff`
    pub fn expired_before(&self, cutoff: NaiveDate) -> bool {
        self.end_date <= cutoff
    }

    /// True when `[start, end)` shares at least one day with `other`
    pub fn overlaps(&self, other: &PartitionDescriptor) -> bool {
        self.start_date < other.end_date && other.start_date < self.end_date
    }
}

/// A raw partition as reported by the store catalog, before bound parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub partition_name: String,
    /// Boundary expression text (`FOR VALUES FROM (...) TO (...)`, `DEFAULT`, ...)
    pub bound_expression: Option<String>,
    pub row_count: Option<i64>,
    pub size_bytes: Option<i64>,
}

/// Request to create one monthly partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    pub table_name: String,
    pub partition_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PartitionSpec {
    /// Build the spec for the calendar month containing `date`
    pub fn for_month(table_name: &str, date: NaiveDate) -> Result<Self> {
        let start_date = calendar::month_start(date);
        Ok(Self {
            table_name: table_name.to_string(),
            partition_name: calendar::partition_name(table_name, start_date),
            start_date,
            end_date: calendar::next_month_start(start_date)?,
        })
    }
}

/// Live volume of a table (all partitions combined)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub row_count: i64,
    pub size_bytes: i64,
}

impl TableStats {
    /// Physical size in megabytes
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Monthly aggregate of archived operational rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub total_minutes: i64,
    pub session_count: i64,
    pub average_focus_score: Option<f64>,
    pub last_activity: DateTime<Utc>,
}
