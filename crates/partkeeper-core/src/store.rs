//! Partition store trait
//!
//! The `PartitionStore` trait is the only way the lifecycle manager touches the
//! relational store. It exposes the handful of catalog reads, conditional DDL
//! statements and the archive upsert the manager needs.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::partition::{CatalogEntry, PartitionSpec, TableStats};
use crate::policy::ArchivalPolicy;
use crate::Result;

/// Result of a conditional partition creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    /// The partition was created by this call
    Created,
    /// The partition already existed (possibly created concurrently)
    AlreadyExists,
}

/// Partition store trait
///
/// Implementations:
/// - `PostgresPartitionStore`: PostgreSQL declarative range partitioning
/// - `InMemoryPartitionStore`: in-process store for tests and dry runs
///
/// # Example
/// ```no_run
/// # use partkeeper_core::{PartitionSpec, PartitionStore};
/// # use chrono::NaiveDate;
/// # async fn example(store: &dyn PartitionStore) -> partkeeper_core::Result<()> {
/// let month = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
/// let spec = PartitionSpec::for_month("StudySession", month)?;
/// store.create_partition(&spec).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Check whether a partition with this name exists
    ///
    /// # Errors
    /// - `Error::Database` / `Error::Store` for query errors
    async fn partition_exists(&self, table_name: &str, partition_name: &str) -> Result<bool>;

    /// Create a monthly partition unless it already exists
    ///
    /// Must be a single conditional statement at the store level so that a
    /// concurrent creator is reported as `AlreadyExists`, never as an error.
    ///
    /// # Errors
    /// - `Error::TableNotFound` if the parent table does not exist
    /// - `Error::Database` / `Error::Store` for rejected DDL (locks, permissions, overlap)
    async fn create_partition(&self, spec: &PartitionSpec) -> Result<CreateOutcome>;

    /// List the child partitions of a parent table with their raw bounds
    ///
    /// Returns an empty list for a table without partitions.
    async fn list_partitions(&self, table_name: &str) -> Result<Vec<CatalogEntry>>;

    /// Drop a partition and its dependent objects
    ///
    /// Dropping a partition that no longer exists is not an error.
    async fn drop_partition(&self, table_name: &str, partition_name: &str) -> Result<()>;

    /// Live row count and physical size of a table (all partitions combined)
    ///
    /// # Errors
    /// - `Error::TableNotFound` if the table does not exist
    async fn table_stats(&self, table_name: &str) -> Result<TableStats>;

    /// Upsert monthly aggregates for rows strictly before `cutoff`
    ///
    /// Existing `(user_id, year, month)` aggregates are left untouched.
    /// Returns the number of aggregate rows inserted.
    async fn archive_monthly(&self, policy: &ArchivalPolicy, cutoff: NaiveDate) -> Result<u64>;
}
