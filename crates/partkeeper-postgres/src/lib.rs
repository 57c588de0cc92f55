//! PostgreSQL-backed partition store for Partkeeper
//!
//! This crate implements the `PartitionStore` trait on top of PostgreSQL
//! declarative range partitioning.
//!
//! # Features
//! - Monthly partitions created with a single DDL statement; a concurrent
//!   creator surfaces as `CreateOutcome::AlreadyExists`
//! - Partition bounds read from the system catalog (`pg_get_expr(relpartbound, ...)`)
//! - Row estimates and physical sizes summed over the partition tree, with
//!   optional exact counts
//! - Monthly archive aggregates upserted into `archive.<table>_monthly`
//!
//! # Example
//! ```no_run
//! # use partkeeper_postgres::PostgresPartitionStore;
//! # use partkeeper_core::PartitionStore;
//! # async fn example() -> partkeeper_core::Result<()> {
//! let store = PostgresPartitionStore::new("postgres://localhost/studyapp").await?;
//! let stats = store.table_stats("StudySession").await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod postgres_partition_store;
pub mod sql;

pub use config::PostgresStoreConfig;
pub use postgres_partition_store::PostgresPartitionStore;
