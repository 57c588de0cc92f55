//! Partkeeper Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout Partkeeper:
//! - Partition descriptors and the boundary-literal parser
//! - Calendar-month arithmetic for partition ranges
//! - Retention, capacity and archival policies
//! - The `PartitionStore` trait and an in-memory implementation
//! - Core error types

pub mod bounds;
pub mod calendar;
pub mod error;
pub mod memory_store;
pub mod partition;
pub mod policy;
pub mod store;

pub use error::{Error, Result};
pub use memory_store::InMemoryPartitionStore;
pub use partition::{ArchiveRecord, CatalogEntry, PartitionDescriptor, PartitionSpec, TableStats};
pub use policy::{ArchivalPolicy, ArchiveColumns, CapacityThreshold, PartitioningConfig, RetentionPolicy};
pub use store::{CreateOutcome, PartitionStore};
