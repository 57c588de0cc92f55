//! Partkeeper Lifecycle Manager
//!
//! Manages calendar-month range partitions over large append-only tables:
//! - Provisioning of monthly partitions, idempotent under concurrent callers
//! - Inspection of the current partition layout
//! - Retention cleanup, preceded by monthly archival of aging rows
//! - Capacity-triggered extension of partition coverage
//! - Health reporting with maintenance recommendations
//!
//! All operations go through `PartitionManager`, which talks to the database
//! only through the `PartitionStore` trait.

pub mod archival;
pub mod capacity;
pub mod health;
pub mod inspector;
pub mod manager;
pub mod metrics;
pub mod provisioner;
pub mod report;
pub mod retention;

pub use archival::archive_cutoff;
pub use manager::PartitionManager;
pub use metrics::LifecycleMetrics;
pub use report::{
    ArchiveRun, CapacityAction, CapacityReason, CleanupReport, ExtensionReport, HealthReport,
    LifecycleFailure, LifecycleOperation, ProvisionReport, Recommendation, TableHealth,
};
