//! Partition inspection: turns catalog entries into dated descriptors

use partkeeper_core::bounds::parse_range_bound;
use partkeeper_core::{CatalogEntry, PartitionDescriptor, Result};
use tracing::{debug, warn};

use crate::manager::PartitionManager;

impl PartitionManager {
    /// Current dated partitions of a table
    ///
    /// Never fails: a catalog error is logged and reported as an empty list so
    /// callers can continue with conservative defaults. Catch-all partitions and
    /// bounds that are not single-column date ranges are left out. No ordering
    /// is guaranteed.
    pub async fn get_partition_info(&self, table_name: &str) -> Vec<PartitionDescriptor> {
        match self.try_get_partition_info(table_name).await {
            Ok(partitions) => partitions,
            Err(e) => {
                warn!("Failed to inspect partitions of {}: {}", table_name, e);
                Vec::new()
            }
        }
    }

    /// Like `get_partition_info`, but surfaces catalog errors
    pub async fn try_get_partition_info(&self, table_name: &str) -> Result<Vec<PartitionDescriptor>> {
        let entries = self.store.list_partitions(table_name).await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| describe(table_name, entry))
            .collect())
    }
}

fn describe(table_name: &str, entry: CatalogEntry) -> Option<PartitionDescriptor> {
    let Some(bound) = entry.bound_expression.as_deref().and_then(parse_range_bound) else {
        debug!(
            "Skipping partition {} with bound {:?}",
            entry.partition_name, entry.bound_expression
        );
        return None;
    };

    Some(PartitionDescriptor {
        table_name: table_name.to_string(),
        partition_name: entry.partition_name,
        start_date: bound.start,
        end_date: bound.end,
        row_count: entry.row_count,
        size_bytes: entry.size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use partkeeper_core::{InMemoryPartitionStore, PartitionSpec, PartitionStore, PartitioningConfig};
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn manager(store: &InMemoryPartitionStore) -> PartitionManager {
        PartitionManager::new(Arc::new(store.clone()), PartitioningConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_parses_dated_partitions_and_skips_default() {
        let store = InMemoryPartitionStore::with_tables(&["StudySession"]);
        store
            .create_partition(&PartitionSpec::for_month("StudySession", date(2025, 3, 1)).unwrap())
            .await
            .unwrap();
        store.add_default_partition("StudySession", "StudySession_default");

        let partitions = manager(&store).get_partition_info("StudySession").await;

        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].partition_name, "StudySession_2025_03");
        assert_eq!(partitions[0].start_date, date(2025, 3, 1));
        assert_eq!(partitions[0].end_date, date(2025, 4, 1));
        assert_eq!(partitions[0].row_count, Some(0));
    }

    #[tokio::test]
    async fn test_catalog_failure_degrades_to_empty() {
        let store = InMemoryPartitionStore::with_tables(&["ActivityLog"]);
        store
            .create_partition(&PartitionSpec::for_month("ActivityLog", date(2025, 1, 1)).unwrap())
            .await
            .unwrap();
        store.fail_listing("ActivityLog");

        let manager = manager(&store);
        assert!(manager.get_partition_info("ActivityLog").await.is_empty());
        assert!(manager.try_get_partition_info("ActivityLog").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_table_has_no_partitions() {
        let store = InMemoryPartitionStore::new();
        assert!(manager(&store).get_partition_info("Missing").await.is_empty());
    }

    #[test]
    fn test_describe_keeps_volume() {
        let entry = CatalogEntry {
            partition_name: "Notification_2024_12".to_string(),
            bound_expression: Some(
                "FOR VALUES FROM ('2024-12-01 00:00:00+00') TO ('2025-01-01 00:00:00+00')".to_string(),
            ),
            row_count: Some(42),
            size_bytes: Some(8192),
        };

        let descriptor = describe("Notification", entry).unwrap();
        assert_eq!(descriptor.end_date, date(2025, 1, 1));
        assert_eq!(descriptor.row_count, Some(42));
        assert_eq!(descriptor.size_bytes, Some(8192));
    }

    #[test]
    fn test_describe_skips_missing_bound() {
        let entry = CatalogEntry {
            partition_name: "Notification_old".to_string(),
            bound_expression: None,
            row_count: None,
            size_bytes: None,
        };
        assert!(describe("Notification", entry).is_none());
    }
}
