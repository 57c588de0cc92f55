//! InMemoryPartitionStore - PartitionStore trait implementation held entirely in memory
//!
//! Mirrors the observable behavior of the PostgreSQL store closely enough for the
//! lifecycle manager not to tell the difference:
//! - partition creation is conditional and rejects overlapping ranges
//! - catalog entries carry PostgreSQL-style bound literals (`FOR VALUES ...`, `DEFAULT`)
//! - dropping a partition discards the rows inside its range
//! - archive upserts never overwrite an existing `(user_id, year, month)` aggregate
//!
//! Individual operations can be made to fail for exercising degraded paths.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::bounds::format_range_bound;
use crate::partition::{ArchiveRecord, CatalogEntry, PartitionSpec, TableStats};
use crate::policy::ArchivalPolicy;
use crate::store::{CreateOutcome, PartitionStore};
use crate::{Error, Result};

/// Bytes attributed to each stored row when no explicit size is set
pub const ROW_SIZE_BYTES: i64 = 128;

/// One operational row (a study session, an activity log entry, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub user_id: String,
    pub occurred_at: DateTime<Utc>,
    pub minutes: i64,
    pub focus_score: Option<f64>,
}

#[derive(Debug, Clone)]
struct MemoryPartition {
    /// `None` for the catch-all partition
    range: Option<(NaiveDate, NaiveDate)>,
}

#[derive(Debug, Default)]
struct TableState {
    partitions: BTreeMap<String, MemoryPartition>,
    rows: Vec<ActivityRow>,
    stats_override: Option<TableStats>,
}

#[derive(Debug, Default)]
struct Failures {
    listing: HashSet<String>,
    stats: HashSet<String>,
    create: HashSet<String>,
    drop: HashSet<String>,
    archive: HashSet<String>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, TableState>,
    /// archive table name -> aggregates keyed by (user_id, year, month)
    archives: HashMap<String, BTreeMap<(String, i32, u32), ArchiveRecord>>,
    failures: Failures,
    journal: Vec<String>,
}

/// In-memory partition store
#[derive(Debug, Clone, Default)]
pub struct InMemoryPartitionStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryPartitionStore {
    /// Create an empty store with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given (unpartitioned) parent tables
    pub fn with_tables(tables: &[&str]) -> Self {
        let store = Self::new();
        for table in tables {
            store.create_table(table);
        }
        store
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| Error::Internal(format!("in-memory store lock poisoned: {}", e)))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Register a parent table
    pub fn create_table(&self, table_name: &str) {
        self.with_state(|state| {
            state.tables.entry(table_name.to_string()).or_default();
        });
    }

    /// Attach a catch-all partition without date bounds
    pub fn add_default_partition(&self, table_name: &str, partition_name: &str) {
        self.with_state(|state| {
            state
                .tables
                .entry(table_name.to_string())
                .or_default()
                .partitions
                .insert(partition_name.to_string(), MemoryPartition { range: None });
        });
    }

    /// Append an operational row to a table
    pub fn insert_row(&self, table_name: &str, row: ActivityRow) {
        self.with_state(|state| {
            state
                .tables
                .entry(table_name.to_string())
                .or_default()
                .rows
                .push(row);
        });
    }

    /// Report fixed stats for a table instead of deriving them from its rows
    pub fn set_table_stats(&self, table_name: &str, stats: TableStats) {
        self.with_state(|state| {
            state
                .tables
                .entry(table_name.to_string())
                .or_default()
                .stats_override = Some(stats);
        });
    }

    /// Make `list_partitions` fail for a table
    pub fn fail_listing(&self, table_name: &str) {
        self.with_state(|state| state.failures.listing.insert(table_name.to_string()));
    }

    /// Make `table_stats` fail for a table
    pub fn fail_stats(&self, table_name: &str) {
        self.with_state(|state| state.failures.stats.insert(table_name.to_string()));
    }

    /// Make `create_partition` fail for a partition name
    pub fn fail_create(&self, partition_name: &str) {
        self.with_state(|state| state.failures.create.insert(partition_name.to_string()));
    }

    /// Make `drop_partition` fail for a partition name
    pub fn fail_drop(&self, partition_name: &str) {
        self.with_state(|state| state.failures.drop.insert(partition_name.to_string()));
    }

    /// Make `archive_monthly` fail for a source table
    pub fn fail_archive(&self, table_name: &str) {
        self.with_state(|state| state.failures.archive.insert(table_name.to_string()));
    }

    /// Remove every injected failure
    pub fn clear_failures(&self) {
        self.with_state(|state| state.failures = Failures::default());
    }

    /// Names of all partitions of a table, sorted
    pub fn partition_names(&self, table_name: &str) -> Vec<String> {
        self.with_state(|state| {
            state
                .tables
                .get(table_name)
                .map(|t| t.partitions.keys().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Number of rows currently stored in a table
    pub fn row_count(&self, table_name: &str) -> usize {
        self.with_state(|state| state.tables.get(table_name).map_or(0, |t| t.rows.len()))
    }

    /// Archived aggregates for a policy, ordered by `(user_id, year, month)`
    pub fn archive_records(&self, policy: &ArchivalPolicy) -> Vec<ArchiveRecord> {
        self.with_state(|state| {
            state
                .archives
                .get(&policy.archive_table_name())
                .map(|records| records.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Successful mutating operations in the order they were applied
    /// (`create:<partition>`, `drop:<partition>`, `archive:<table>`)
    pub fn journal(&self) -> Vec<String> {
        self.with_state(|state| state.journal.clone())
    }
}

fn rows_in_range<'a>(
    rows: &'a [ActivityRow],
    start: NaiveDate,
    end: NaiveDate,
) -> impl Iterator<Item = &'a ActivityRow> {
    rows.iter().filter(move |row| {
        let day = row.occurred_at.date_naive();
        day >= start && day < end
    })
}

#[async_trait]
impl PartitionStore for InMemoryPartitionStore {
    async fn partition_exists(&self, table_name: &str, partition_name: &str) -> Result<bool> {
        let state = self.state()?;
        Ok(state
            .tables
            .get(table_name)
            .is_some_and(|t| t.partitions.contains_key(partition_name)))
    }

    async fn create_partition(&self, spec: &PartitionSpec) -> Result<CreateOutcome> {
        let mut state = self.state()?;

        if state.failures.create.contains(&spec.partition_name) {
            return Err(Error::Store(format!(
                "could not obtain lock on relation \"{}\"",
                spec.table_name
            )));
        }

        let table = state
            .tables
            .get_mut(&spec.table_name)
            .ok_or_else(|| Error::TableNotFound(spec.table_name.clone()))?;

        if table.partitions.contains_key(&spec.partition_name) {
            debug!("Partition {} already exists", spec.partition_name);
            return Ok(CreateOutcome::AlreadyExists);
        }

        let overlapping = table.partitions.iter().find(|(_, p)| {
            p.range
                .is_some_and(|(start, end)| spec.start_date < end && start < spec.end_date)
        });
        if let Some((name, _)) = overlapping {
            return Err(Error::Store(format!(
                "partition \"{}\" would overlap partition \"{}\"",
                spec.partition_name, name
            )));
        }

        table.partitions.insert(
            spec.partition_name.clone(),
            MemoryPartition {
                range: Some((spec.start_date, spec.end_date)),
            },
        );
        state.journal.push(format!("create:{}", spec.partition_name));

        Ok(CreateOutcome::Created)
    }

    async fn list_partitions(&self, table_name: &str) -> Result<Vec<CatalogEntry>> {
        let state = self.state()?;

        if state.failures.listing.contains(table_name) {
            return Err(Error::Store(format!(
                "catalog query failed for \"{}\"",
                table_name
            )));
        }

        let Some(table) = state.tables.get(table_name) else {
            return Ok(Vec::new());
        };

        let entries = table
            .partitions
            .iter()
            .map(|(name, partition)| match partition.range {
                Some((start, end)) => {
                    let rows = rows_in_range(&table.rows, start, end).count() as i64;
                    CatalogEntry {
                        partition_name: name.clone(),
                        bound_expression: Some(format_range_bound(start, end)),
                        row_count: Some(rows),
                        size_bytes: Some(rows * ROW_SIZE_BYTES),
                    }
                }
                None => CatalogEntry {
                    partition_name: name.clone(),
                    bound_expression: Some("DEFAULT".to_string()),
                    row_count: None,
                    size_bytes: None,
                },
            })
            .collect();

        Ok(entries)
    }

    async fn drop_partition(&self, table_name: &str, partition_name: &str) -> Result<()> {
        let mut state = self.state()?;

        if state.failures.drop.contains(partition_name) {
            return Err(Error::Store(format!(
                "cannot drop table \"{}\" because other objects depend on it",
                partition_name
            )));
        }

        let Some(table) = state.tables.get_mut(table_name) else {
            return Ok(());
        };

        if let Some(partition) = table.partitions.remove(partition_name) {
            if let Some((start, end)) = partition.range {
                table.rows.retain(|row| {
                    let day = row.occurred_at.date_naive();
                    day < start || day >= end
                });
            }
            state.journal.push(format!("drop:{}", partition_name));
        }

        Ok(())
    }

    async fn table_stats(&self, table_name: &str) -> Result<TableStats> {
        let state = self.state()?;

        if state.failures.stats.contains(table_name) {
            return Err(Error::Store(format!(
                "statistics unavailable for \"{}\"",
                table_name
            )));
        }

        let table = state
            .tables
            .get(table_name)
            .ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;

        if let Some(stats) = table.stats_override {
            return Ok(stats);
        }

        let rows = table.rows.len() as i64;
        Ok(TableStats {
            row_count: rows,
            size_bytes: rows * ROW_SIZE_BYTES,
        })
    }

    async fn archive_monthly(&self, policy: &ArchivalPolicy, cutoff: NaiveDate) -> Result<u64> {
        let mut state = self.state()?;

        if state.failures.archive.contains(&policy.table_name) {
            return Err(Error::Store(format!(
                "archive upsert failed for \"{}\"",
                policy.table_name
            )));
        }

        let table = state
            .tables
            .get(&policy.table_name)
            .ok_or_else(|| Error::TableNotFound(policy.table_name.clone()))?;

        let mut aggregates: BTreeMap<(String, i32, u32), Vec<&ActivityRow>> = BTreeMap::new();
        for row in table.rows.iter().filter(|r| r.occurred_at.date_naive() < cutoff) {
            let key = (
                row.user_id.clone(),
                row.occurred_at.year(),
                row.occurred_at.month(),
            );
            aggregates.entry(key).or_default().push(row);
        }

        let records: Vec<ArchiveRecord> = aggregates
            .into_iter()
            .filter_map(|((user_id, year, month), rows)| {
                let last_activity = rows.iter().map(|r| r.occurred_at).max()?;
                let scores: Vec<f64> = rows.iter().filter_map(|r| r.focus_score).collect();
                let average_focus_score = if scores.is_empty() {
                    None
                } else {
                    Some(scores.iter().sum::<f64>() / scores.len() as f64)
                };
                Some(ArchiveRecord {
                    user_id,
                    year,
                    month,
                    total_minutes: rows.iter().map(|r| r.minutes).sum(),
                    session_count: rows.len() as i64,
                    average_focus_score,
                    last_activity,
                })
            })
            .collect();

        let archive = state.archives.entry(policy.archive_table_name()).or_default();
        let mut inserted = 0u64;
        for record in records {
            let key = (record.user_id.clone(), record.year, record.month);
            if let std::collections::btree_map::Entry::Vacant(slot) = archive.entry(key) {
                slot.insert(record);
                inserted += 1;
            }
        }

        state.journal.push(format!("archive:{}", policy.table_name));
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::parse_range_bound;
    use crate::policy::ArchiveColumns;
    use chrono::TimeZone;

    fn bound_of(entry: &CatalogEntry) -> Option<(NaiveDate, NaiveDate)> {
        entry
            .bound_expression
            .as_deref()
            .and_then(parse_range_bound)
            .map(|b| (b.start, b.end))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(user: &str, y: i32, m: u32, d: u32, minutes: i64, focus: Option<f64>) -> ActivityRow {
        ActivityRow {
            user_id: user.to_string(),
            occurred_at: Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap(),
            minutes,
            focus_score: focus,
        }
    }

    fn policy() -> ArchivalPolicy {
        ArchivalPolicy {
            table_name: "StudySession".to_string(),
            enabled: true,
            horizon_days: 365,
            columns: ArchiveColumns::default(),
        }
    }

    #[tokio::test]
    async fn test_create_partition_is_conditional() {
        let store = InMemoryPartitionStore::with_tables(&["StudySession"]);
        let spec = PartitionSpec::for_month("StudySession", date(2025, 3, 1)).unwrap();

        assert_eq!(store.create_partition(&spec).await.unwrap(), CreateOutcome::Created);
        assert_eq!(
            store.create_partition(&spec).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(store.partition_names("StudySession"), vec!["StudySession_2025_03"]);
    }

    #[tokio::test]
    async fn test_create_partition_requires_parent() {
        let store = InMemoryPartitionStore::new();
        let spec = PartitionSpec::for_month("Missing", date(2025, 3, 1)).unwrap();
        let result = store.create_partition(&spec).await;
        assert!(matches!(result, Err(Error::TableNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_partition_rejects_overlap() {
        let store = InMemoryPartitionStore::with_tables(&["StudySession"]);
        let spec = PartitionSpec::for_month("StudySession", date(2025, 3, 1)).unwrap();
        store.create_partition(&spec).await.unwrap();

        let clash = PartitionSpec {
            partition_name: "StudySession_custom".to_string(),
            ..spec
        };
        assert!(matches!(
            store.create_partition(&clash).await,
            Err(Error::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_catalog_entries_render_bounds() {
        let store = InMemoryPartitionStore::with_tables(&["StudySession"]);
        store.add_default_partition("StudySession", "StudySession_default");
        let spec = PartitionSpec::for_month("StudySession", date(2025, 3, 1)).unwrap();
        store.create_partition(&spec).await.unwrap();
        store.insert_row("StudySession", row("u1", 2025, 3, 5, 30, None));

        let entries = store.list_partitions("StudySession").await.unwrap();
        assert_eq!(entries.len(), 2);

        let dated = entries
            .iter()
            .find(|e| e.partition_name == "StudySession_2025_03")
            .unwrap();
        assert_eq!(bound_of(dated), Some((date(2025, 3, 1), date(2025, 4, 1))));
        assert_eq!(dated.row_count, Some(1));

        let default = entries
            .iter()
            .find(|e| e.partition_name == "StudySession_default")
            .unwrap();
        assert_eq!(default.bound_expression.as_deref(), Some("DEFAULT"));
        assert_eq!(bound_of(default), None);
    }

    #[tokio::test]
    async fn test_drop_partition_discards_rows() {
        let store = InMemoryPartitionStore::with_tables(&["StudySession"]);
        for month in [1, 2] {
            let spec = PartitionSpec::for_month("StudySession", date(2025, month, 1)).unwrap();
            store.create_partition(&spec).await.unwrap();
        }
        store.insert_row("StudySession", row("u1", 2025, 1, 5, 30, None));
        store.insert_row("StudySession", row("u1", 2025, 2, 5, 30, None));

        store
            .drop_partition("StudySession", "StudySession_2025_01")
            .await
            .unwrap();
        // Dropping twice is fine
        store
            .drop_partition("StudySession", "StudySession_2025_01")
            .await
            .unwrap();

        assert_eq!(store.row_count("StudySession"), 1);
        assert_eq!(store.journal().iter().filter(|op| op.starts_with("drop:")).count(), 1);
    }

    #[tokio::test]
    async fn test_table_stats_derived_and_overridden() {
        let store = InMemoryPartitionStore::with_tables(&["ActivityLog"]);
        store.insert_row("ActivityLog", row("u1", 2025, 1, 5, 1, None));
        store.insert_row("ActivityLog", row("u2", 2025, 1, 6, 1, None));

        let stats = store.table_stats("ActivityLog").await.unwrap();
        assert_eq!(stats.row_count, 2);
        assert_eq!(stats.size_bytes, 2 * ROW_SIZE_BYTES);

        store.set_table_stats(
            "ActivityLog",
            TableStats {
                row_count: 99,
                size_bytes: 1,
            },
        );
        assert_eq!(store.table_stats("ActivityLog").await.unwrap().row_count, 99);
        assert!(matches!(
            store.table_stats("Missing").await,
            Err(Error::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_archive_monthly_aggregates_and_never_overwrites() {
        let store = InMemoryPartitionStore::with_tables(&["StudySession"]);
        store.insert_row("StudySession", row("u1", 2023, 5, 1, 30, Some(80.0)));
        store.insert_row("StudySession", row("u1", 2023, 5, 20, 60, Some(60.0)));
        store.insert_row("StudySession", row("u2", 2023, 5, 3, 15, None));
        store.insert_row("StudySession", row("u1", 2024, 8, 1, 45, Some(90.0)));

        let inserted = store.archive_monthly(&policy(), date(2024, 1, 1)).await.unwrap();
        assert_eq!(inserted, 2);

        let records = store.archive_records(&policy());
        assert_eq!(records.len(), 2);
        let u1 = &records[0];
        assert_eq!((u1.user_id.as_str(), u1.year, u1.month), ("u1", 2023, 5));
        assert_eq!(u1.total_minutes, 90);
        assert_eq!(u1.session_count, 2);
        assert_eq!(u1.average_focus_score, Some(70.0));
        assert_eq!(u1.last_activity, Utc.with_ymd_and_hms(2023, 5, 20, 10, 0, 0).unwrap());
        assert_eq!(records[1].average_focus_score, None);

        // A late row for an archived month does not rewrite the aggregate
        store.insert_row("StudySession", row("u1", 2023, 5, 25, 500, Some(10.0)));
        let inserted = store.archive_monthly(&policy(), date(2024, 1, 1)).await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(store.archive_records(&policy())[0].total_minutes, 90);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryPartitionStore::with_tables(&["StudySession"]);
        store.fail_listing("StudySession");
        store.fail_stats("StudySession");
        store.fail_archive("StudySession");

        assert!(store.list_partitions("StudySession").await.is_err());
        assert!(store.table_stats("StudySession").await.is_err());
        assert!(store.archive_monthly(&policy(), date(2024, 1, 1)).await.is_err());

        store.clear_failures();
        assert!(store.list_partitions("StudySession").await.is_ok());
    }
}
