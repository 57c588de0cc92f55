//! PostgresPartitionStore - PartitionStore trait implementation for PostgreSQL
//!
//! Works with PostgreSQL declarative range partitioning (PostgreSQL 12+ for
//! `pg_partition_tree`). Parent tables must already exist, declared with
//! `PARTITION BY RANGE` on a date or timestamp column.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PostgresStoreConfig;
use crate::sql;
use partkeeper_core::{
    ArchivalPolicy, CatalogEntry, CreateOutcome, Error, PartitionSpec, PartitionStore, Result,
    TableStats,
};

/// SQLSTATE `duplicate_table`
const DUPLICATE_TABLE: &str = "42P07";
/// SQLSTATE `unique_violation`, raised by catalog races between concurrent creators
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE `undefined_table`
const UNDEFINED_TABLE: &str = "42P01";

/// PostgreSQL-backed partition store
#[derive(Clone)]
pub struct PostgresPartitionStore {
    /// PostgreSQL connection pool
    pool: Arc<PgPool>,
    schema: String,
    exact_row_counts: bool,
}

impl PostgresPartitionStore {
    /// Connect with default configuration
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    ///
    /// # Errors
    /// - `Error::Database` if the connection fails
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_config(database_url, PostgresStoreConfig::default()).await
    }

    /// Connect with custom configuration
    ///
    /// # Errors
    /// - `Error::InvalidIdentifier` if the configured schema is not a plain identifier
    /// - `Error::Database` if the connection fails
    ///
    /// # Example
    /// ```no_run
    /// # use partkeeper_postgres::{PostgresPartitionStore, PostgresStoreConfig};
    /// # async fn example() -> partkeeper_core::Result<()> {
    /// let config = PostgresStoreConfig::default().with_schema("app");
    /// let store = PostgresPartitionStore::with_config(
    ///     "postgres://localhost/studyapp",
    ///     config
    /// ).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_config(database_url: &str, config: PostgresStoreConfig) -> Result<Self> {
        sql::quote_ident(&config.schema)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect(database_url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        debug!("Connected to PostgreSQL, partitions in schema {}", config.schema);

        Ok(Self {
            pool: Arc::new(pool),
            schema: config.schema,
            exact_row_counts: config.exact_row_counts,
        })
    }

    /// Create from an existing pool (useful for testing)
    pub fn from_pool(pool: PgPool, config: &PostgresStoreConfig) -> Result<Self> {
        sql::quote_ident(&config.schema)?;
        Ok(Self {
            pool: Arc::new(pool),
            schema: config.schema.clone(),
            exact_row_counts: config.exact_row_counts,
        })
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn relation_exists(&self, table_name: &str) -> Result<bool> {
        sqlx::query_scalar(sql::RELATION_EXISTS)
            .bind(sql::qualified(&self.schema, table_name)?)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to look up {}: {}", table_name, e)))
    }

    async fn exact_count(&self, table_name: &str) -> Result<i64> {
        sqlx::query_scalar(&sql::count_rows(&self.schema, table_name)?)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count rows of {}: {}", table_name, e)))
    }
}

fn sqlstate(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

#[async_trait]
impl PartitionStore for PostgresPartitionStore {
    async fn partition_exists(&self, table_name: &str, partition_name: &str) -> Result<bool> {
        sqlx::query_scalar(sql::PARTITION_EXISTS)
            .bind(&self.schema)
            .bind(table_name)
            .bind(partition_name)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| {
                Error::Database(format!(
                    "Failed to check partition {}: {}",
                    partition_name, e
                ))
            })
    }

    async fn create_partition(&self, spec: &PartitionSpec) -> Result<CreateOutcome> {
        let statement = sql::create_partition(&self.schema, spec)?;

        match sqlx::query(&statement).execute(&*self.pool).await {
            Ok(_) => {
                info!("Created partition {}.{}", self.schema, spec.partition_name);
                Ok(CreateOutcome::Created)
            }
            Err(e) => match sqlstate(&e).as_deref() {
                Some(DUPLICATE_TABLE) | Some(UNIQUE_VIOLATION) => {
                    debug!(
                        "Partition {} already exists ({})",
                        spec.partition_name, e
                    );
                    Ok(CreateOutcome::AlreadyExists)
                }
                Some(UNDEFINED_TABLE) => Err(Error::TableNotFound(format!(
                    "{}.{}",
                    self.schema, spec.table_name
                ))),
                _ => Err(Error::Database(format!(
                    "Failed to create partition {}: {}",
                    spec.partition_name, e
                ))),
            },
        }
    }

    async fn list_partitions(&self, table_name: &str) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query(sql::LIST_PARTITIONS)
            .bind(&self.schema)
            .bind(table_name)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| {
                Error::Database(format!("Failed to list partitions of {}: {}", table_name, e))
            })?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let partition_name: String = row.get("partition_name");
            let row_count = if self.exact_row_counts {
                Some(self.exact_count(&partition_name).await?)
            } else {
                row.get("row_count")
            };

            entries.push(CatalogEntry {
                bound_expression: row.get("bound_expression"),
                row_count,
                size_bytes: row.get("size_bytes"),
                partition_name,
            });
        }

        Ok(entries)
    }

    async fn drop_partition(&self, table_name: &str, partition_name: &str) -> Result<()> {
        let statement = sql::drop_partition(&self.schema, partition_name)?;

        sqlx::query(&statement)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                Error::Database(format!(
                    "Failed to drop partition {} of {}: {}",
                    partition_name, table_name, e
                ))
            })?;

        info!("Dropped partition {}.{}", self.schema, partition_name);
        Ok(())
    }

    async fn table_stats(&self, table_name: &str) -> Result<TableStats> {
        if !self.relation_exists(table_name).await? {
            return Err(Error::TableNotFound(format!("{}.{}", self.schema, table_name)));
        }

        let row = sqlx::query(sql::TABLE_STATS)
            .bind(sql::qualified(&self.schema, table_name)?)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to read stats of {}: {}", table_name, e)))?;

        let mut stats = TableStats {
            row_count: row.get("row_count"),
            size_bytes: row.get("size_bytes"),
        };

        if self.exact_row_counts {
            stats.row_count = self.exact_count(table_name).await?;
        }

        Ok(stats)
    }

    async fn archive_monthly(&self, policy: &ArchivalPolicy, cutoff: NaiveDate) -> Result<u64> {
        if !self.relation_exists(&policy.table_name).await? {
            return Err(Error::TableNotFound(format!(
                "{}.{}",
                self.schema, policy.table_name
            )));
        }

        for statement in sql::ensure_archive_table(policy)? {
            sqlx::query(&statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| {
                    Error::Database(format!(
                        "Failed to prepare archive table for {}: {}",
                        policy.table_name, e
                    ))
                })?;
        }

        let result = sqlx::query(&sql::archive_upsert(&self.schema, policy)?)
            .bind(cutoff)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                Error::Database(format!("Failed to archive {}: {}", policy.table_name, e))
            })?;

        if result.rows_affected() == 0 {
            debug!(
                "No new monthly aggregates for {} before {}",
                policy.table_name, cutoff
            );
        }

        Ok(result.rows_affected())
    }
}
