//! Configuration for the PostgreSQL partition store

use std::time::Duration;

/// Configuration for the PostgreSQL partition store
///
/// Pool settings control the underlying sqlx connection pool. Lifecycle
/// operations run one statement at a time, so a small pool is enough.
///
/// # Example
/// ```
/// use partkeeper_postgres::PostgresStoreConfig;
/// use std::time::Duration;
///
/// let config = PostgresStoreConfig::default()
///     .with_schema("app")
///     .with_acquire_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct PostgresStoreConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout: Duration,

    /// How long a connection can remain idle before being closed
    pub idle_timeout: Duration,

    /// Maximum lifetime of a connection
    pub max_lifetime: Duration,

    /// Schema holding the partitioned parent tables and their partitions
    pub schema: String,

    /// Count rows with `COUNT(*)` instead of planner estimates
    pub exact_row_counts: bool,
}

impl Default for PostgresStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600), // 10 minutes
            max_lifetime: Duration::from_secs(1800), // 30 minutes
            schema: "public".to_string(),
            exact_row_counts: false,
        }
    }
}

impl PostgresStoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of connections
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set minimum number of connections
    pub fn with_min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = min_connections;
        self
    }

    /// Set acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set maximum lifetime
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Set the schema of the partitioned tables
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Enable exact row counts
    pub fn with_exact_row_counts(mut self, exact: bool) -> Self {
        self.exact_row_counts = exact;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PostgresStoreConfig::default();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.schema, "public");
        assert!(!config.exact_row_counts);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PostgresStoreConfig::new()
            .with_max_connections(10)
            .with_schema("analytics")
            .with_exact_row_counts(true);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.schema, "analytics");
        assert!(config.exact_row_counts);

        // Other values should remain at defaults
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.max_lifetime, Duration::from_secs(1800));
    }
}
