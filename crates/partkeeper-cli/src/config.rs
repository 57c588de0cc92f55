use anyhow::Context;
use partkeeper_core::PartitioningConfig;
use partkeeper_postgres::PostgresStoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub partitioning: PartitioningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,

    #[serde(default = "default_false")]
    pub exact_row_counts: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Keep sqlx statement logging at the configured level instead of `warn`
    #[serde(default = "default_false")]
    pub log_sql_queries: bool,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            schema: default_schema(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
            exact_row_counts: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_sql_queries: false,
            format: LogFormat::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn store_config(&self) -> PostgresStoreConfig {
        PostgresStoreConfig::new()
            .with_max_connections(self.max_connections)
            .with_min_connections(self.min_connections)
            .with_acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .with_idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .with_max_lifetime(Duration::from_secs(self.max_lifetime_secs))
            .with_schema(self.schema.clone())
            .with_exact_row_counts(self.exact_row_counts)
    }
}

impl AppConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let expanded = shellexpand::tilde(path).to_string();
        let path = Path::new(&expanded);
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents).context("Invalid TOML config")?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents).context("Invalid YAML config")?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        // Database settings
        if let Ok(val) = std::env::var("PARTKEEPER_DATABASE_URL") {
            self.database.url = Some(val);
        } else if self.database.url.is_none()
            && let Ok(val) = std::env::var("DATABASE_URL")
        {
            self.database.url = Some(val);
        }

        if let Ok(val) = std::env::var("PARTKEEPER_SCHEMA") {
            self.database.schema = val;
        }

        if let Ok(val) = std::env::var("PARTKEEPER_MAX_CONNECTIONS")
            && let Ok(max) = val.parse::<u32>()
        {
            self.database.max_connections = max;
        }

        if let Ok(val) = std::env::var("PARTKEEPER_EXACT_ROW_COUNTS")
            && let Ok(exact) = val.parse::<bool>()
        {
            self.database.exact_row_counts = exact;
        }

        // Logging settings
        if let Ok(val) = std::env::var("PARTKEEPER_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("PARTKEEPER_LOG_SQL_QUERIES")
            && let Ok(enabled) = val.parse::<bool>()
        {
            self.logging.log_sql_queries = enabled;
        }

        if let Ok(val) = std::env::var("PARTKEEPER_LOG_FORMAT") {
            match val.to_lowercase().as_str() {
                "text" => self.logging.format = LogFormat::Text,
                "json" => self.logging.format = LogFormat::Json,
                _ => eprintln!("Warning: Invalid PARTKEEPER_LOG_FORMAT '{}', using default", val),
            }
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_max_lifetime_secs() -> u64 {
    1800
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}
