//! Partkeeper - partition lifecycle manager for PostgreSQL
//!
//! Runs one lifecycle operation per invocation and prints its report as JSON.
//! Scheduling is left to cron, systemd timers or a job runner.
//!
//! Usage:
//! ```bash
//! # Make sure the next three months exist
//! partkeeper --config partkeeper.yaml provision StudySession --from 2025-01-01 --to 2025-03-31
//!
//! # Archive aging rows and drop expired partitions
//! PARTKEEPER_DATABASE_URL=postgres://localhost/studyapp partkeeper cleanup
//!
//! # Dry run against an in-memory store
//! partkeeper --in-memory health
//! ```

mod config;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::{AppConfig, LogFormat, LoggingConfig};
use partkeeper_core::{InMemoryPartitionStore, PartitionStore, PartitioningConfig};
use partkeeper_lifecycle::{LifecycleMetrics, PartitionManager};
use partkeeper_postgres::PostgresPartitionStore;
use prometheus::TextEncoder;
use serde::Serialize;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Partkeeper - monthly partition lifecycle for PostgreSQL
#[derive(Parser)]
#[command(name = "partkeeper", version)]
#[command(about = "Provision, retire, archive and report on monthly table partitions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "PARTKEEPER_CONFIG",
        global = true
    )]
    config: Option<String>,

    /// PostgreSQL connection string
    #[arg(
        long,
        value_name = "URL",
        env = "PARTKEEPER_DATABASE_URL",
        hide_env_values = true,
        global = true
    )]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Run against an empty in-memory store instead of PostgreSQL
    #[arg(long, global = true)]
    in_memory: bool,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    print_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create monthly partitions covering a date range
    Provision {
        /// Partitioned parent table
        table: String,

        /// First day to cover (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day to cover (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
    },
    /// List the dated partitions of a table
    Inspect {
        /// Partitioned parent table
        table: String,
    },
    /// Archive aging rows, then drop partitions past their retention period
    Cleanup,
    /// Extend partition coverage of tables over their capacity thresholds
    Extend,
    /// Report partition health and recommended actions
    Health,
    /// Upsert monthly aggregates without dropping anything
    Archive,
    /// Validate the partitioning configuration and print it
    ValidateConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    // Merge environment variables (they override config file)
    config.merge_env();

    // CLI flags have the highest precedence
    if let Some(url) = &cli.database_url {
        config.database.url = Some(url.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init_tracing(&config.logging)?;

    match &cli.config {
        Some(path) => info!("Loaded configuration from {}", path),
        None => info!("Using default configuration"),
    }

    config
        .partitioning
        .validate()
        .context("Invalid partitioning configuration")?;

    let store = open_store(&cli, &config).await?;
    let metrics = Arc::new(LifecycleMetrics::new()?);
    let manager = PartitionManager::new(store, config.partitioning.clone())?
        .with_metrics(metrics.clone());

    let failure = run(&manager, cli.command).await?;

    if cli.print_metrics {
        let encoded = TextEncoder::new().encode_to_string(&metrics.registry().gather())?;
        eprintln!("{}", encoded);
    }

    if let Some(message) = failure {
        anyhow::bail!(message);
    }

    Ok(())
}

/// Initialize tracing with configured level and sqlx query control
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::new(format!("{}", log_level));

    // sqlx logs every statement at INFO; keep it quiet unless asked for
    if !logging.log_sql_queries {
        match "sqlx=warn".parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Warning: Failed to set sqlx log filter: {}", e),
        }
    }

    // Reports go to stdout, logs to stderr
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }

    Ok(())
}

async fn open_store(cli: &Cli, config: &AppConfig) -> anyhow::Result<Arc<dyn PartitionStore>> {
    // Validation only reads the configuration
    if matches!(cli.command, Commands::ValidateConfig) {
        return Ok(Arc::new(memory_store(&config.partitioning)));
    }

    if cli.in_memory {
        warn!("Using an in-memory store, nothing is written to PostgreSQL");
        return Ok(Arc::new(memory_store(&config.partitioning)));
    }

    let url = config.database.url.as_deref().context(
        "No database URL configured (use --database-url, PARTKEEPER_DATABASE_URL or database.url)",
    )?;

    let store = PostgresPartitionStore::with_config(url, config.database.store_config()).await?;
    info!("Connected to PostgreSQL (schema {})", store.schema());
    Ok(Arc::new(store))
}

/// Empty parent tables for every table the configuration mentions
fn memory_store(partitioning: &PartitioningConfig) -> InMemoryPartitionStore {
    let mut tables = partitioning.monitored_tables();
    for policy in &partitioning.archival {
        if !tables.contains(&policy.table_name) {
            tables.push(policy.table_name.clone());
        }
    }

    let names: Vec<&str> = tables.iter().map(String::as_str).collect();
    InMemoryPartitionStore::with_tables(&names)
}

/// Run one command, print its report and return the aggregated failure message, if any
async fn run(manager: &PartitionManager, command: Commands) -> anyhow::Result<Option<String>> {
    match command {
        Commands::Provision { table, from, to } => {
            let report = manager.create_monthly_partitions(&table, from, to).await?;
            print_json(&report)?;
            Ok(None)
        }
        Commands::Inspect { table } => {
            let mut partitions = manager.try_get_partition_info(&table).await?;
            partitions.sort_by_key(|p| p.start_date);
            print_json(&partitions)?;
            Ok(None)
        }
        Commands::Cleanup => {
            let report = manager.cleanup_old_partitions().await;
            print_json(&report)?;
            Ok(report.error())
        }
        Commands::Extend => {
            let report = manager.check_and_extend_partitions_if_needed().await;
            print_json(&report)?;
            Ok(report.error())
        }
        Commands::Health => {
            let report = manager.get_partition_health_report().await;
            print_json(&report)?;
            Ok(None)
        }
        Commands::Archive => {
            let runs = manager.archive_expiring_rows().await;
            print_json(&runs)?;
            let errors: Vec<String> = runs
                .iter()
                .filter_map(|run| {
                    run.error
                        .as_ref()
                        .map(|e| format!("archive failed for {}: {}", run.table_name, e))
                })
                .collect();
            Ok((!errors.is_empty()).then(|| errors.join("; ")))
        }
        Commands::ValidateConfig => {
            print_json(manager.config())?;
            Ok(None)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
