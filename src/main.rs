// ABOUTME: CLI entry point for pg-mirror
// ABOUTME: Parses commands, sets up logging and TLS, then runs sync passes

use anyhow::Context;
use clap::{Parser, Subcommand};
use pg_mirror::destination::{DestinationReader, LocalDestination};
use pg_mirror::sync::SyncDaemon;
use pg_mirror::SyncConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pg-mirror")]
#[command(about = "Mirror PostgreSQL schemas and tables into a columnar table store", long_about = None)]
#[command(version)]
struct Cli {
    /// Allow self-signed TLS certificates (insecure - use only for testing)
    #[arg(
        long = "allow-self-signed-certs",
        global = true,
        default_value_t = false
    )]
    allow_self_signed_certs: bool,
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror the source database into the store, once or on an interval
    Sync {
        /// PostgreSQL connection URL of the source database
        #[arg(long = "pg-database-url", env = "PG_DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,
        /// Tables to mirror: "*" or comma-separated table names
        #[arg(long = "only-tables", env = "PG_ONLY_TABLES")]
        only_tables: Option<String>,
        /// Prefix added to every destination schema name
        #[arg(long = "pg-schema-prefix", env = "PG_SCHEMA_PREFIX")]
        schema_prefix: Option<String>,
        /// Interval between passes (e.g. 1h, 30m, 1m30s)
        #[arg(long = "pg-sync-interval", env = "PG_SYNC_INTERVAL")]
        sync_interval: Option<String>,
        /// Maximum rows per batch handed to the store
        #[arg(long = "max-batch-rows")]
        max_batch_rows: Option<usize>,
        /// Root directory of the local store
        #[arg(long = "storage-path", env = "STORAGE_PATH", default_value = "iceberg")]
        storage_path: PathBuf,
        /// Run a single pass even when an interval is configured
        #[arg(long)]
        once: bool,
    },
    /// List the schemas and tables currently in the store
    List {
        /// Root directory of the local store
        #[arg(long = "storage-path", env = "STORAGE_PATH", default_value = "iceberg")]
        storage_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Export dirs left behind by killed processes
    if let Err(e) = pg_mirror::utils::cleanup_stale_temp_dirs(86400) {
        tracing::warn!("Failed to clean up stale temp directories: {}", e);
    }

    pg_mirror::postgres::init_tls_policy(cli.allow_self_signed_certs);

    match cli.command {
        Commands::Sync {
            database_url,
            only_tables,
            schema_prefix,
            sync_interval,
            max_batch_rows,
            storage_path,
            once,
        } => {
            let config = SyncConfig::new(
                database_url.unwrap_or_default(),
                only_tables,
                schema_prefix,
                sync_interval.as_deref(),
                max_batch_rows,
            )
            .context("Invalid sync configuration")?;

            let destination = LocalDestination::create(&storage_path)
                .await
                .with_context(|| format!("Failed to open store at {}", storage_path.display()))?;

            run_sync(config, destination, once).await
        }
        Commands::List { storage_path } => list(&storage_path).await,
    }
}

async fn run_sync(config: SyncConfig, destination: LocalDestination, once: bool) -> anyhow::Result<()> {
    let continuous = !once && config.sync_interval().is_some();
    let daemon = SyncDaemon::new(config, destination);

    if !continuous {
        let stats = daemon.run_sync_cycle().await.context("Sync failed")?;
        println!(
            "✓ Synced {} table(s), {} row(s); deleted {} schema(s) and {} table(s) in {}ms",
            stats.tables_synced,
            stats.rows_synced,
            stats.schemas_deleted,
            stats.tables_deleted,
            stats.duration_ms
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal"),
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    let report = daemon.run(shutdown_rx).await?;
    println!(
        "Stopped after {} pass(es), {} failed",
        report.passes, report.failed_passes
    );

    Ok(())
}

async fn list(storage_path: &std::path::Path) -> anyhow::Result<()> {
    let destination = LocalDestination::open(storage_path);

    let tables = destination
        .schema_tables()
        .await
        .context("Failed to list stored tables")?;

    if tables.is_empty() {
        println!("No tables in {}", storage_path.display());
        return Ok(());
    }

    for table in tables {
        match destination.read_columns(&table).await {
            Ok(columns) => println!("{} ({} columns)", table, columns.len()),
            Err(e) => {
                tracing::warn!("Failed to read columns of {}: {}", table, e);
                println!("{}", table);
            }
        }
    }

    Ok(())
}
