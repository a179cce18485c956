//! payroll-ingest - Payroll receipt batch ingestion
//!
//! Command-line front end over [`payroll_ingest::BatchDriver`]:
//! - `ingest <ARCHIVE>`: ingest a zip of receipt PDFs, print the batch result as JSON
//! - `init-db`: create the database and its tables, and a default config file
//!   if none exists
//! - `list <IDENTIFIER>`: print the ledger rows of one identifier, newest first
//! - `get <ID> --output <PATH>`: write the stored bytes of one receipt

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use payroll_common::config::{default_config_path, ensure_config_file, LoggingConfig, Settings};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for payroll-ingest
#[derive(Parser, Debug)]
#[command(name = "payroll-ingest")]
#[command(about = "Batch ingestion of payroll receipts")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Root folder for the database and local receipt storage
    #[arg(short, long, global = true, value_name = "PATH")]
    root_folder: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a zip archive of receipt PDFs
    Ingest {
        /// Path to the zip archive
        archive: PathBuf,
    },
    /// Create the database and tables if missing
    InitDb,
    /// List stored receipts of one identifier
    List {
        identifier: String,
    },
    /// Download the stored PDF of one receipt
    Get {
        /// Ledger id, as printed by `list`
        id: i64,

        /// Destination file
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::resolve(
        args.config.as_deref(),
        args.root_folder.as_deref(),
        args.database.as_deref(),
    )
    .context("Failed to resolve configuration")?;

    init_tracing(&settings.logging)?;

    info!("Starting {}", build_identity());

    settings.validate().context("Invalid configuration")?;
    info!("Database: {}", settings.database_path.display());

    let pool = payroll_common::db::init_database(&settings.database_path)
        .await
        .context("Failed to open database")?;

    match args.command {
        Command::InitDb => {
            info!("Database initialized");
            if let Some(path) = args.config.clone().or_else(default_config_path) {
                ensure_config_file(&path).context("Failed to write default configuration")?;
            }
        }
        Command::Ingest { archive } => {
            let bytes = tokio::fs::read(&archive)
                .await
                .with_context(|| format!("Failed to read archive {}", archive.display()))?;

            let driver = payroll_ingest::build_batch_driver(&settings, pool.clone())
                .context("Failed to initialize storage backend")?;

            let result = match driver.ingest_archive(&bytes).await {
                Ok(result) => result,
                Err(e) => {
                    error!("Ingestion of {} aborted: {}", archive.display(), e);
                    return Err(e.into());
                }
            };

            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::List { identifier } => {
            let receipts =
                payroll_ingest::db::receipts::list_receipts_for_identifier(&pool, &identifier)
                    .await
                    .context("Failed to list receipts")?;
            println!("{}", serde_json::to_string_pretty(&receipts)?);
        }
        Command::Get { id, output } => {
            let reader = payroll_ingest::build_receipt_reader(&settings, pool.clone())
                .context("Failed to initialize storage backend")?;

            let (record, bytes) = reader.fetch(id).await?;
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(
                "Wrote receipt {} ({}, {} bytes) to {}",
                id,
                record.file_name,
                bytes.len(),
                output.display()
            );
        }
    }

    pool.close().await;
    Ok(())
}

/// Version, revision, build time and profile of this binary
fn build_identity() -> String {
    format!(
        "payroll-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    )
}

/// Install the fmt subscriber
///
/// `RUST_LOG` wins over the configured level. With `logging.file` set, output
/// is appended to that file without ANSI colors.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid logging level")?;

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
    Ok(())
}
