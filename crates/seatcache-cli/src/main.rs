//! seatcache - command-line access to the seating cache.
//!
//! Every command prints JSON on stdout; logs go to stderr (and optionally to
//! daily files under `log_dir`).

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use seatcache_core::cache::{ClearScope, ReadOptions, TieredCache};
use seatcache_core::config::Config;
use seatcache_core::detector::ChangeDetector;
use seatcache_core::mapper;
use seatcache_core::models::Table;
use seatcache_core::source::{rows_from_json, CredentialStore, Credentials, RemoteDataSource};
use seatcache_core::Broadcaster;

#[derive(Parser, Debug)]
#[command(name = "seatcache")]
#[command(about = "Cached access to a tournament seating spreadsheet")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "SEATCACHE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read all tables
    Get {
        /// Sheet range, e.g. "Sheet1!A:H"
        #[arg(long)]
        range: Option<String>,
        /// Only tables in this room
        #[arg(long)]
        room: Option<String>,
        /// Skip the memory and disk tiers
        #[arg(long)]
        refresh: bool,
    },
    /// Find players by name (case-insensitive substring)
    Search {
        name: String,
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        refresh: bool,
    },
    /// Aggregate counts over all tables
    Stats {
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        refresh: bool,
    },
    /// Append tables from a JSON file to the spreadsheet
    Write { file: PathBuf },
    /// Validate tables from a JSON file without writing
    Validate { file: PathBuf },
    /// Normalize a JSON array of raw rows into tables
    Normalize { file: PathBuf },
    /// Poll for changes and print each change set as a JSON line
    Watch {
        /// Seconds between polls (overrides config)
        #[arg(long)]
        interval: Option<u64>,
        #[arg(long)]
        refresh: bool,
    },
    /// Check the configured transports
    TestConnection,
    /// Show spreadsheet title and sheet names
    Metadata,
    /// Drop cached entries
    Clear {
        #[arg(long, default_value = "all")]
        scope: ClearScope,
    },
    /// Show cache entry counts and ages
    Info,
    /// Print the effective configuration
    Config,
    /// Store spreadsheet credentials in the system keychain
    Login {
        #[arg(long, conflicts_with = "access_token", required_unless_present = "access_token")]
        api_key: Option<String>,
        #[arg(long)]
        access_token: Option<String>,
    },
    /// Remove stored credentials from the system keychain
    Logout,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "seatcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_tables(path: &Path) -> Result<Vec<Table>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse tables from {}", path.display()))
}

fn read_options(room: Option<String>, refresh: bool) -> ReadOptions {
    ReadOptions {
        force_refresh: refresh,
        room,
    }
}

fn build_cache(config: &Config) -> Result<Arc<TieredCache>> {
    let source = RemoteDataSource::new(config.source.clone())?;
    let cache = TieredCache::new(
        Arc::new(source),
        &config.cache,
        config.cache_dir()?,
        config.source.default_range.clone(),
    )?;
    Ok(Arc::new(cache))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env_overrides();

    let _guard = init_tracing(config.log_dir.as_deref());
    info!(source = %config.source.identity(), "seatcache starting");

    match cli.command {
        Command::Get { range, room, refresh } => {
            let cache = build_cache(&config)?;
            let entry = cache.get(range.as_deref(), &read_options(room, refresh)).await?;
            print_json(&entry)
        }
        Command::Search { name, room, refresh } => {
            let cache = build_cache(&config)?;
            let entry = cache.search_player(&name, &read_options(room, refresh)).await?;
            print_json(&entry)
        }
        Command::Stats { room, refresh } => {
            let cache = build_cache(&config)?;
            let entry = cache.stats(&read_options(room, refresh)).await?;
            print_json(&entry)
        }
        Command::Write { file } => {
            let tables = read_tables(&file)?;
            let cache = build_cache(&config)?;
            let outcome = cache.write(&tables).await?;
            print_json(&outcome)
        }
        Command::Validate { file } => {
            let tables = read_tables(&file)?;
            let report = mapper::validate(&tables);
            print_json(&report)?;
            if !report.valid {
                anyhow::bail!("{} validation error(s)", report.errors.len());
            }
            Ok(())
        }
        Command::Normalize { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let value: serde_json::Value = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse rows from {}", file.display()))?;
            print_json(&mapper::from_rows(&rows_from_json(&value)))
        }
        Command::Watch { interval, refresh } => {
            if let Some(secs) = interval {
                config.poll.interval_secs = secs;
            }
            config.poll.force_refresh |= refresh;
            watch(&config).await
        }
        Command::TestConnection => {
            let source = RemoteDataSource::new(config.source.clone())?;
            let report = source.test_connection().await;
            print_json(&report)?;
            if !report.success {
                anyhow::bail!("connection test failed");
            }
            Ok(())
        }
        Command::Metadata => {
            let source = RemoteDataSource::new(config.source.clone())?;
            print_json(&source.metadata().await?)
        }
        Command::Clear { scope } => {
            let cache = build_cache(&config)?;
            let removed = cache.clear(scope).await?;
            print_json(&serde_json::json!({ "scope": scope, "removed": removed }))
        }
        Command::Info => {
            let cache = build_cache(&config)?;
            print_json(&cache.info().await?)
        }
        Command::Config => print_json(&config),
        Command::Login { api_key, access_token } => {
            let credentials = match (api_key, access_token) {
                (Some(key), _) => Credentials::ApiKey(key),
                (None, Some(token)) => Credentials::AccessToken(token),
                (None, None) => anyhow::bail!("either --api-key or --access-token is required"),
            };
            CredentialStore::store(&credentials)?;
            print_json(&serde_json::json!({ "stored": credentials.kind() }))
        }
        Command::Logout => {
            CredentialStore::delete()?;
            print_json(&serde_json::json!({ "deleted": true }))
        }
    }
}

async fn watch(config: &Config) -> Result<()> {
    let cache = build_cache(config)?;
    let detector = ChangeDetector::new(
        cache,
        Broadcaster::new(config.poll.channel_capacity),
        &config.poll,
    );
    let mut changes = detector.subscribe();
    detector.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
            change = changes.recv() => {
                match change {
                    Some(change) => println!("{}", serde_json::to_string(&change)?),
                    None => break,
                }
            }
        }
    }

    detector.stop();
    Ok(())
}
