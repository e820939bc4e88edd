// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use exportd::{
    config::AppConfig,
    export::{ExportEngine, ExportRequest},
    storage::{seed::Fixture, Storage},
};
use std::io::Read as _;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "exportd",
    about = "Filtered task export engine over an annotation task store",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config.toml
    #[arg(long, env = "EXPORTD_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Data directory for the SQLite task store (overrides config)
    #[arg(long, env = "EXPORTD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "EXPORTD_LOG")]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an export request against the task store.
    ///
    /// Reads the request JSON from --request, or stdin when omitted.
    ///
    /// Examples:
    ///   exportd query --request request.json
    ///   echo '{"project_id": 1}' | exportd query
    Query {
        /// Request JSON file (defaults to stdin)
        #[arg(long)]
        request: Option<PathBuf>,
        /// Pretty-print the response JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Load a JSON fixture of projects, users, and tasks into the store.
    ///
    /// Example:
    ///   exportd seed --fixture demo.json
    Seed {
        /// Fixture JSON file
        #[arg(long)]
        fixture: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref());

    let mut config = AppConfig::load(&args.config)?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    let storage = Storage::new_with_slow_query(
        &config.data_dir,
        &config.db_file,
        config.slow_query_ms,
    )
    .await?;

    match args.command {
        Command::Query { request, pretty } => {
            let raw = match request {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading request {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let request: ExportRequest =
                serde_json::from_str(&raw).context("malformed request JSON")?;

            let engine = ExportEngine::new(storage.pool());
            let response = engine.export(&request).await?;

            let out = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{out}");
        }
        Command::Seed { fixture } => {
            let raw = std::fs::read_to_string(&fixture)
                .with_context(|| format!("reading fixture {}", fixture.display()))?;
            let fixture = Fixture::from_json(&raw)?;
            let created = fixture.apply(&storage).await?;
            info!(tasks = created, "seed complete");
        }
    }

    Ok(())
}

fn init_tracing(level: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(level))
        .compact()
        .init();
}

/// Explicit level wins, then the RUST_LOG env filter, then "info".
fn log_filter(level: Option<&str>) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;
    match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("info"))
}
