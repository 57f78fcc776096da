use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use relaywatch::{feed, Settings};
use relaywatch_sdk::api::{ApiConfig, ApiServer};
use relaywatch_sdk::RelayStats;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relaywatch")]
#[command(about = "Time-series statistics daemon for radio relay monitoring dashboards")]
struct Args {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address for the dashboard HTTP API (e.g., "0.0.0.0:8000")
    #[arg(short, long)]
    listen: Option<String>,

    /// Address for the NDJSON event feed (e.g., "127.0.0.1:7878")
    #[arg(short, long)]
    feed: Option<String>,

    /// Directory for the noise-floor history and store snapshots
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Export every dashboard endpoint to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Window of the export, in hours
    #[arg(long, default_value = "24", requires = "export")]
    hours: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        settings.listen = listen;
    }
    if let Some(feed) = args.feed {
        settings.feed = Some(feed);
    }
    if let Some(dir) = args.storage_dir {
        settings.storage_dir = Some(dir);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Handle export mode (non-interactive)
    if let Some(export_path) = args.export {
        return export_to_file(&settings, &export_path, args.hours);
    }

    run_daemon(settings).await
}

async fn run_daemon(settings: Settings) -> Result<()> {
    let stats = settings.stats_builder().build()?;
    let maintenance = stats.start();

    let api_config = ApiConfig::builder().listen_addr(&settings.listen).build();
    let api = ApiServer::new(api_config, stats.dashboard()).start();

    let feed_task = match settings.feed.as_deref().filter(|addr| !addr.is_empty()) {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind event feed on {}", addr))?;
            Some(tokio::spawn(feed::serve(listener, stats.recorder())))
        }
        None => None,
    };

    tracing::info!(
        listen = %settings.listen,
        storage = ?settings.storage_dir,
        "relaywatch running"
    );
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    api.abort();
    if let Some(task) = feed_task {
        task.abort();
    }
    maintenance.stop();
    stats.shutdown()?;
    Ok(())
}

/// Write a one-shot dashboard snapshot from persisted state
fn export_to_file(settings: &Settings, export_path: &Path, hours: u32) -> Result<()> {
    if settings.storage_dir.is_none() {
        bail!("--export needs a storage directory (--storage-dir or RELAYWATCH_STORAGE_DIR)");
    }
    let stats: RelayStats = settings.stats_builder().build()?;
    let snapshot = stats.dashboard().snapshot(hours);

    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(export_path, json)
        .with_context(|| format!("Failed to write {}", export_path.display()))?;

    println!("Exported dashboard data to: {}", export_path.display());
    Ok(())
}
