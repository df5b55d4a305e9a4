//! shelfdrop: uploads listing images to resumable storage.
//!
//! Every file is uploaded concurrently; the batch result is printed to
//! stdout as JSON, one entry per file in argument order. The exit status
//! is non-zero unless every upload succeeded.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use shelfdrop_transfer::Asset;
use shelfdrop_tus::{TusClient, TusConfig};
use shelfdrop_uploader::{UploadCoordinator, UploadEvent};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::CliConfig;

/// Upload images to a resumable storage bucket.
#[derive(Parser, Debug)]
#[command(name = "shelfdrop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Image files, in listing order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Target bucket.
    #[arg(short, long)]
    bucket: String,

    /// Object name prefix (e.g. a listing id).
    #[arg(long)]
    prefix: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/shelfdrop/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Storage base URL; overrides config and SHELFDROP_URL.
    #[arg(long)]
    url: Option<String>,

    /// Bearer credential; overrides config and SHELFDROP_KEY.
    #[arg(long)]
    key: Option<String>,

    /// Chunk size in bytes.
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Pretty-print the JSON result.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout carries only the JSON result.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,shelfdrop=debug")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = CliConfig::load(cli.config.as_deref())?;
    cfg.apply_env(|key| std::env::var(key).ok());
    cfg.apply_flags(cli.url, cli.key, cli.chunk_size);
    cfg.uploader.validate()?;
    anyhow::ensure!(
        !cfg.base_url.trim().is_empty(),
        "no storage URL configured (set baseUrl, {} or --url)",
        config::ENV_URL
    );

    let client = TusClient::new(TusConfig::new(&cfg.base_url, &cfg.credential))
        .context("creating storage client")?;

    let mut assets = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let mut asset = Asset::from_path(path, &cli.bucket)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        if let Some(prefix) = &cli.prefix {
            let name = format!("{}/{}", prefix.trim_matches('/'), asset.object_name);
            asset = asset.with_object_name(name);
        }
        assets.push(asset);
    }

    let mut coordinator = UploadCoordinator::new(Arc::new(client), cfg.uploader);
    let reporter = coordinator
        .take_events()
        .map(|rx| tokio::spawn(report_progress(rx)));

    let cancel = coordinator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling uploads");
            cancel.cancel();
        }
    });

    let results = coordinator.submit_batch(assets).await;
    drop(coordinator);
    if let Some(reporter) = reporter {
        let _ = reporter.await;
    }

    let json = if cli.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{json}");

    if results.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(
            failed = results.failed_count(),
            total = results.len(),
            "not every image uploaded; the listing should not be created"
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Logs batch events until every session has finished.
async fn report_progress(mut rx: mpsc::Receiver<UploadEvent>) {
    let mut last_logged: Vec<u64> = Vec::new();

    while let Some(event) = rx.recv().await {
        match &event {
            UploadEvent::Progress { index, .. } => {
                let pct = event.percentage().unwrap_or_default();
                // Log at most once per 10% step per file.
                let step = (pct / 10.0) as u64;
                if last_logged.len() <= *index {
                    last_logged.resize(index + 1, u64::MAX);
                }
                if last_logged[*index] != step {
                    last_logged[*index] = step;
                    info!(file = index, percent = pct.round() as u64, "upload progress");
                }
            }
            UploadEvent::Retrying {
                index,
                attempt,
                error,
                ..
            } => {
                warn!(file = index, attempt, error = %error, "retrying upload");
            }
            UploadEvent::Finished { index, result, .. } => match result.public_address() {
                Some(address) => info!(file = index, address, "uploaded"),
                None => warn!(file = index, result = ?result, "upload failed"),
            },
            UploadEvent::StateChanged { .. } => {}
        }
    }
}
