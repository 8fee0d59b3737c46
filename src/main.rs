//! CLI entry point for the extraction tool.

use anyhow::{Result, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gamesearch_extract::config::ExtractConfig;
use gamesearch_extract::extract::FetchOptions;
use gamesearch_extract::runner;
use gamesearch_extract::sink::DirSink;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    if !args.rate.is_finite() || args.rate <= 0.0 {
        bail!("--rate must be a positive number of requests per second");
    }

    let mut config = ExtractConfig::from_env()?;
    if let Some(api_url) = args.api_url {
        config.api_base = api_url;
    }
    if let Some(auth_url) = args.auth_url {
        config.auth_url = auth_url;
    }
    config.rate_per_sec = args.rate;
    config.burst = args.burst;
    config.fetch = FetchOptions {
        workers: usize::from(args.workers),
        page_limit: usize::from(args.page_limit),
        max_pages: args.max_pages,
    };

    info!(
        workers = config.fetch.workers,
        page_limit = config.fetch.page_limit,
        rate_per_sec = config.rate_per_sec,
        output_dir = %args.output_dir.display(),
        "extraction starting"
    );

    let sink = DirSink::new(&args.output_dir);

    // Ctrl-C flips the token; workers drain and the run reports partial results.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; draining workers");
            signal_cancel.cancel();
        }
    });

    let summary = runner::run(&config, &sink, &cancel).await?;

    for kind in summary.kinds() {
        info!(
            kind = kind.kind,
            records = kind.records,
            pages_failed = kind.pages_failed,
            uploaded = kind.uploaded,
            "collection finished"
        );
    }
    info!(total_records = summary.total_records(), "extraction complete");

    if !summary.fully_uploaded() {
        bail!("one or more collections failed to upload");
    }

    Ok(())
}
