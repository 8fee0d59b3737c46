//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use gamesearch_extract::extract::{DEFAULT_PAGE_LIMIT, DEFAULT_WORKERS};

/// Extract game catalog collections into local JSON artifacts.
///
/// Credentials are read from the `CLIENT_ID` and `CLIENT_SECRET` environment
/// variables; they are never accepted on the command line.
#[derive(Parser, Debug)]
#[command(name = "gamesearch-extract")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Concurrent page workers per collection (1-64)
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub workers: u8,

    /// Records requested per page (1-500, the API's ceiling)
    #[arg(short = 'l', long, default_value_t = DEFAULT_PAGE_LIMIT as u16, value_parser = clap::value_parser!(u16).range(1..=500))]
    pub page_limit: u16,

    /// Total requests per second across all workers
    #[arg(short = 'r', long, default_value_t = 4.0)]
    pub rate: f64,

    /// Rate limiter burst capacity (1-100)
    #[arg(short = 'b', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub burst: u32,

    /// Safety cap on pages fetched per collection
    #[arg(long, default_value_t = 100_000)]
    pub max_pages: usize,

    /// Directory receiving the JSON artifacts
    #[arg(short = 'o', long, default_value = "out")]
    pub output_dir: PathBuf,

    /// Catalog API base URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Token exchange endpoint URL
    #[arg(long)]
    pub auth_url: Option<String>,
}
