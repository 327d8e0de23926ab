//! CLI argument definitions for tickfill.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `backfill` | Sync an explicit inclusive date range |
//! | `sync` | Sync the last N days ending today (UTC), skipping when already covered |
//! | `status` | Show the sync ledger and store coverage |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--endpoint` | `$TICKFILL_ENDPOINT` | URL template with `{start_date}` and `{end_date}` |
//! | `--api-key` | `$TICKFILL_API_KEY` | Credential for the endpoint |
//! | `--db-path` | `$TICKFILL_HOME/warehouse.duckdb` | Store location |
//! | `--format` | `human` | Output format (human, json) |
//! | `-v` | warn | Raise log verbosity; repeat for more |
//!
//! # Examples
//!
//! ```bash
//! tickfill backfill --start-date 2025-01-01 --end-date 2025-01-31 --batch-size 7
//! tickfill sync --days 3
//! tickfill status --format json --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tickfill_core::{parse_iso_date, DEFAULT_BATCH_SIZE, DEFAULT_ROLLING_DAYS};
use time::Date;

/// Historical market data sync into a local DuckDB store.
#[derive(Debug, Parser)]
#[command(name = "tickfill", author, version, about)]
pub struct Cli {
    /// Endpoint URL template containing `{start_date}` and `{end_date}`.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// API key for the endpoint. Sent as a bearer token unless
    /// `--api-key-header` names another header.
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Header that carries the API key.
    #[arg(long, global = true)]
    pub api_key_header: Option<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Pace window fetches to at most this many per minute.
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_requests_per_minute: Option<u32>,

    /// DuckDB file to sync into.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    /// `RUST_LOG` takes precedence when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, default_value_t = false, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per window and date, then a summary line.
    Human,
    /// The final run report as a JSON object.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync every date in an explicit inclusive range.
    Backfill(BackfillArgs),
    /// Sync the most recent days, unless the ledger already covers today.
    Sync(SyncArgs),
    /// Show ledger markers and store coverage.
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct BackfillArgs {
    /// First date to sync (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub start_date: Date,

    /// Last date to sync, inclusive (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub end_date: Date,

    /// Days per fetch window.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: u32,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Number of days ending today (UTC) to sync.
    #[arg(long, default_value_t = DEFAULT_ROLLING_DAYS, value_parser = clap::value_parser!(u32).range(1..))]
    pub days: u32,

    /// Days per fetch window.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: u32,

    /// Sync even when the ledger already covers today.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Number of recent ledger markers to show.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

fn parse_date(value: &str) -> Result<Date, String> {
    parse_iso_date(value).map_err(|error| error.to_string())
}
