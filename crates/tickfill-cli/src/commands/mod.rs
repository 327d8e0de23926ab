mod backfill;
mod status;
mod sync;

use std::sync::Arc;

use tickfill_core::{
    FetcherConfig, FetcherSettings, HistoricalSync, ReqwestHttpClient, RemoteFetcher,
    SyncRequest, Warehouse, WarehouseConfig,
};
use tracing::info;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{self, Progress};

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Backfill(args) => backfill::run(cli, args).await,
        Command::Sync(args) => sync::run(cli, args).await,
        Command::Status(args) => status::run(cli, args),
    }
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let warehouse = match &cli.db_path {
        Some(path) => Warehouse::open(WarehouseConfig::with_db_path(path))?,
        None => Warehouse::open_default()?,
    };
    Ok(warehouse)
}

/// Environment settings overridden by any flags given on the command line.
fn fetcher_config(cli: &Cli) -> Result<FetcherConfig, CliError> {
    let flags = FetcherSettings {
        endpoint: cli.endpoint.clone(),
        api_key: cli.api_key.clone(),
        api_key_header: cli.api_key_header.clone(),
        timeout_ms: cli.timeout_ms,
        max_requests_per_minute: cli.max_requests_per_minute,
    };
    Ok(FetcherSettings::from_env()?.merge(flags).build()?)
}

/// Run `request` against the configured endpoint and store, then report.
async fn execute(cli: &Cli, request: SyncRequest) -> Result<(), CliError> {
    request.planner()?;
    let config = fetcher_config(cli)?;
    let warehouse = open_warehouse(cli)?;
    info!(db_path = %warehouse.db_path().display(), "opened warehouse");

    let fetcher = RemoteFetcher::new(config, Arc::new(ReqwestHttpClient::new()));
    let sync = HistoricalSync::new(fetcher, warehouse);
    let mut progress = Progress::new(cli.format);

    let report = match sync.run(request, &mut progress).await {
        Ok(report) => report,
        Err(error) => {
            output::render_aborted(cli.format)?;
            return Err(error.into());
        }
    };

    output::render_report(&report, cli.format, cli.pretty)?;
    if report.succeeded() {
        Ok(())
    } else {
        Err(CliError::SyncFailed {
            failed_windows: report.failed_windows().count(),
            failed_dates: report.failed_dates().count(),
        })
    }
}
