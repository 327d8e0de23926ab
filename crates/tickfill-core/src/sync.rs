//! # Historical sync workflow
//!
//! A run walks `Planned -> Fetching(window) -> Upserting(date) -> ... -> Done`.
//! Windows are processed strictly in ascending order and dates within a
//! window ascending, one at a time.
//!
//! | Failure | Effect |
//! |---------|--------|
//! | [`FetchError`](crate::fetcher::FetchError) | window recorded as failed, run continues with the next window |
//! | [`PersistError`](crate::upserter::PersistError) | date marked failed in the ledger, run continues with the next date |
//! | ledger or run log write | run aborts in `Failed` |
//!
//! A rolling run first consults the ledger and does nothing when the latest
//! successful date already covers the requested end, unless forced.

use std::fmt::{Display, Formatter};

use serde::Serialize;
use thiserror::Error;
use tickfill_warehouse::{WarehouseError, WindowLogEntry, WindowLogStatus};
use time::Date;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::date::iso_date;
use crate::domain::format_iso_date;
use crate::fetcher::RemoteFetcher;
use crate::ledger::SyncLedger;
use crate::planner::{rolling_start, DateRangePlanner, DateWindow};
use crate::store::SyncStore;
use crate::upserter::{upsert_date, DateOutcome};
use crate::InvalidRangeError;

pub const DEFAULT_BATCH_SIZE: u32 = 7;
pub const DEFAULT_ROLLING_DAYS: u32 = 7;

/// How the requested range was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Explicit start and end dates.
    Backfill,
    /// The last N days ending on a given day.
    Rolling,
}

/// Parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub mode: SyncMode,
    pub start: Date,
    pub end: Date,
    pub batch_size: u32,
    pub force: bool,
}

impl SyncRequest {
    pub fn backfill(start: Date, end: Date) -> Self {
        Self {
            mode: SyncMode::Backfill,
            start,
            end,
            batch_size: DEFAULT_BATCH_SIZE,
            force: false,
        }
    }

    /// The `days` calendar days ending on (and including) `end`.
    pub fn rolling(end: Date, days: u32) -> Result<Self, InvalidRangeError> {
        Ok(Self {
            mode: SyncMode::Rolling,
            start: rolling_start(end, days)?,
            end,
            batch_size: DEFAULT_BATCH_SIZE,
            force: false,
        })
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Skip the ledger check of a rolling run.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn planner(&self) -> Result<DateRangePlanner, InvalidRangeError> {
        DateRangePlanner::new(self.start, self.end, self.batch_size)
    }
}

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Planned,
    Fetching {
        window: DateWindow,
    },
    Upserting {
        #[serde(with = "iso_date")]
        date: Date,
    },
    Done,
    Failed,
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planned => f.write_str("planned"),
            Self::Fetching { window } => write!(f, "fetching {window}"),
            Self::Upserting { date } => write!(f, "upserting {}", format_iso_date(*date)),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Whether the window's single request produced usable rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WindowFetch {
    Fetched {
        rows: usize,
        out_of_window: usize,
        latency_ms: u64,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowOutcome {
    pub window: DateWindow,
    pub fetch: WindowFetch,
    /// Empty when the fetch failed.
    pub dates: Vec<DateOutcome>,
}

impl WindowOutcome {
    pub fn fetched(&self) -> bool {
        matches!(self.fetch, WindowFetch::Fetched { .. })
    }
}

/// Everything a finished run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub mode: SyncMode,
    pub requested: DateWindow,
    pub state: RunState,
    /// Set when a rolling run found the ledger already covering the range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_to_date_through: Option<String>,
    pub windows: Vec<WindowOutcome>,
}

impl SyncReport {
    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date_through.is_some()
    }

    /// Every window fetched and every date persisted.
    pub fn succeeded(&self) -> bool {
        self.windows
            .iter()
            .all(|window| window.fetched() && window.dates.iter().all(|date| date.success))
    }

    pub fn failed_windows(&self) -> impl Iterator<Item = &WindowOutcome> {
        self.windows.iter().filter(|window| !window.fetched())
    }

    pub fn failed_dates(&self) -> impl Iterator<Item = &DateOutcome> {
        self.windows
            .iter()
            .flat_map(|window| window.dates.iter())
            .filter(|date| !date.success)
    }

    pub fn dates_synced(&self) -> usize {
        self.windows
            .iter()
            .flat_map(|window| window.dates.iter())
            .filter(|date| date.success)
            .count()
    }

    pub fn rows_written(&self) -> usize {
        self.windows
            .iter()
            .flat_map(|window| window.dates.iter())
            .map(|date| date.rows_written)
            .sum()
    }
}

/// Live progress hooks. Every method defaults to doing nothing.
pub trait SyncObserver {
    fn state_changed(&mut self, _state: &RunState) {}

    fn window_finished(&mut self, _outcome: &WindowOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),
    #[error("ledger check failed: {0}")]
    Ledger(#[source] WarehouseError),
    #[error("run {run_id} aborted while {state}: {source}")]
    Aborted {
        run_id: String,
        state: RunState,
        #[source]
        source: WarehouseError,
    },
}

/// Drives planner, fetcher, upserter and ledger for one run at a time.
pub struct HistoricalSync<S> {
    fetcher: RemoteFetcher,
    store: S,
}

impl<S: SyncStore> HistoricalSync<S> {
    pub fn new(fetcher: RemoteFetcher, store: S) -> Self {
        Self { fetcher, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute `request` to completion.
    ///
    /// Fetch and persist failures are reported in the returned
    /// [`SyncReport`]; only an invalid request, a failed ledger check, or a
    /// failed ledger/log write return `Err`.
    pub async fn run(
        &self,
        request: SyncRequest,
        observer: &mut dyn SyncObserver,
    ) -> Result<SyncReport, SyncError> {
        let planner = request.planner()?;
        let requested = DateWindow::new(request.start, request.end)?;
        let run_id = Uuid::new_v4().to_string();

        let span = info_span!("sync_run", run_id = %run_id, mode = ?request.mode, range = %requested);
        self.execute(request, planner, requested, run_id, observer)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        request: SyncRequest,
        planner: DateRangePlanner,
        requested: DateWindow,
        run_id: String,
        observer: &mut dyn SyncObserver,
    ) -> Result<SyncReport, SyncError> {
        let ledger = SyncLedger::new(&self.store);

        if request.mode == SyncMode::Rolling && !request.force {
            if let Some(latest) = ledger.covering(request.end).map_err(SyncError::Ledger)? {
                let latest = format_iso_date(latest);
                info!(latest = %latest, "ledger already covers the requested range");
                return Ok(SyncReport {
                    run_id,
                    mode: request.mode,
                    requested,
                    state: RunState::Done,
                    up_to_date_through: Some(latest),
                    windows: Vec::new(),
                });
            }
        }

        let mut state = RunState::Planned;
        observer.state_changed(&state);
        info!(
            windows = planner.len(),
            batch_size = planner.batch_size(),
            "planned sync run"
        );

        let mut windows = Vec::with_capacity(planner.len());
        for window in planner {
            state = RunState::Fetching { window };
            observer.state_changed(&state);

            let window_start = format_iso_date(window.start());
            let window_end = format_iso_date(window.end());

            let outcome = match self.fetcher.fetch(window).await {
                Err(fetch_error) => {
                    let message = fetch_error.to_string();
                    warn!(window = %window, error = %message, "window fetch failed");
                    self.store
                        .log_window(&WindowLogEntry {
                            run_id: &run_id,
                            window_start: &window_start,
                            window_end: &window_end,
                            status: WindowLogStatus::FetchFailed,
                            row_count: 0,
                            latency_ms: None,
                            message: Some(&message),
                        })
                        .map_err(|source| abort(&run_id, state, source, &mut *observer))?;

                    WindowOutcome {
                        window,
                        fetch: WindowFetch::Failed { error: message },
                        dates: Vec::new(),
                    }
                }
                Ok(payload) => {
                    let out_of_window = payload.out_of_window();
                    if out_of_window > 0 {
                        warn!(window = %window, out_of_window, "ignoring rows dated outside the window");
                    }
                    debug!(
                        window = %window,
                        rows = payload.rows.len(),
                        latency_ms = payload.latency_ms,
                        "window fetched"
                    );

                    let mut dates = Vec::new();
                    for date in window.dates() {
                        state = RunState::Upserting { date };
                        observer.state_changed(&state);

                        let result = match upsert_date(&self.store, &run_id, &payload, date) {
                            Err(persist_error) if persist_error.source.is_connection_failure() => {
                                return Err(abort(
                                    &run_id,
                                    state,
                                    persist_error.source,
                                    &mut *observer,
                                ));
                            }
                            result => result,
                        };
                        if let Err(persist_error) = &result {
                            warn!(error = %persist_error, "date not persisted");
                        }
                        let outcome = DateOutcome::from_result(date, &result);
                        ledger
                            .record(date, outcome.success, outcome.rows_written)
                            .map_err(|source| abort(&run_id, state, source, &mut *observer))?;
                        debug!(
                            date = %format_iso_date(date),
                            success = outcome.success,
                            rows = outcome.rows_written,
                            "ledger marker written"
                        );
                        dates.push(outcome);
                    }

                    let written = dates.iter().map(|date| date.rows_written).sum();
                    self.store
                        .log_window(&WindowLogEntry {
                            run_id: &run_id,
                            window_start: &window_start,
                            window_end: &window_end,
                            status: WindowLogStatus::Ok,
                            row_count: written,
                            latency_ms: Some(payload.latency_ms),
                            message: None,
                        })
                        .map_err(|source| abort(&run_id, state, source, &mut *observer))?;

                    WindowOutcome {
                        window,
                        fetch: WindowFetch::Fetched {
                            rows: payload.rows.len(),
                            out_of_window,
                            latency_ms: payload.latency_ms,
                        },
                        dates,
                    }
                }
            };

            observer.window_finished(&outcome);
            windows.push(outcome);
        }

        state = RunState::Done;
        observer.state_changed(&state);

        let report = SyncReport {
            run_id,
            mode: request.mode,
            requested,
            state,
            up_to_date_through: None,
            windows,
        };
        info!(
            succeeded = report.succeeded(),
            dates_synced = report.dates_synced(),
            rows_written = report.rows_written(),
            failed_windows = report.failed_windows().count(),
            failed_dates = report.failed_dates().count(),
            "sync run finished"
        );
        Ok(report)
    }
}

fn abort(
    run_id: &str,
    state: RunState,
    source: WarehouseError,
    observer: &mut dyn SyncObserver,
) -> SyncError {
    error!(state = %state, error = %source, "aborting sync run");
    observer.state_changed(&RunState::Failed);
    SyncError::Aborted {
        run_id: run_id.to_owned(),
        state,
        source,
    }
}
