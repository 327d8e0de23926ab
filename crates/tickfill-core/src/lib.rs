//! Core workflow for tickfill.
//!
//! This crate contains:
//! - Domain models, validation and ISO date helpers
//! - The date range planner
//! - The remote fetcher and its HTTP seam
//! - Per-date upserts and the sync status ledger
//! - The historical sync run that ties them together

pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod ledger;
pub mod planner;
pub mod store;
pub mod sync;
pub mod throttling;
pub mod upserter;

pub use config::{ConfigError, FetcherConfig, FetcherSettings};
pub use domain::{format_iso_date, parse_iso_date, today_utc, StockRow, Symbol};
pub use error::{InvalidRangeError, ValidationError};
pub use fetcher::{decode_rows, FetchError, FetchedPayload, RemoteFetcher};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use ledger::SyncLedger;
pub use planner::{DateRangePlanner, DateWindow};
pub use store::SyncStore;
pub use sync::{
    HistoricalSync, NoopObserver, RunState, SyncError, SyncMode, SyncObserver, SyncReport,
    SyncRequest, WindowFetch, WindowOutcome, DEFAULT_BATCH_SIZE, DEFAULT_ROLLING_DAYS,
};
pub use throttling::RequestPacer;
pub use tickfill_warehouse::{
    StockRecord, SyncStatusRecord, Warehouse, WarehouseConfig, WarehouseError, WarehouseSummary,
};
pub use upserter::{upsert_date, DateOutcome, PersistError};
