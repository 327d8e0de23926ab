//! # Tickfill Warehouse
//!
//! DuckDB-based durable store for the historical data sync.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `stock_records` | One row per (symbol, date), overwritten on re-sync |
//! | `sync_status` | Ledger marker per calendar date |
//! | `sync_log` | Append-only audit of window attempts |
//! | `schema_migrations` | Applied migration versions |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_latest_stock` | Most recent record per symbol |
//! | `vw_failed_sync_dates` | Dates whose last sync attempt failed |
//! | `vw_fetch_latency` | Average fetch latency per window status |
//!
//! Dates cross this crate's API as ISO `YYYY-MM-DD` strings and are cast to
//! `DATE` inside the database.
//!
//! ```rust,no_run
//! use tickfill_warehouse::{StockRecord, Warehouse};
//!
//! let warehouse = Warehouse::open_default()?;
//! let rows = vec![StockRecord::new("AAPL", "2025-01-02")];
//! warehouse.upsert_stock_records("run-1", &rows)?;
//! warehouse.record_sync_status("2025-01-02", true, rows.len())?;
//! # Ok::<(), tickfill_warehouse::WarehouseError>(())
//! ```

pub mod duckdb;
pub mod migrations;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, OptionalExt, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Input was rejected before reaching the database.
    #[error("rejected: {0}")]
    Rejected(String),

    /// No usable connection could be taken from the pool.
    #[error("connection unavailable: {0}")]
    Connection(#[source] ::duckdb::Error),
}

impl WarehouseError {
    /// Whether the store itself is unreachable, as opposed to one write
    /// being refused.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for tickfill data.
    pub tickfill_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let tickfill_home = resolve_tickfill_home();
        let db_path = tickfill_home.join("warehouse.duckdb");
        Self {
            tickfill_home,
            db_path,
            max_pool_size: 2,
        }
    }
}

impl WarehouseConfig {
    /// Use an explicit database file, keeping the resolved home directory.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

/// A stored stock record keyed by (symbol, date).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockRecord {
    pub symbol: String,
    /// Trading date as `YYYY-MM-DD`.
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub ma_50: Option<f64>,
    pub ma_200: Option<f64>,
    /// Provider fields without a dedicated column, as a JSON object.
    pub extra: Option<String>,
}

impl StockRecord {
    /// A record carrying only its key; every value column is empty.
    pub fn new(symbol: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            date: date.into(),
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            market_cap: None,
            pe_ratio: None,
            pb_ratio: None,
            dividend_yield: None,
            ma_50: None,
            ma_200: None,
            extra: None,
        }
    }
}

/// A ledger marker for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatusRecord {
    pub date: String,
    pub success: bool,
    pub row_count: u64,
    pub updated_at: String,
}

/// Outcome written to `sync_log` for a window attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowLogStatus {
    Ok,
    FetchFailed,
}

impl WindowLogStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::FetchFailed => "fetch_failed",
        }
    }
}

/// One `sync_log` row.
#[derive(Debug, Clone)]
pub struct WindowLogEntry<'a> {
    pub run_id: &'a str,
    pub window_start: &'a str,
    pub window_end: &'a str,
    pub status: WindowLogStatus,
    pub row_count: usize,
    pub latency_ms: Option<u64>,
    pub message: Option<&'a str>,
}

/// Aggregate view of the store used by the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseSummary {
    pub db_path: PathBuf,
    pub latest_successful_date: Option<String>,
    pub tracked_symbols: u64,
    pub stored_records: u64,
    pub failed_dates: u64,
    pub avg_fetch_latency_ms: Option<f64>,
    pub recent_markers: Vec<SyncStatusRecord>,
}

/// The main warehouse interface for the sync store.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Initialize database schema and views.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.connection()?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    fn connection(&self) -> Result<PooledConnection, WarehouseError> {
        self.manager.acquire().map_err(WarehouseError::Connection)
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Insert or overwrite every record by its (symbol, date) key.
    ///
    /// All rows are written in one transaction: if any row fails, none of
    /// them are kept. Returns the number of rows written.
    pub fn upsert_stock_records(
        &self,
        run_id: &str,
        rows: &[StockRecord],
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.connection()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in rows {
                if row.symbol.trim().is_empty() {
                    return Err(WarehouseError::Rejected(String::from(
                        "stock record symbol must not be empty",
                    )));
                }

                let params: [&dyn ToSql; 15] = [
                    &row.symbol,
                    &row.date,
                    &row.open,
                    &row.high,
                    &row.low,
                    &row.close,
                    &row.volume,
                    &row.market_cap,
                    &row.pe_ratio,
                    &row.pb_ratio,
                    &row.dividend_yield,
                    &row.ma_50,
                    &row.ma_200,
                    &row.extra,
                    &run_id,
                ];
                connection.execute(
                    "INSERT OR REPLACE INTO stock_records \
                     (symbol, date, open, high, low, close, volume, market_cap, pe_ratio, \
                      pb_ratio, dividend_yield, ma_50, ma_200, extra, run_id, updated_at) \
                     VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }

            Ok(rows.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Fetch the stored record for a (symbol, date) key.
    pub fn stock_record(
        &self,
        symbol: &str,
        date: &str,
    ) -> Result<Option<StockRecord>, WarehouseError> {
        let connection = self.connection()?;
        let record = connection
            .query_row(
                "SELECT symbol, CAST(date AS VARCHAR), open, high, low, close, volume, \
                 market_cap, pe_ratio, pb_ratio, dividend_yield, ma_50, ma_200, extra \
                 FROM stock_records WHERE symbol = ? AND date = CAST(? AS DATE)",
                [symbol, date],
                read_stock_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Count stored records for one date.
    pub fn count_stock_records_on(&self, date: &str) -> Result<u64, WarehouseError> {
        let connection = self.connection()?;
        let count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM stock_records WHERE date = CAST(? AS DATE)",
            [date],
            |row| row.get(0),
        )?;
        Ok(non_negative(count))
    }

    /// Write or overwrite the ledger marker for a date.
    pub fn record_sync_status(
        &self,
        date: &str,
        success: bool,
        row_count: usize,
    ) -> Result<(), WarehouseError> {
        let connection = self.connection()?;
        let row_count = i64::try_from(row_count).unwrap_or(i64::MAX);
        let params: [&dyn ToSql; 3] = [&date, &success, &row_count];
        connection.execute(
            "INSERT OR REPLACE INTO sync_status (date, success, row_count, updated_at) \
             VALUES (CAST(? AS DATE), ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Read the ledger marker for a date.
    pub fn sync_status(&self, date: &str) -> Result<Option<SyncStatusRecord>, WarehouseError> {
        let connection = self.connection()?;
        let record = connection
            .query_row(
                "SELECT CAST(date AS VARCHAR), success, row_count, CAST(updated_at AS VARCHAR) \
                 FROM sync_status WHERE date = CAST(? AS DATE)",
                [date],
                read_sync_status,
            )
            .optional()?;
        Ok(record)
    }

    /// The most recent date whose marker records a successful sync.
    pub fn latest_successful_sync(&self) -> Result<Option<String>, WarehouseError> {
        let connection = self.connection()?;
        let latest: Option<String> = connection.query_row(
            "SELECT CAST(MAX(date) AS VARCHAR) FROM sync_status WHERE success",
            [],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    /// Most recent ledger markers, newest first.
    pub fn recent_sync_statuses(
        &self,
        limit: usize,
    ) -> Result<Vec<SyncStatusRecord>, WarehouseError> {
        let connection = self.connection()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut statement = connection.prepare(
            "SELECT CAST(date AS VARCHAR), success, row_count, CAST(updated_at AS VARCHAR) \
             FROM sync_status ORDER BY date DESC LIMIT ?",
        )?;
        let rows = statement.query_map([limit], read_sync_status)?;
        let mut markers = Vec::new();
        for row in rows {
            markers.push(row?);
        }
        Ok(markers)
    }

    /// Append a window attempt to `sync_log`.
    pub fn log_window(&self, entry: &WindowLogEntry<'_>) -> Result<(), WarehouseError> {
        let connection = self.connection()?;
        let row_count = i64::try_from(entry.row_count).unwrap_or(i64::MAX);
        let status = entry.status.as_str();
        let params: [&dyn ToSql; 7] = [
            &entry.run_id,
            &entry.window_start,
            &entry.window_end,
            &status,
            &row_count,
            &entry.latency_ms,
            &entry.message,
        ];
        connection.execute(
            "INSERT INTO sync_log \
             (run_id, window_start, window_end, status, row_count, latency_ms, message, timestamp) \
             VALUES (?, CAST(? AS DATE), CAST(? AS DATE), ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Summarize ledger and coverage state.
    pub fn summary(&self, recent: usize) -> Result<WarehouseSummary, WarehouseError> {
        let latest_successful_date = self.latest_successful_sync()?;
        let recent_markers = self.recent_sync_statuses(recent)?;

        let connection = self.connection()?;
        let tracked_symbols: i64 =
            connection.query_row("SELECT COUNT(*) FROM vw_latest_stock", [], |row| row.get(0))?;
        let stored_records: i64 =
            connection.query_row("SELECT COUNT(*) FROM stock_records", [], |row| row.get(0))?;
        let failed_dates: i64 = connection.query_row(
            "SELECT COUNT(*) FROM vw_failed_sync_dates",
            [],
            |row| row.get(0),
        )?;
        let avg_fetch_latency_ms: Option<f64> = connection
            .query_row(
                "SELECT avg_latency_ms FROM vw_fetch_latency WHERE status = 'ok'",
                [],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(WarehouseSummary {
            db_path: self.db_path().to_path_buf(),
            latest_successful_date,
            tracked_symbols: non_negative(tracked_symbols),
            stored_records: non_negative(stored_records),
            failed_dates: non_negative(failed_dates),
            avg_fetch_latency_ms,
            recent_markers,
        })
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn read_stock_record(row: &::duckdb::Row<'_>) -> Result<StockRecord, ::duckdb::Error> {
    let volume: Option<i64> = row.get(6)?;
    Ok(StockRecord {
        symbol: row.get(0)?,
        date: row.get(1)?,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        volume: volume.map(non_negative),
        market_cap: row.get(7)?,
        pe_ratio: row.get(8)?,
        pb_ratio: row.get(9)?,
        dividend_yield: row.get(10)?,
        ma_50: row.get(11)?,
        ma_200: row.get(12)?,
        extra: row.get(13)?,
    })
}

fn read_sync_status(row: &::duckdb::Row<'_>) -> Result<SyncStatusRecord, ::duckdb::Error> {
    let row_count: i64 = row.get(2)?;
    Ok(SyncStatusRecord {
        date: row.get(0)?,
        success: row.get(1)?,
        row_count: non_negative(row_count),
        updated_at: row.get(3)?,
    })
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Resolve the tickfill home directory from environment or default.
fn resolve_tickfill_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKFILL_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickfill");
    }

    PathBuf::from(".tickfill")
}
