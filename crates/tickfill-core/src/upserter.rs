//! Per-date upserts.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tickfill_warehouse::{StockRecord, WarehouseError};
use time::Date;

use crate::domain::date::iso_date;
use crate::domain::format_iso_date;
use crate::fetcher::FetchedPayload;
use crate::store::SyncStore;
use crate::Symbol;

/// The store rejected a date's rows; nothing was kept for that date.
#[derive(Debug, Error)]
#[error("failed to persist rows for {}: {source}", format_iso_date(*.date))]
pub struct PersistError {
    pub date: Date,
    #[source]
    pub source: WarehouseError,
}

/// Result of upserting one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateOutcome {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub success: bool,
    pub rows_written: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DateOutcome {
    pub fn from_result(date: Date, result: &Result<usize, PersistError>) -> Self {
        match result {
            Ok(rows_written) => Self {
                date,
                success: true,
                rows_written: *rows_written,
                error: None,
            },
            Err(error) => Self {
                date,
                success: false,
                rows_written: 0,
                error: Some(error.source.to_string()),
            },
        }
    }
}

/// Persist every payload row tagged with `date`.
///
/// Rows repeating a symbol collapse to the last one in payload order. A date
/// without rows succeeds with zero rows written.
pub fn upsert_date<S>(
    store: &S,
    run_id: &str,
    payload: &FetchedPayload,
    date: Date,
) -> Result<usize, PersistError>
where
    S: SyncStore + ?Sized,
{
    let by_symbol: BTreeMap<&Symbol, StockRecord> = payload
        .rows_for(date)
        .map(|row| (&row.symbol, row.to_record()))
        .collect();
    let records: Vec<StockRecord> = by_symbol.into_values().collect();

    store
        .upsert_stock_records(run_id, &records)
        .map_err(|source| PersistError { date, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::DateWindow;
    use crate::StockRow;
    use std::cell::RefCell;
    use tickfill_warehouse::WindowLogEntry;
    use time::macros::date;

    #[derive(Default)]
    struct RecordingStore {
        batches: RefCell<Vec<Vec<StockRecord>>>,
        fail: bool,
    }

    impl SyncStore for RecordingStore {
        fn upsert_stock_records(
            &self,
            _run_id: &str,
            rows: &[StockRecord],
        ) -> Result<usize, WarehouseError> {
            if self.fail {
                return Err(WarehouseError::Rejected(String::from("disk full")));
            }
            self.batches.borrow_mut().push(rows.to_vec());
            Ok(rows.len())
        }

        fn record_sync_status(&self, _: &str, _: bool, _: usize) -> Result<(), WarehouseError> {
            Ok(())
        }

        fn latest_successful_sync(&self) -> Result<Option<String>, WarehouseError> {
            Ok(None)
        }

        fn log_window(&self, _: &WindowLogEntry<'_>) -> Result<(), WarehouseError> {
            Ok(())
        }
    }

    fn row(symbol: &str, date: Date, close: f64) -> StockRow {
        let mut row = StockRow::new(Symbol::parse(symbol).expect("symbol"), date);
        row.close = Some(close);
        row
    }

    fn payload(rows: Vec<StockRow>) -> FetchedPayload {
        FetchedPayload {
            window: DateWindow::new(date!(2025 - 01 - 01), date!(2025 - 01 - 02)).expect("window"),
            rows,
            latency_ms: 1,
        }
    }

    #[test]
    fn writes_only_rows_for_the_date() {
        let store = RecordingStore::default();
        let payload = payload(vec![
            row("AAPL", date!(2025 - 01 - 01), 1.0),
            row("MSFT", date!(2025 - 01 - 02), 2.0),
            row("GOOG", date!(2025 - 01 - 01), 3.0),
        ]);

        let written = upsert_date(&store, "run", &payload, date!(2025 - 01 - 01)).expect("upsert");
        assert_eq!(written, 2);

        let batches = store.batches.borrow();
        let symbols: Vec<&str> = batches[0].iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "GOOG"]);
    }

    #[test]
    fn duplicate_symbols_keep_the_last_row() {
        let store = RecordingStore::default();
        let payload = payload(vec![
            row("AAPL", date!(2025 - 01 - 01), 1.0),
            row("AAPL", date!(2025 - 01 - 01), 9.0),
        ]);

        upsert_date(&store, "run", &payload, date!(2025 - 01 - 01)).expect("upsert");
        let batches = store.batches.borrow();
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].close, Some(9.0));
    }

    #[test]
    fn store_failure_marks_the_date_failed() {
        let store = RecordingStore {
            fail: true,
            ..RecordingStore::default()
        };
        let payload = payload(vec![row("AAPL", date!(2025 - 01 - 02), 1.0)]);

        let result = upsert_date(&store, "run", &payload, date!(2025 - 01 - 02));
        let outcome = DateOutcome::from_result(date!(2025 - 01 - 02), &result);
        assert!(!outcome.success);
        assert_eq!(outcome.rows_written, 0);
        assert_eq!(outcome.error.as_deref(), Some("rejected: disk full"));
        assert_eq!(
            result.expect_err("must fail").to_string(),
            "failed to persist rows for 2025-01-02: rejected: disk full"
        );
    }
}
