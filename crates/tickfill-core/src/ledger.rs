//! Per-date completion markers.

use tickfill_warehouse::WarehouseError;
use time::Date;

use crate::domain::{format_iso_date, parse_iso_date};
use crate::store::SyncStore;

/// Reads and writes the `sync_status` ledger through a [`SyncStore`].
pub struct SyncLedger<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> SyncLedger<'a, S>
where
    S: SyncStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Write the marker for `date`, replacing any earlier one.
    pub fn record(&self, date: Date, success: bool, row_count: usize) -> Result<(), WarehouseError> {
        self.store
            .record_sync_status(&format_iso_date(date), success, row_count)
    }

    /// Latest date whose marker says it completed.
    pub fn latest_successful(&self) -> Result<Option<Date>, WarehouseError> {
        self.store
            .latest_successful_sync()?
            .map(|value| {
                parse_iso_date(&value).map_err(|_| {
                    WarehouseError::Rejected(format!("ledger holds an unreadable date '{value}'"))
                })
            })
            .transpose()
    }

    /// `Some(latest)` when the ledger already covers `end` and no work is
    /// needed.
    pub fn covering(&self, end: Date) -> Result<Option<Date>, WarehouseError> {
        Ok(self.latest_successful()?.filter(|latest| *latest >= end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tickfill_warehouse::{StockRecord, WindowLogEntry};
    use time::macros::date;

    #[derive(Default)]
    struct MarkerStore {
        latest: Option<String>,
        written: RefCell<Vec<(String, bool, usize)>>,
    }

    impl SyncStore for MarkerStore {
        fn upsert_stock_records(&self, _: &str, rows: &[StockRecord]) -> Result<usize, WarehouseError> {
            Ok(rows.len())
        }

        fn record_sync_status(
            &self,
            date: &str,
            success: bool,
            row_count: usize,
        ) -> Result<(), WarehouseError> {
            self.written
                .borrow_mut()
                .push((date.to_owned(), success, row_count));
            Ok(())
        }

        fn latest_successful_sync(&self) -> Result<Option<String>, WarehouseError> {
            Ok(self.latest.clone())
        }

        fn log_window(&self, _: &WindowLogEntry<'_>) -> Result<(), WarehouseError> {
            Ok(())
        }
    }

    #[test]
    fn records_iso_dates() {
        let store = MarkerStore::default();
        SyncLedger::new(&store)
            .record(date!(2025 - 03 - 04), false, 0)
            .expect("record");
        assert_eq!(
            store.written.borrow().as_slice(),
            &[(String::from("2025-03-04"), false, 0)]
        );
    }

    #[test]
    fn covering_compares_against_end() {
        let store = MarkerStore {
            latest: Some(String::from("2025-03-04")),
            ..MarkerStore::default()
        };
        let ledger = SyncLedger::new(&store);

        assert_eq!(
            ledger.covering(date!(2025 - 03 - 04)).expect("covering"),
            Some(date!(2025 - 03 - 04))
        );
        assert_eq!(ledger.covering(date!(2025 - 03 - 05)).expect("covering"), None);
    }

    #[test]
    fn empty_ledger_covers_nothing() {
        let store = MarkerStore::default();
        assert_eq!(
            SyncLedger::new(&store).covering(date!(2025 - 03 - 04)).expect("covering"),
            None
        );
    }

    #[test]
    fn unreadable_marker_is_an_error() {
        let store = MarkerStore {
            latest: Some(String::from("yesterday")),
            ..MarkerStore::default()
        };
        assert!(SyncLedger::new(&store).latest_successful().is_err());
    }
}
