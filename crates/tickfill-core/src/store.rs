use tickfill_warehouse::{StockRecord, Warehouse, WarehouseError, WindowLogEntry};

/// Durable store operations the sync workflow relies on.
///
/// [`Warehouse`] is the production implementation; the trait is the seam
/// where tests inject store faults.
pub trait SyncStore {
    /// Insert or overwrite `rows` by (symbol, date), all or nothing.
    fn upsert_stock_records(&self, run_id: &str, rows: &[StockRecord])
        -> Result<usize, WarehouseError>;

    /// Write or overwrite the ledger marker for `date`.
    fn record_sync_status(
        &self,
        date: &str,
        success: bool,
        row_count: usize,
    ) -> Result<(), WarehouseError>;

    /// Most recent date with a successful marker.
    fn latest_successful_sync(&self) -> Result<Option<String>, WarehouseError>;

    /// Append a window attempt to the run log.
    fn log_window(&self, entry: &WindowLogEntry<'_>) -> Result<(), WarehouseError>;
}

impl SyncStore for Warehouse {
    fn upsert_stock_records(
        &self,
        run_id: &str,
        rows: &[StockRecord],
    ) -> Result<usize, WarehouseError> {
        Warehouse::upsert_stock_records(self, run_id, rows)
    }

    fn record_sync_status(
        &self,
        date: &str,
        success: bool,
        row_count: usize,
    ) -> Result<(), WarehouseError> {
        Warehouse::record_sync_status(self, date, success, row_count)
    }

    fn latest_successful_sync(&self) -> Result<Option<String>, WarehouseError> {
        Warehouse::latest_successful_sync(self)
    }

    fn log_window(&self, entry: &WindowLogEntry<'_>) -> Result<(), WarehouseError> {
        Warehouse::log_window(self, entry)
    }
}

impl<S: SyncStore + ?Sized> SyncStore for &S {
    fn upsert_stock_records(
        &self,
        run_id: &str,
        rows: &[StockRecord],
    ) -> Result<usize, WarehouseError> {
        (**self).upsert_stock_records(run_id, rows)
    }

    fn record_sync_status(
        &self,
        date: &str,
        success: bool,
        row_count: usize,
    ) -> Result<(), WarehouseError> {
        (**self).record_sync_status(date, success, row_count)
    }

    fn latest_successful_sync(&self) -> Result<Option<String>, WarehouseError> {
        (**self).latest_successful_sync()
    }

    fn log_window(&self, entry: &WindowLogEntry<'_>) -> Result<(), WarehouseError> {
        (**self).log_window(entry)
    }
}
