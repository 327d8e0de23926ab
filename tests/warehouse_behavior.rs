//! Behavior-driven tests for the sync store.
//!
//! These tests exercise the warehouse the way the sync workflow and the
//! `status` command use it: keyed upserts, ledger markers, the run log and
//! the summary built from them.

use tempfile::tempdir;
use tickfill_core::{StockRecord, Warehouse, WarehouseConfig, WarehouseError};
use tickfill_warehouse::{WindowLogEntry, WindowLogStatus};

use tickfill_tests::open_warehouse;

fn record(symbol: &str, date: &str, close: f64) -> StockRecord {
    let mut record = StockRecord::new(symbol, date);
    record.close = Some(close);
    record.volume = Some(1_000);
    record
}

// =============================================================================
// Stock records
// =============================================================================

#[test]
fn when_a_key_is_written_twice_the_second_write_wins() {
    // Given: A stored close for AAPL on 2025-01-02
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    warehouse
        .upsert_stock_records("run-1", &[record("AAPL", "2025-01-02", 100.0)])
        .expect("first write");

    // When: The same key is written with a new close
    warehouse
        .upsert_stock_records("run-2", &[record("AAPL", "2025-01-02", 101.0)])
        .expect("second write");

    // Then: One row remains, carrying the new value
    assert_eq!(warehouse.count_stock_records_on("2025-01-02").expect("count"), 1);
    let stored = warehouse
        .stock_record("AAPL", "2025-01-02")
        .expect("read")
        .expect("record");
    assert_eq!(stored.close, Some(101.0));
    assert_eq!(stored.volume, Some(1_000));
}

#[test]
fn when_one_row_in_a_batch_is_invalid_nothing_from_the_batch_is_kept() {
    // Given: A batch whose second row carries a blank symbol
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let batch = [record("AAPL", "2025-01-02", 100.0), record("  ", "2025-01-02", 1.0)];

    // When: The batch is written
    let error = warehouse
        .upsert_stock_records("run-1", &batch)
        .expect_err("must be rejected");

    // Then: The valid row was rolled back with it
    assert!(matches!(error, WarehouseError::Rejected(_)));
    assert_eq!(warehouse.count_stock_records_on("2025-01-02").expect("count"), 0);
}

#[test]
fn extra_provider_fields_are_kept_as_json() {
    // Given: A record with provider fields outside the fixed columns
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let mut row = record("MSFT", "2025-01-02", 410.0);
    row.extra = Some(String::from(r#"{"exchange":"NASDAQ"}"#));

    // When: It is written and read back
    warehouse
        .upsert_stock_records("run-1", &[row])
        .expect("write");
    let stored = warehouse
        .stock_record("MSFT", "2025-01-02")
        .expect("read")
        .expect("record");

    // Then: The extra payload survives verbatim
    let extra: serde_json::Value =
        serde_json::from_str(stored.extra.as_deref().expect("extra")).expect("json");
    assert_eq!(extra["exchange"], "NASDAQ");
}

// =============================================================================
// Ledger markers
// =============================================================================

#[test]
fn when_a_date_is_resynced_its_marker_is_replaced() {
    // Given: A failed marker for 2025-01-02
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    warehouse
        .record_sync_status("2025-01-02", false, 0)
        .expect("marker");

    // When: The date later succeeds
    warehouse
        .record_sync_status("2025-01-02", true, 42)
        .expect("marker");

    // Then: Only the latest marker is visible
    let markers = warehouse.recent_sync_statuses(10).expect("markers");
    assert_eq!(markers.len(), 1);
    assert!(markers[0].success);
    assert_eq!(markers[0].row_count, 42);
}

#[test]
fn latest_successful_sync_skips_failed_markers() {
    // Given: A success followed by a later failure
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    warehouse.record_sync_status("2025-01-03", true, 5).expect("marker");
    warehouse.record_sync_status("2025-01-04", false, 0).expect("marker");

    // Then: The latest successful date is the earlier one
    assert_eq!(
        warehouse.latest_successful_sync().expect("latest").as_deref(),
        Some("2025-01-03")
    );
}

#[test]
fn an_empty_ledger_has_no_latest_sync() {
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    assert_eq!(warehouse.latest_successful_sync().expect("latest"), None);
}

// =============================================================================
// Persistence and reporting
// =============================================================================

#[test]
fn when_warehouse_is_reopened_rows_and_markers_persist() {
    // Given: A warehouse with data that is then dropped
    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("nested").join("warehouse.duckdb");
    {
        let warehouse = Warehouse::open(WarehouseConfig {
            tickfill_home: temp.path().to_path_buf(),
            db_path: db_path.clone(),
            max_pool_size: 1,
        })
        .expect("open");
        warehouse
            .upsert_stock_records("run-1", &[record("AAPL", "2025-01-02", 100.0)])
            .expect("write");
        warehouse
            .record_sync_status("2025-01-02", true, 1)
            .expect("marker");
    }

    // When: The same file is opened again
    let reopened = Warehouse::open(WarehouseConfig {
        tickfill_home: temp.path().to_path_buf(),
        db_path: db_path.clone(),
        max_pool_size: 1,
    })
    .expect("reopen");

    // Then: Everything written earlier is still there
    assert!(db_path.exists());
    assert_eq!(reopened.count_stock_records_on("2025-01-02").expect("count"), 1);
    assert_eq!(
        reopened.latest_successful_sync().expect("latest").as_deref(),
        Some("2025-01-02")
    );
}

#[test]
fn summary_reflects_records_markers_and_fetch_latency() {
    // Given: Two symbols over two dates, one failed date and two logged windows
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    warehouse
        .upsert_stock_records(
            "run-1",
            &[
                record("AAPL", "2025-01-02", 100.0),
                record("MSFT", "2025-01-02", 400.0),
                record("AAPL", "2025-01-03", 101.0),
            ],
        )
        .expect("write");
    warehouse.record_sync_status("2025-01-02", true, 2).expect("marker");
    warehouse.record_sync_status("2025-01-03", true, 1).expect("marker");
    warehouse.record_sync_status("2025-01-04", false, 0).expect("marker");
    for (start, end, latency) in [("2025-01-02", "2025-01-03", 100), ("2025-01-04", "2025-01-04", 300)] {
        warehouse
            .log_window(&WindowLogEntry {
                run_id: "run-1",
                window_start: start,
                window_end: end,
                status: WindowLogStatus::Ok,
                row_count: 1,
                latency_ms: Some(latency),
                message: None,
            })
            .expect("log");
    }
    warehouse
        .log_window(&WindowLogEntry {
            run_id: "run-1",
            window_start: "2025-01-05",
            window_end: "2025-01-05",
            status: WindowLogStatus::FetchFailed,
            row_count: 0,
            latency_ms: None,
            message: Some("endpoint returned status 503"),
        })
        .expect("log");

    // When: The summary is built
    let summary = warehouse.summary(2).expect("summary");

    // Then: It counts what the ledger and tables hold
    assert_eq!(summary.stored_records, 3);
    assert_eq!(summary.tracked_symbols, 2);
    assert_eq!(summary.failed_dates, 1);
    assert_eq!(summary.latest_successful_date.as_deref(), Some("2025-01-03"));
    assert_eq!(summary.avg_fetch_latency_ms, Some(200.0));

    // And: Recent markers come newest first, limited as requested
    let dates: Vec<&str> = summary
        .recent_markers
        .iter()
        .map(|marker| marker.date.as_str())
        .collect();
    assert_eq!(dates, vec!["2025-01-04", "2025-01-03"]);
}
