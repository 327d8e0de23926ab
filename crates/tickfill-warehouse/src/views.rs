//! Database views backing the `status` report.

use ::duckdb::Connection;

/// Create database views for ledger and coverage summaries.
///
/// Creates the following views:
/// - `vw_latest_stock`: Most recent stored record per symbol
/// - `vw_failed_sync_dates`: Ledger dates whose last attempt failed
/// - `vw_fetch_latency`: Average fetch latency per window status
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_latest_stock AS
SELECT *
FROM (
    SELECT
        *,
        ROW_NUMBER() OVER (PARTITION BY symbol ORDER BY date DESC) AS rn
    FROM stock_records
)
WHERE rn = 1;

CREATE OR REPLACE VIEW vw_failed_sync_dates AS
SELECT date, updated_at
FROM sync_status
WHERE NOT success;

CREATE OR REPLACE VIEW vw_fetch_latency AS
SELECT
    status,
    COUNT(*) AS windows,
    AVG(latency_ms)::DOUBLE AS avg_latency_ms
FROM sync_log
WHERE latency_ms IS NOT NULL
GROUP BY status;
",
    )?;

    Ok(())
}
