use std::io::{self, Write};

use tickfill_core::{
    format_iso_date, DateOutcome, SyncObserver, SyncReport, WarehouseSummary, WindowFetch,
    WindowOutcome,
};

use crate::cli::OutputFormat;
use crate::error::CliError;

pub const SUCCEEDED_LINE: &str = "sync succeeded";
pub const FAILED_LINE: &str = "sync failed";

/// Prints one line per window and per date as the run progresses.
pub struct Progress {
    format: OutputFormat,
}

impl Progress {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl SyncObserver for Progress {
    fn window_finished(&mut self, outcome: &WindowOutcome) {
        if self.format != OutputFormat::Human {
            return;
        }
        for line in window_lines(outcome) {
            println!("{line}");
        }
    }
}

pub fn window_lines(outcome: &WindowOutcome) -> Vec<String> {
    let mut lines = Vec::with_capacity(outcome.dates.len() + 1);
    match &outcome.fetch {
        WindowFetch::Fetched {
            rows,
            out_of_window,
            latency_ms,
        } => {
            let mut line = format!(
                "window {}: fetched {rows} rows in {latency_ms} ms",
                outcome.window
            );
            if *out_of_window > 0 {
                line.push_str(&format!(", ignored {out_of_window} outside the window"));
            }
            lines.push(line);
        }
        WindowFetch::Failed { error } => {
            lines.push(format!("window {}: failed: {error}", outcome.window));
        }
    }
    lines.extend(outcome.dates.iter().map(date_line));
    lines
}

fn date_line(outcome: &DateOutcome) -> String {
    let date = format_iso_date(outcome.date);
    match &outcome.error {
        None => format!("  {date}: ok, {} rows", outcome.rows_written),
        Some(error) => format!("  {date}: failed: {error}"),
    }
}

pub fn render_report(report: &SyncReport, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    write_report(&mut io::stdout().lock(), report, format, pretty)
}

pub fn write_report<W: Write>(
    out: &mut W,
    report: &SyncReport,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => write_json(out, report, pretty)?,
        OutputFormat::Human => {
            if let Some(latest) = &report.up_to_date_through {
                writeln!(out, "already synced through {latest}; nothing to do")?;
            } else {
                writeln!(
                    out,
                    "run {}: {} dates synced, {} rows written, {} windows failed, {} dates failed",
                    report.run_id,
                    report.dates_synced(),
                    report.rows_written(),
                    report.failed_windows().count(),
                    report.failed_dates().count(),
                )?;
            }
            writeln!(
                out,
                "{}",
                if report.succeeded() {
                    SUCCEEDED_LINE
                } else {
                    FAILED_LINE
                }
            )?;
        }
    }
    Ok(())
}

/// Final line for a run that stopped before producing a report.
pub fn render_aborted(format: OutputFormat) -> Result<(), CliError> {
    if format == OutputFormat::Human {
        writeln!(io::stdout().lock(), "{FAILED_LINE}")?;
    }
    Ok(())
}

pub fn render_status(
    summary: &WarehouseSummary,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    write_status(&mut io::stdout().lock(), summary, format, pretty)
}

pub fn write_status<W: Write>(
    out: &mut W,
    summary: &WarehouseSummary,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    if format == OutputFormat::Json {
        return write_json(out, summary, pretty);
    }

    writeln!(out, "db_path           : {}", summary.db_path.display())?;
    writeln!(
        out,
        "latest_successful : {}",
        summary.latest_successful_date.as_deref().unwrap_or("none")
    )?;
    writeln!(out, "stored_records    : {}", summary.stored_records)?;
    writeln!(out, "tracked_symbols   : {}", summary.tracked_symbols)?;
    writeln!(out, "failed_dates      : {}", summary.failed_dates)?;
    match summary.avg_fetch_latency_ms {
        Some(latency) => writeln!(out, "avg_fetch_latency : {latency:.1} ms")?,
        None => writeln!(out, "avg_fetch_latency : n/a")?,
    }

    if !summary.recent_markers.is_empty() {
        writeln!(out, "recent markers:")?;
        for marker in &summary.recent_markers {
            writeln!(
                out,
                "  {}  {:<6}  {:>6} rows  {}",
                marker.date,
                if marker.success { "ok" } else { "failed" },
                marker.row_count,
                marker.updated_at
            )?;
        }
    }
    Ok(())
}

fn write_json<W: Write, T: serde::Serialize>(
    out: &mut W,
    value: &T,
    pretty: bool,
) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(out, "{payload}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickfill_core::{DateWindow, RunState, SyncMode, SyncStatusRecord};
    use time::macros::date;

    fn fetched_window() -> WindowOutcome {
        WindowOutcome {
            window: DateWindow::new(date!(2025 - 01 - 01), date!(2025 - 01 - 02)).expect("window"),
            fetch: WindowFetch::Fetched {
                rows: 3,
                out_of_window: 1,
                latency_ms: 42,
            },
            dates: vec![
                DateOutcome {
                    date: date!(2025 - 01 - 01),
                    success: true,
                    rows_written: 2,
                    error: None,
                },
                DateOutcome {
                    date: date!(2025 - 01 - 02),
                    success: false,
                    rows_written: 0,
                    error: Some(String::from("rejected: disk full")),
                },
            ],
        }
    }

    fn report(windows: Vec<WindowOutcome>) -> SyncReport {
        SyncReport {
            run_id: String::from("run-1"),
            mode: SyncMode::Backfill,
            requested: DateWindow::new(date!(2025 - 01 - 01), date!(2025 - 01 - 02))
                .expect("window"),
            state: RunState::Done,
            up_to_date_through: None,
            windows,
        }
    }

    #[test]
    fn window_lines_cover_window_and_dates() {
        assert_eq!(
            window_lines(&fetched_window()),
            vec![
                "window 2025-01-01..2025-01-02: fetched 3 rows in 42 ms, ignored 1 outside the window",
                "  2025-01-01: ok, 2 rows",
                "  2025-01-02: failed: rejected: disk full",
            ]
        );
    }

    #[test]
    fn human_report_ends_with_overall_line() {
        let mut out = Vec::new();
        write_report(&mut out, &report(vec![fetched_window()]), OutputFormat::Human, false)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.lines().last(), Some("sync failed"));

        let mut out = Vec::new();
        write_report(&mut out, &report(Vec::new()), OutputFormat::Human, false).expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.lines().last(), Some("sync succeeded"));
    }

    #[test]
    fn json_report_is_one_object() {
        let mut out = Vec::new();
        write_report(&mut out, &report(vec![fetched_window()]), OutputFormat::Json, false)
            .expect("render");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(value["run_id"], "run-1");
        assert_eq!(value["windows"][0]["fetch"]["status"], "fetched");
        assert_eq!(value["windows"][0]["dates"][1]["success"], false);
    }

    #[test]
    fn status_lists_recent_markers() {
        let summary = WarehouseSummary {
            db_path: "/tmp/warehouse.duckdb".into(),
            latest_successful_date: Some(String::from("2025-01-01")),
            tracked_symbols: 2,
            stored_records: 4,
            failed_dates: 1,
            avg_fetch_latency_ms: None,
            recent_markers: vec![SyncStatusRecord {
                date: String::from("2025-01-02"),
                success: false,
                row_count: 0,
                updated_at: String::from("2025-01-03 00:00:00"),
            }],
        };

        let mut out = Vec::new();
        write_status(&mut out, &summary, OutputFormat::Human, false).expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("latest_successful : 2025-01-01"));
        assert!(text.contains("avg_fetch_latency : n/a"));
        assert!(text.contains("2025-01-02  failed"));
    }
}
