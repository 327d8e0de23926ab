//! Remote fetcher: one HTTP GET per window, no retries, no caching.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use thiserror::Error;
use time::Date;
use tracing::debug;

use crate::config::{FetcherConfig, END_DATE_PLACEHOLDER, START_DATE_PLACEHOLDER};
use crate::domain::format_iso_date;
use crate::http_client::{HttpClient, HttpRequest};
use crate::planner::DateWindow;
use crate::throttling::RequestPacer;
use crate::StockRow;

/// Object keys under which providers commonly nest the row array.
const ROW_CONTAINER_KEYS: [&str; 3] = ["data", "results", "rows"];

/// A window could not be fetched; none of its dates are processed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error fetching {window}: {message}")]
    Transport { window: DateWindow, message: String },
    #[error("endpoint returned status {status} for {window}")]
    Status { window: DateWindow, status: u16 },
    #[error("undecodable payload for {window}: {message}")]
    Decode { window: DateWindow, message: String },
}

impl FetchError {
    pub const fn window(&self) -> DateWindow {
        match self {
            Self::Transport { window, .. }
            | Self::Status { window, .. }
            | Self::Decode { window, .. } => *window,
        }
    }
}

/// Rows returned for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPayload {
    pub window: DateWindow,
    pub rows: Vec<StockRow>,
    pub latency_ms: u64,
}

impl FetchedPayload {
    /// Rows tagged with `date`, in payload order.
    pub fn rows_for(&self, date: Date) -> impl Iterator<Item = &StockRow> {
        self.rows.iter().filter(move |row| row.date == date)
    }

    /// Rows tagged with a date the window does not cover.
    pub fn out_of_window(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| !self.window.contains(row.date))
            .count()
    }
}

/// Issues the per-window request against the configured endpoint template.
#[derive(Clone)]
pub struct RemoteFetcher {
    config: FetcherConfig,
    client: Arc<dyn HttpClient>,
    pacer: Option<RequestPacer>,
}

impl RemoteFetcher {
    pub fn new(config: FetcherConfig, client: Arc<dyn HttpClient>) -> Self {
        let pacer = config.max_requests_per_minute.map(RequestPacer::per_minute);
        Self {
            config,
            client,
            pacer,
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// The endpoint URL for a window, dates inclusive and ISO formatted.
    pub fn url_for(&self, window: DateWindow) -> String {
        let start = format_iso_date(window.start());
        let end = format_iso_date(window.end());
        self.config
            .endpoint_template
            .replace(START_DATE_PLACEHOLDER, &urlencoding::encode(&start))
            .replace(END_DATE_PLACEHOLDER, &urlencoding::encode(&end))
    }

    /// Perform exactly one request for `window`.
    pub async fn fetch(&self, window: DateWindow) -> Result<FetchedPayload, FetchError> {
        if let Some(pacer) = &self.pacer {
            pacer.acquire().await;
        }

        let request = HttpRequest::get(self.url_for(window))
            .with_header("accept", "application/json")
            .with_auth(&self.config.auth)
            .with_timeout_ms(self.config.timeout_ms);

        let started = Instant::now();
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|error| {
                debug!(window = %window, kind = ?error.kind(), "transport failure");
                FetchError::Transport {
                    window,
                    message: error.message().to_owned(),
                }
            })?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if !response.is_success() {
            return Err(FetchError::Status {
                window,
                status: response.status,
            });
        }

        let rows = decode_rows(&response.body).map_err(|message| FetchError::Decode {
            window,
            message,
        })?;

        Ok(FetchedPayload {
            window,
            rows,
            latency_ms,
        })
    }
}

/// Decode a payload body into rows; any undecodable row fails the payload.
pub fn decode_rows(body: &str) -> Result<Vec<StockRow>, String> {
    let value: Value = serde_json::from_str(body).map_err(|error| error.to_string())?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => ROW_CONTAINER_KEYS
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                format!(
                    "expected an array of rows or an object with one of {}",
                    ROW_CONTAINER_KEYS.join(", ")
                )
            })?,
        other => return Err(format!("expected an array of rows, got {other}")),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<StockRow>(item).map_err(|error| format!("row {index}: {error}"))
        })
        .collect()
}
