//! Date range planning.
//!
//! [`DateRangePlanner`] lazily splits an inclusive `[start, end]` range into
//! consecutive windows of at most `batch_size` days:
//!
//! ```rust
//! use tickfill_core::{DateRangePlanner, parse_iso_date};
//!
//! let start = parse_iso_date("2025-01-01")?;
//! let end = parse_iso_date("2025-01-05")?;
//! let windows: Vec<String> = DateRangePlanner::new(start, end, 2)?
//!     .map(|window| window.to_string())
//!     .collect();
//!
//! assert_eq!(windows, ["2025-01-01..2025-01-02", "2025-01-03..2025-01-04", "2025-01-05..2025-01-05"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt::{Display, Formatter};
use std::iter::FusedIterator;

use serde::Serialize;
use time::{Date, Duration};

use crate::domain::date::{format_iso_date, iso_date};
use crate::InvalidRangeError;

/// Inclusive, non-empty span of calendar dates fetched as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DateWindow {
    #[serde(with = "iso_date")]
    start: Date,
    #[serde(with = "iso_date")]
    end: Date,
}

impl DateWindow {
    pub fn new(start: Date, end: Date) -> Result<Self, InvalidRangeError> {
        if start > end {
            return Err(InvalidRangeError::StartAfterEnd {
                start: format_iso_date(start),
                end: format_iso_date(end),
            });
        }
        Ok(Self { start, end })
    }

    pub const fn start(&self) -> Date {
        self.start
    }

    pub const fn end(&self) -> Date {
        self.end
    }

    /// Number of calendar days covered, always at least 1.
    pub fn len_days(&self) -> u32 {
        u32::try_from((self.end - self.start).whole_days() + 1).unwrap_or(u32::MAX)
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every date in the window, ascending.
    pub fn dates(&self) -> impl Iterator<Item = Date> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |date| {
            if *date < end {
                date.next_day()
            } else {
                None
            }
        })
    }
}

impl Display for DateWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}..{}",
            format_iso_date(self.start),
            format_iso_date(self.end)
        )
    }
}

/// Lazy, ascending sequence of gap-free windows covering a date range.
#[derive(Debug, Clone)]
pub struct DateRangePlanner {
    next_start: Option<Date>,
    end: Date,
    batch_size: u32,
}

impl DateRangePlanner {
    /// Plan `[start, end]` in windows of at most `batch_size` days.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError`] when `start > end` or `batch_size == 0`.
    pub fn new(start: Date, end: Date, batch_size: u32) -> Result<Self, InvalidRangeError> {
        if batch_size == 0 {
            return Err(InvalidRangeError::ZeroBatchSize);
        }
        DateWindow::new(start, end)?;

        Ok(Self {
            next_start: Some(start),
            end,
            batch_size,
        })
    }

    /// Plan the `days` calendar days ending on (and including) `end`.
    pub fn rolling(end: Date, days: u32, batch_size: u32) -> Result<Self, InvalidRangeError> {
        Self::new(rolling_start(end, days)?, end, batch_size)
    }

    pub const fn batch_size(&self) -> u32 {
        self.batch_size
    }

    fn remaining_windows(&self) -> usize {
        let Some(start) = self.next_start else {
            return 0;
        };
        let days = (self.end - start).whole_days() + 1;
        let windows = (days + i64::from(self.batch_size) - 1) / i64::from(self.batch_size);
        usize::try_from(windows).unwrap_or(usize::MAX)
    }
}

/// First day of the `days`-long range ending on `end`.
pub fn rolling_start(end: Date, days: u32) -> Result<Date, InvalidRangeError> {
    if days == 0 {
        return Err(InvalidRangeError::ZeroDays);
    }
    end.checked_sub(Duration::days(i64::from(days) - 1))
        .ok_or(InvalidRangeError::OutOfCalendar)
}

impl Iterator for DateRangePlanner {
    type Item = DateWindow;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let end = start
            .checked_add(Duration::days(i64::from(self.batch_size) - 1))
            .map_or(self.end, |candidate| candidate.min(self.end));

        self.next_start = if end < self.end { end.next_day() } else { None };
        Some(DateWindow { start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining_windows();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DateRangePlanner {}

impl FusedIterator for DateRangePlanner {}
