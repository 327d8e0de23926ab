//! Calendar-date helpers. Every date crossing a boundary (CLI, URL, store,
//! JSON) is ISO `YYYY-MM-DD`.

use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::ValidationError;

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_iso_date(input: &str) -> Result<Date, ValidationError> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        ValidationError::InvalidDate {
            value: input.to_owned(),
        }
    })
}

/// Parse a provider date, accepting a timestamp whose first ten characters
/// form an ISO date (`2025-01-02T16:00:00Z`).
pub fn parse_row_date(input: &str) -> Result<Date, ValidationError> {
    let trimmed = input.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    let rest = trimmed.get(10..).unwrap_or_default();
    if !rest.is_empty() && !rest.starts_with(['T', 't', ' ']) {
        return Err(ValidationError::InvalidDate {
            value: input.to_owned(),
        });
    }
    parse_iso_date(head).map_err(|_| ValidationError::InvalidDate {
        value: input.to_owned(),
    })
}

pub fn format_iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Current calendar date in UTC.
pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Serde adapter writing `time::Date` as `YYYY-MM-DD`.
pub mod iso_date {
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_iso_date(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        super::parse_iso_date(&value).map_err(D::Error::custom)
    }
}
