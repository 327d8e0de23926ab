//! # Domain Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated, upper-cased ticker |
//! | [`StockRow`] | Provider row for one (symbol, date) |
//!
//! Dates are `time::Date` in memory and ISO `YYYY-MM-DD` everywhere else;
//! see the helpers in [`date`].

pub mod date;
mod stock;
mod symbol;

pub use date::{format_iso_date, parse_iso_date, today_utc};
pub use stock::StockRow;
pub use symbol::Symbol;
