use thiserror::Error;

/// Validation errors for caller-supplied values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("date must be formatted as YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
}

/// Invalid planner input; a run with such input never starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidRangeError {
    #[error("start date {start} is after end date {end}")]
    StartAfterEnd { start: String, end: String },
    #[error("batch size must be at least 1 day")]
    ZeroBatchSize,
    #[error("rolling window must cover at least 1 day")]
    ZeroDays,
    #[error("date range exceeds the supported calendar")]
    OutOfCalendar,
}
