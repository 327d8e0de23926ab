use thiserror::Error;
use tickfill_core::{ConfigError, InvalidRangeError, SyncError, WarehouseError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Aborted(SyncError),

    #[error("sync failed: windows={failed_windows}, dates={failed_dates}")]
    SyncFailed {
        failed_windows: usize,
        failed_dates: usize,
    },

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<SyncError> for CliError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::InvalidRange(error) => Self::InvalidRange(error),
            SyncError::Ledger(error) => Self::Warehouse(error),
            aborted @ SyncError::Aborted { .. } => Self::Aborted(aborted),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidRange(_) | Self::Config(_) => 2,
            Self::SyncFailed { .. } => 3,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) => 7,
            Self::Aborted(_) => 8,
            Self::Logging(_) | Self::Io(_) => 10,
        }
    }
}
