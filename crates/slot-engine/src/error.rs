//! Error types for slot-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
