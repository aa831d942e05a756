use std::io;

use thiserror::Error;

/// A type alias for handling errors related to usage monitoring.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// An error that can occur while sampling usage counters.
///
/// Any of these is fatal to the affected monitor: the sampler logs it once
/// and self-stops, it is never retried.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The counters source could not be opened or read.
    #[error("failed to read usage counters: {0}")]
    Io(#[from] io::Error),
    /// The CPU counters source did not have the expected layout.
    #[error("unexpected CPU stats format")]
    InvalidCpuStats,
    /// The memory counters source did not have the expected layout.
    #[error("unexpected memory stats format")]
    InvalidMemStats,
}
