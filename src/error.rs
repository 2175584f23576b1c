//! Error types for the streaming tempo tracker

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors that can occur while buffering, transforming or tracking a stream
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// Requested logical index is outside the retrievable range of a memory.
    ///
    /// `index < min_valid` means the slot has already been overwritten (a slow
    /// reader lost data); `index > max_valid` means it has not been written yet.
    OutOfRange {
        /// Index that was requested
        index: i64,
        /// First retrievable index at the time of the request
        min_valid: i64,
        /// Last written index at the time of the request
        max_valid: i64,
    },

    /// A value, batch or window has a shape inconsistent with what the
    /// receiving component was configured for
    SizeMismatch {
        /// Expected length (or maximum length for batches)
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Degenerate configuration rejected at construction time
    ConfigurationError(String),

    /// Invalid input parameters for a single call
    InvalidInput(String),

    /// I/O failure in an observer or sink
    Io(String),

    /// The producer thread could not be started or panicked
    ThreadError(String),
}

impl TrackerError {
    /// True if the requested index had already been overwritten
    pub fn is_overwritten(&self) -> bool {
        matches!(self, TrackerError::OutOfRange { index, min_valid, .. } if index < min_valid)
    }

    /// True if the requested index had not been produced yet
    pub fn is_not_yet_written(&self) -> bool {
        matches!(self, TrackerError::OutOfRange { index, max_valid, .. } if index > max_valid)
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::OutOfRange {
                index,
                min_valid,
                max_valid,
            } => {
                if index < min_valid {
                    write!(
                        f,
                        "Out of range: index {} has been overwritten (valid {}..={})",
                        index, min_valid, max_valid
                    )
                } else {
                    write!(
                        f,
                        "Out of range: index {} is not yet written (valid {}..={})",
                        index, min_valid, max_valid
                    )
                }
            }
            TrackerError::SizeMismatch { expected, actual } => {
                write!(f, "Size mismatch: expected {}, got {}", expected, actual)
            }
            TrackerError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            TrackerError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            TrackerError::Io(msg) => write!(f, "I/O error: {}", msg),
            TrackerError::ThreadError(msg) => write!(f, "Thread error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::Io(err.to_string())
    }
}
