//! Capture Error Types

use thiserror::Error;

/// Errors while reading or storing captured rows
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A field was not an integer
    #[error("Non-integer field '{token}' in line: {line}")]
    NotInteger { token: String, line: String },

    /// Row width did not match the expected channel count
    #[error("Expected {expected} values, got {actual}")]
    ChannelCount { expected: usize, actual: usize },

    /// Channel index out of range
    #[error("Channel index {index} out of range ({channels} channels)")]
    ChannelIndex { index: usize, channels: usize },

    /// Filter parameters cannot be realised at this sample rate
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Too few samples for the requested analysis
    #[error("Signal too short: need {needed} samples, got {actual}")]
    SignalTooShort { needed: usize, actual: usize },

    /// Serial port could not be opened
    #[error("Serial port error: {0}")]
    Serial(String),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
