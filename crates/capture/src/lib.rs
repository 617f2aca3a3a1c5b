//! Host-Side Capture
//!
//! Reads the line stream produced by the device, validates each row against
//! the expected channel count, and keeps a per-channel sliding history that
//! can be downsampled for display or saved to disk.
//!
//! The [`analysis`] module filters captured traces and measures what the
//! filter costs (latency) and what it buys (SNR).

pub mod analysis;
mod capture;
mod error;
mod history;
mod parser;

pub use capture::{open_serial_reader, Capture, CaptureSummary};
pub use error::CaptureError;
pub use history::{ChannelHistory, ChannelTrace, DEFAULT_HISTORY_LENGTH};
pub use parser::{parse_line, Line};
