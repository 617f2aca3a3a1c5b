//! Output Sinks
//!
//! Emitted rows leave the device as text lines: samples separated by commas,
//! or the literal [`NO_DATA`] when a drain slot found the buffer empty.
//! Diagnostic lines start with [`DIAGNOSTIC_PREFIX`].

mod line;
mod snapshot;

pub use line::{format_row, open_serial, LineSink, MemorySink, DEFAULT_BAUD_RATE};
pub use snapshot::{EmittedLog, SnapshotWriter, DEFAULT_SNAPSHOT_ROWS};

use ring_buffer::Row;
use thiserror::Error;

/// Sentinel line emitted for an empty drain slot
pub const NO_DATA: &str = "<no-data>";

/// Prefix marking a diagnostic line
pub const DIAGNOSTIC_PREFIX: &str = "# ";

/// Sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Output unavailable: {0}")]
    Unavailable(String),
}

/// Destination for emitted rows and diagnostics
pub trait Sink: Send {
    /// Write one row
    fn emit_row(&mut self, row: &Row) -> Result<(), SinkError>;

    /// Write the no-data sentinel
    fn emit_no_data(&mut self) -> Result<(), SinkError>;

    /// Write a one-line diagnostic message
    fn diagnostic(&mut self, message: &str) -> Result<(), SinkError>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn emit_row(&mut self, row: &Row) -> Result<(), SinkError> {
        (**self).emit_row(row)
    }

    fn emit_no_data(&mut self) -> Result<(), SinkError> {
        (**self).emit_no_data()
    }

    fn diagnostic(&mut self, message: &str) -> Result<(), SinkError> {
        (**self).diagnostic(message)
    }
}
