//! Line Sink Implementation

use crate::{Sink, SinkError, DIAGNOSTIC_PREFIX, NO_DATA};
use ring_buffer::Row;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::info;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Format a row as comma-separated samples (no line terminator)
pub fn format_row(row: &Row) -> String {
    let mut line = String::with_capacity(row.width() * 5);
    for (i, sample) in row.samples().iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&sample.to_string());
    }
    line
}

/// Sink writing one line per emission to any writer
pub struct LineSink<W: Write + Send> {
    writer: W,
    lines_written: u64,
}

impl<W: Write + Send> LineSink<W> {
    /// Create a sink over a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            lines_written: 0,
        }
    }

    /// Lines successfully written
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Borrow the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consume the sink, returning the writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.lines_written += 1;
        Ok(())
    }
}

impl<W: Write + Send> Sink for LineSink<W> {
    fn emit_row(&mut self, row: &Row) -> Result<(), SinkError> {
        let line = format_row(row);
        self.write_line(&line)
    }

    fn emit_no_data(&mut self) -> Result<(), SinkError> {
        self.write_line(NO_DATA)
    }

    fn diagnostic(&mut self, message: &str) -> Result<(), SinkError> {
        let line = format!("{}{}", DIAGNOSTIC_PREFIX, message);
        self.write_line(&line)
    }
}

/// Open a serial port as a line sink
pub fn open_serial(
    device: &str,
    baud_rate: u32,
) -> Result<LineSink<Box<dyn SerialPort>>, SinkError> {
    info!("Opening serial sink on {} at {} baud", device, baud_rate);

    let port = tokio_serial::new(device, baud_rate)
        .timeout(Duration::from_millis(100))
        .open()
        .map_err(|e| SinkError::Unavailable(format!("{}: {}", device, e)))?;

    Ok(LineSink::new(port))
}

/// In-memory sink keeping every line, shareable between clones
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Create an empty memory sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn push(&self, line: String) -> Result<(), SinkError> {
        self.lines
            .lock()
            .map_err(|e| SinkError::Unavailable(format!("Lock error: {}", e)))?
            .push(line);
        Ok(())
    }
}

impl Sink for MemorySink {
    fn emit_row(&mut self, row: &Row) -> Result<(), SinkError> {
        self.push(format_row(row))
    }

    fn emit_no_data(&mut self) -> Result<(), SinkError> {
        self.push(NO_DATA.to_string())
    }

    fn diagnostic(&mut self, message: &str) -> Result<(), SinkError> {
        self.push(format!("{}{}", DIAGNOSTIC_PREFIX, message))
    }
}
