//! Line stream capture

use crate::{parse_line, ChannelHistory, CaptureError, Line};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Line counts for one capture run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Rows appended to the history
    pub rows: u64,
    /// Sentinel lines seen
    pub no_data: u64,
    /// Diagnostic lines seen
    pub diagnostics: u64,
    /// Lines that failed to parse
    pub rejected: u64,
}

/// Consumes emitted lines into a shared [`ChannelHistory`]
pub struct Capture {
    num_channels: usize,
    history: Arc<Mutex<ChannelHistory>>,
}

impl Capture {
    /// Create a capture for `num_channels` channels keeping `history_length` samples each
    pub fn new(num_channels: usize, history_length: usize) -> Self {
        info!(
            "Creating capture: {} channels, {} samples per channel",
            num_channels, history_length
        );
        Self {
            num_channels,
            history: Arc::new(Mutex::new(ChannelHistory::new(num_channels, history_length))),
        }
    }

    /// Shared handle to the history, for readers running alongside the capture
    pub fn history(&self) -> Arc<Mutex<ChannelHistory>> {
        Arc::clone(&self.history)
    }

    /// Read lines until end of stream.
    ///
    /// Bad lines are counted and skipped; only I/O errors end the run early.
    pub async fn run<R>(&self, reader: R) -> Result<CaptureSummary, CaptureError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut reader = reader;
        let mut summary = CaptureSummary::default();
        let mut raw = Vec::with_capacity(128);

        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw).await? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&raw);

            match parse_line(&line, self.num_channels) {
                Ok(Line::Row(row)) => {
                    let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
                    history.append(&row)?;
                    summary.rows += 1;
                }
                Ok(Line::NoData) => summary.no_data += 1,
                Ok(Line::Diagnostic(message)) => {
                    info!("Device: {}", message);
                    summary.diagnostics += 1;
                }
                Ok(Line::Blank) => {}
                Err(e) => {
                    warn!("Skipping line: {}", e);
                    summary.rejected += 1;
                }
            }
        }

        debug!("Capture finished: {:?}", summary);
        Ok(summary)
    }
}

/// Open a serial port for line-by-line reading
pub fn open_serial_reader(
    device: &str,
    baud_rate: u32,
) -> Result<BufReader<SerialStream>, CaptureError> {
    info!("Opening serial capture on {} at {} baud", device, baud_rate);

    let stream = tokio_serial::new(device, baud_rate)
        .open_native_async()
        .map_err(|e| CaptureError::Serial(format!("{}: {}", device, e)))?;

    Ok(BufReader::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_stream() {
        let input: &[u8] = b"1,2\n<no-data>\n# boot ok\n3,4\nbad,line\n1,2,3\n\n5,6";
        let capture = Capture::new(2, 4);

        let summary = capture.run(input).await.unwrap();

        assert_eq!(
            summary,
            CaptureSummary {
                rows: 3,
                no_data: 1,
                diagnostics: 1,
                rejected: 2,
            }
        );
        let history = capture.history();
        let history = history.lock().unwrap();
        assert_eq!(history.channel(0, None).unwrap().y, vec![0, 1, 3, 5]);
        assert_eq!(history.channel(1, None).unwrap().y, vec![0, 2, 4, 6]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_rejected_not_fatal() {
        let input: &[u8] = b"\xff\xfe\n7,8\n";
        let capture = Capture::new(2, 2);

        let summary = capture.run(input).await.unwrap();

        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.rows, 1);
    }

    #[test]
    fn test_open_missing_serial_port() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .unwrap();
        let result = rt.block_on(async { open_serial_reader("/dev/does-not-exist-daq", 115_200) });
        assert!(matches!(result, Err(CaptureError::Serial(_))));
    }
}
