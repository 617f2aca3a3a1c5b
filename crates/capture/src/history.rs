//! Per-channel sliding history

use crate::CaptureError;
use ring_buffer::{Row, Sample};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default samples kept per channel
pub const DEFAULT_HISTORY_LENGTH: usize = 20_000;

/// Plot-ready view of one channel: sample indices and values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTrace {
    pub x: Vec<usize>,
    pub y: Vec<Sample>,
}

/// Fixed-length history per channel, pre-filled with zeros
pub struct ChannelHistory {
    channels: Vec<VecDeque<Sample>>,
    length: usize,
}

impl ChannelHistory {
    /// Create a history for `num_channels` channels of `length` samples each
    pub fn new(num_channels: usize, length: usize) -> Self {
        let channels = (0..num_channels)
            .map(|_| std::iter::repeat(0).take(length).collect())
            .collect();
        Self { channels, length }
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples kept per channel
    pub fn length(&self) -> usize {
        self.length
    }

    /// Append one row, dropping the oldest sample of every channel
    pub fn append(&mut self, row: &Row) -> Result<(), CaptureError> {
        if row.width() != self.channels.len() {
            return Err(CaptureError::ChannelCount {
                expected: self.channels.len(),
                actual: row.width(),
            });
        }

        for (channel, &sample) in self.channels.iter_mut().zip(row.samples()) {
            if channel.len() >= self.length {
                channel.pop_front();
            }
            channel.push_back(sample);
        }
        Ok(())
    }

    /// One channel, downsampled to roughly `max_points` by striding
    pub fn channel(
        &self,
        index: usize,
        max_points: Option<usize>,
    ) -> Result<ChannelTrace, CaptureError> {
        let channel = self.channels.get(index).ok_or(CaptureError::ChannelIndex {
            index,
            channels: self.channels.len(),
        })?;

        let len = channel.len();
        let step = match max_points {
            Some(max) if max > 0 && len > max => (len / max).max(1),
            _ => 1,
        };

        Ok(ChannelTrace {
            x: (0..len).step_by(step).collect(),
            y: channel.iter().copied().step_by(step).collect(),
        })
    }

    /// Every channel, downsampled
    pub fn all_channels(&self, max_points: Option<usize>) -> Vec<ChannelTrace> {
        (0..self.channels.len())
            .filter_map(|i| self.channel(i, max_points).ok())
            .collect()
    }

    /// Reset every channel to zeros
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
            channel.extend(std::iter::repeat(0).take(self.length));
        }
    }

    /// Save each channel to `{prefix}{n}{extension}` in `dir`, n starting at 1.
    ///
    /// `.dat` and `.bin` files hold little-endian f64 values; any other
    /// extension produces one decimal value per line.
    pub fn save(
        &self,
        dir: impl AsRef<Path>,
        prefix: &str,
        extension: &str,
    ) -> Result<Vec<PathBuf>, CaptureError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let binary = matches!(extension.to_ascii_lowercase().as_str(), ".dat" | ".bin");
        let mut created = Vec::with_capacity(self.channels.len());

        for (i, channel) in self.channels.iter().enumerate() {
            let path = dir.join(format!("{}{}{}", prefix, i + 1, extension));

            let bytes = if binary {
                channel
                    .iter()
                    .flat_map(|&s| f64::from(s).to_le_bytes())
                    .collect::<Vec<u8>>()
            } else {
                let mut text = String::with_capacity(channel.len() * 6);
                for sample in channel {
                    text.push_str(&format!("{:.6}\n", f64::from(*sample)));
                }
                text.into_bytes()
            };

            std::fs::write(&path, bytes)?;
            created.push(path);
        }

        info!("Saved {} channel files to {}", created.len(), dir.display());
        Ok(created)
    }
}
