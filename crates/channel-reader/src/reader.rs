//! Channel Readers

use crate::error::ReaderError;
use crate::{ChannelId, INVALID_SAMPLE};
use ring_buffer::{Row, Sample};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use tracing::{debug, info, warn};

/// Reads one sample per channel, in the order given.
///
/// Called from task context once per sampling cycle. Implementations must
/// return exactly `channels.len()` samples; a channel that cannot be read
/// yields [`INVALID_SAMPLE`] in its column.
pub trait ChannelReader: Send {
    fn read_row(&mut self, channels: &[ChannelId]) -> Row;
}

impl<F> ChannelReader for F
where
    F: FnMut(&[ChannelId]) -> Row + Send,
{
    fn read_row(&mut self, channels: &[ChannelId]) -> Row {
        self(channels)
    }
}

/// Reader producing deterministic pseudo-random samples (no hardware required)
pub struct SimulatedReader {
    /// Samples fall in `0..2^sample_bits`
    sample_bits: u8,
    /// Channels that attached successfully
    attached: HashSet<ChannelId>,
    /// Bus addresses that refuse to attach
    offline: HashSet<u8>,
    /// Sampling cycles performed
    cycle: u64,
}

impl SimulatedReader {
    /// Create a reader for samples of the given width
    pub fn new(sample_bits: u8) -> Result<Self, ReaderError> {
        if !(1..=31).contains(&sample_bits) {
            return Err(ReaderError::InvalidSampleWidth(sample_bits));
        }

        info!("Creating simulated channel reader: {}-bit samples", sample_bits);
        Ok(Self {
            sample_bits,
            attached: HashSet::new(),
            offline: HashSet::new(),
            cycle: 0,
        })
    }

    /// Mark a bus address as not responding
    pub fn with_offline(mut self, address: u8) -> Self {
        self.offline.insert(address);
        self
    }

    /// Attach a single channel
    pub fn attach(&mut self, channel: ChannelId) -> Result<(), ReaderError> {
        match channel {
            ChannelId::Adc { pin } if !channel.is_addressable() => {
                return Err(ReaderError::InvalidPin(pin));
            }
            ChannelId::Bus { address }
                if !channel.is_addressable() || self.offline.contains(&address) =>
            {
                return Err(ReaderError::SensorUnavailable { address });
            }
            _ => {}
        }

        debug!("Attached channel {}", channel);
        self.attached.insert(channel);
        Ok(())
    }

    /// Attach every channel, returning the failures.
    ///
    /// Channels that fail stay in the row and read as [`INVALID_SAMPLE`].
    pub fn attach_all(&mut self, channels: &[ChannelId]) -> Vec<ReaderError> {
        channels
            .iter()
            .filter_map(|&channel| match self.attach(channel) {
                Ok(()) => None,
                Err(e) => {
                    warn!("Channel {} unavailable: {}", channel, e);
                    Some(e)
                }
            })
            .collect()
    }

    /// Whether a channel attached successfully
    pub fn is_attached(&self, channel: &ChannelId) -> bool {
        self.attached.contains(channel)
    }

    /// Sampling cycles performed so far
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    fn sample(&self, channel: &ChannelId) -> Sample {
        if !self.attached.contains(channel) {
            return INVALID_SAMPLE;
        }

        let mut hasher = DefaultHasher::new();
        self.cycle.hash(&mut hasher);
        channel.hash(&mut hasher);
        let hash = hasher.finish();

        (hash % (1u64 << self.sample_bits)) as Sample
    }
}

impl ChannelReader for SimulatedReader {
    fn read_row(&mut self, channels: &[ChannelId]) -> Row {
        self.cycle += 1;
        channels.iter().map(|channel| self.sample(channel)).collect()
    }
}
