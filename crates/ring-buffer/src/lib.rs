//! Sample Row Ring Buffer
//!
//! Provides the bounded sliding window of the most recent sample rows shared
//! between the sampling and emission tasks.

mod buffer;

pub use buffer::{RingBuffer, RingSnapshot, DEFAULT_CAPACITY, DEFAULT_LOCK_TIMEOUT};

/// A single channel sample.
pub type Sample = i32;

/// One sampling cycle: one sample per channel, in channel order.
///
/// Column position is channel identity. Rows are only ever stored and
/// evicted as a whole, so a row never mixes samples from two cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(Vec<Sample>);

impl Row {
    /// Create a row from samples in channel order
    pub fn new(samples: Vec<Sample>) -> Self {
        Self(samples)
    }

    /// Samples in channel order
    pub fn samples(&self) -> &[Sample] {
        &self.0
    }

    /// Number of channels in this row
    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// Sample for the channel at `index`
    pub fn get(&self, index: usize) -> Option<Sample> {
        self.0.get(index).copied()
    }

    /// Consume the row, returning its samples
    pub fn into_samples(self) -> Vec<Sample> {
        self.0
    }
}

impl From<Vec<Sample>> for Row {
    fn from(samples: Vec<Sample>) -> Self {
        Self(samples)
    }
}

impl FromIterator<Sample> for Row {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
