//! Channel Acquisition
//!
//! This crate names the sampled channels and provides the capability that
//! reads one [`Row`](ring_buffer::Row) per sampling cycle. Readings that fail
//! are reported in-band as [`INVALID_SAMPLE`], never as an error.

mod channel;
mod error;
mod reader;

pub use channel::{ChannelId, BUS_ADDRESS_RANGE, MAX_ADC_PIN};
pub use error::ReaderError;
pub use reader::{ChannelReader, SimulatedReader};

use ring_buffer::Sample;

/// Sample value recorded for a channel that could not be read
pub const INVALID_SAMPLE: Sample = -1;

/// Default sample width in bits (12-bit ADC)
pub const DEFAULT_SAMPLE_BITS: u8 = 12;
