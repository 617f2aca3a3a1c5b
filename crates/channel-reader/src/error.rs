//! Channel Reader Error Types

use thiserror::Error;

/// Errors raised while attaching channels at boot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    /// ADC pin does not exist
    #[error("ADC pin {0} is not an analog input")]
    InvalidPin(u8),

    /// Bus sensor did not answer at its address
    #[error("Bus sensor at {address:#04X} not responding")]
    SensorUnavailable { address: u8 },

    /// Sample width outside the supported range
    #[error("Sample width {0} bits not supported (1..=31)")]
    InvalidSampleWidth(u8),
}
