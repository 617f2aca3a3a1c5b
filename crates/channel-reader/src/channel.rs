//! Channel Identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Highest GPIO number that can be routed to the ADC
pub const MAX_ADC_PIN: u8 = 39;

/// Valid 7-bit bus addresses (reserved addresses excluded)
pub const BUS_ADDRESS_RANGE: RangeInclusive<u8> = 0x08..=0x77;

/// A sampled channel. The position in the channel list is its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelId {
    /// Analog input read through the on-chip ADC
    Adc { pin: u8 },
    /// Digital sensor queried over the sensor bus
    Bus { address: u8 },
}

impl ChannelId {
    /// Whether the identifier refers to hardware that can exist
    pub fn is_addressable(&self) -> bool {
        match self {
            ChannelId::Adc { pin } => *pin <= MAX_ADC_PIN,
            ChannelId::Bus { address } => BUS_ADDRESS_RANGE.contains(address),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Adc { pin } => write!(f, "adc:{}", pin),
            ChannelId::Bus { address } => write!(f, "bus:{:#04x}", address),
        }
    }
}
