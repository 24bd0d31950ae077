//! Error types for segchain-core
//!
//! This module provides a no_std compatible error type shared by the driver
//! and every transport implementation.

use core::fmt;

/// Details about a rejected argument or configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
    /// Chain length outside 1..=254
    ChainLength(u8),
    /// Clock speed is zero or above the chip maximum
    ClockSpeed(u32),
    /// No latch (LOAD / chip select) line configured
    MissingLatch,
    /// Chip id outside 1..=chain_length
    ChipId {
        /// Requested chip
        chip: u8,
        /// Number of chips in the chain
        chain_length: u8,
    },
    /// Digit outside 1..=8
    Digit(u8),
    /// Scan limit digit count outside 1..=8
    ScanLimit(u8),
    /// Intensity step outside 1..=16
    IntensityStep(u8),
    /// Bulk write longer than the digits left in the chain (or empty)
    DigitCount {
        /// Number of codes requested
        requested: usize,
        /// Digits available from the start position to the end of the chain
        available: usize,
    },
    /// Character that has no glyph in the selected font
    Glyph(char),
}

/// A resource that can time out while being acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The handle lock
    Lock,
    /// Exclusive access to the serial bus
    Bus,
}

/// Transport failure kinds
///
/// Transports log their detailed error before mapping it to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Frame transmission failed
    Transfer,
    /// Driving the latch line failed
    Latch,
    /// Applying the bus configuration failed
    Configure,
    /// The bus is owned by someone else and cannot be acquired
    Busy,
    /// Detaching the device from the bus failed
    Detach,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed or out-of-range configuration or parameter
    InvalidArgument(ArgumentError),
    /// Operation attempted on a released or broken handle
    InvalidState,
    /// Command buffer allocation failed
    OutOfMemory,
    /// Lock or bus acquisition did not complete in time
    Timeout(Resource),
    /// The underlying transport failed
    Transport(TransportError),
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChainLength(len) => {
                write!(f, "chain length {} outside 1..=254", len)
            }
            Self::ClockSpeed(hz) => {
                write!(f, "clock speed {} Hz must be > 0 and <= 10 MHz", hz)
            }
            Self::MissingLatch => write!(f, "no latch line configured"),
            Self::ChipId { chip, chain_length } => {
                write!(f, "chip {} outside 1..={}", chip, chain_length)
            }
            Self::Digit(digit) => write!(f, "digit {} outside 1..=8", digit),
            Self::ScanLimit(digits) => write!(f, "scan limit {} outside 1..=8", digits),
            Self::IntensityStep(step) => write!(f, "intensity step {} outside 1..=16", step),
            Self::DigitCount {
                requested,
                available,
            } => write!(
                f,
                "{} digit codes requested, {} digits available",
                requested, available
            ),
            Self::Glyph(c) => write!(f, "no glyph for {:?}", c),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock => write!(f, "handle lock"),
            Self::Bus => write!(f, "bus"),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "frame transfer failed"),
            Self::Latch => write!(f, "latch line failed"),
            Self::Configure => write!(f, "bus configuration failed"),
            Self::Busy => write!(f, "bus is busy"),
            Self::Detach => write!(f, "detach from bus failed"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(detail) => write!(f, "invalid argument: {}", detail),
            Self::InvalidState => write!(f, "chain handle is not attached"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Timeout(resource) => write!(f, "timed out acquiring {}", resource),
            Self::Transport(kind) => write!(f, "transport error: {}", kind),
        }
    }
}

impl From<ArgumentError> for Error {
    fn from(detail: ArgumentError) -> Self {
        Self::InvalidArgument(detail)
    }
}

impl From<TransportError> for Error {
    fn from(kind: TransportError) -> Self {
        Self::Transport(kind)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
