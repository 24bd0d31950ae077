//! MAX7219 / MAX7221 register map
//!
//! Every chip exposes a 16-bit shift register: the first byte selects one of
//! the registers below, the second byte is the value to write.

use crate::error::{ArgumentError, Error, Result};
use bitflags::bitflags;

/// First digit position on a chip
pub const MIN_DIGIT: u8 = 1;
/// Last digit position on a chip
pub const MAX_DIGIT: u8 = 8;
/// Number of digits driven by one chip
pub const DIGITS_PER_CHIP: usize = 8;

/// Register addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// No-op, used to pad frames for chips that are not addressed
    Noop = 0x00,
    /// Digit 0 (position 1)
    Digit0 = 0x01,
    /// Digit 1 (position 2)
    Digit1 = 0x02,
    /// Digit 2 (position 3)
    Digit2 = 0x03,
    /// Digit 3 (position 4)
    Digit3 = 0x04,
    /// Digit 4 (position 5)
    Digit4 = 0x05,
    /// Digit 5 (position 6)
    Digit5 = 0x06,
    /// Digit 6 (position 7)
    Digit6 = 0x07,
    /// Digit 7 (position 8)
    Digit7 = 0x08,
    /// Code B decode mode bitmask
    DecodeMode = 0x09,
    /// PWM intensity
    Intensity = 0x0A,
    /// Number of scanned digits minus one
    ScanLimit = 0x0B,
    /// 0 = shutdown, 1 = normal operation
    Shutdown = 0x0C,
    /// 1 = all segments on, 0 = normal operation
    DisplayTest = 0x0F,
}

impl Register {
    /// Register for a 1-based digit position
    pub fn digit(digit: u8) -> Result<Self> {
        Ok(match digit {
            1 => Self::Digit0,
            2 => Self::Digit1,
            3 => Self::Digit2,
            4 => Self::Digit3,
            5 => Self::Digit4,
            6 => Self::Digit5,
            7 => Self::Digit6,
            8 => Self::Digit7,
            _ => return Err(ArgumentError::Digit(digit).into()),
        })
    }

    /// Raw address byte
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

impl From<Register> for u8 {
    fn from(register: Register) -> u8 {
        register.addr()
    }
}

bitflags! {
    /// Code B decode mode
    ///
    /// A set bit makes the chip decode the digit register through its
    /// built-in Code B font instead of driving segments directly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DecodeMode: u8 {
        /// Decode digit 1
        const DIGIT_1 = 1 << 0;
        /// Decode digit 2
        const DIGIT_2 = 1 << 1;
        /// Decode digit 3
        const DIGIT_3 = 1 << 2;
        /// Decode digit 4
        const DIGIT_4 = 1 << 3;
        /// Decode digit 5
        const DIGIT_5 = 1 << 4;
        /// Decode digit 6
        const DIGIT_6 = 1 << 5;
        /// Decode digit 7
        const DIGIT_7 = 1 << 6;
        /// Decode digit 8
        const DIGIT_8 = 1 << 7;

        /// Decode every digit
        const ALL = 0xFF;
    }
}

impl DecodeMode {
    /// No digit is decoded (direct segment addressing)
    pub const NONE: Self = Self::empty();
}

impl Default for DecodeMode {
    fn default() -> Self {
        DecodeMode::NONE
    }
}

/// Display intensity as one of 16 PWM duty-cycle steps
///
/// Step 1 is 1/16 (MAX7219) or 1/32 (MAX7221), step 16 is 16/16 or 31/32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Intensity(u8);

impl Intensity {
    /// Dimmest setting
    pub const MIN: Self = Self(0x00);
    /// Brightest setting
    pub const MAX: Self = Self(0x0F);

    /// Build from a duty-cycle step in 1..=16
    pub fn from_step(step: u8) -> Result<Self> {
        if (1..=16).contains(&step) {
            Ok(Self(step - 1))
        } else {
            Err(Error::InvalidArgument(ArgumentError::IntensityStep(step)))
        }
    }

    /// Duty-cycle step in 1..=16
    pub const fn step(self) -> u8 {
        self.0 + 1
    }

    /// Value written to the intensity register
    pub const fn register_value(self) -> u8 {
        self.0
    }

    /// Next brighter step, wrapping from the brightest back to the dimmest
    pub const fn next_wrapping(self) -> Self {
        if self.0 >= Self::MAX.0 {
            Self::MIN
        } else {
            Self(self.0 + 1)
        }
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Intensity::MIN
    }
}

/// Chip operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// All digits blanked, registers retained
    Shutdown,
    /// Digits displayed normally
    Normal,
    /// All segments on, intensity ignored
    Test,
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Mode::Shutdown => write!(f, "shutdown"),
            Mode::Normal => write!(f, "normal"),
            Mode::Test => write!(f, "test"),
        }
    }
}

/// Check a 1-based digit position
pub fn check_digit(digit: u8) -> Result<()> {
    if (MIN_DIGIT..=MAX_DIGIT).contains(&digit) {
        Ok(())
    } else {
        Err(ArgumentError::Digit(digit).into())
    }
}

/// Check a scan limit digit count and return the register value (digits - 1)
pub fn scan_limit_value(digits: u8) -> Result<u8> {
    if (MIN_DIGIT..=MAX_DIGIT).contains(&digits) {
        Ok(digits - 1)
    } else {
        Err(ArgumentError::ScanLimit(digits).into())
    }
}
