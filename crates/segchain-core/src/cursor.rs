//! Digit cursor for bulk writes
//!
//! Digits are numbered 1..=8 on each chip. The cursor walks all digits of
//! chip 1, then all digits of chip 2, and so on to the end of the chain.

use crate::buffer::check_chip;
use crate::error::{ArgumentError, Result};
use crate::register::{check_digit, DIGITS_PER_CHIP, MAX_DIGIT, MIN_DIGIT};

/// Position of one digit in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitCursor {
    /// 1-based chip id
    pub chip: u8,
    /// 1-based digit on the chip
    pub digit: u8,
}

impl DigitCursor {
    /// Create a cursor at a validated position
    pub fn new(chain_length: u8, chip: u8, digit: u8) -> Result<Self> {
        check_chip(chain_length, chip)?;
        check_digit(digit)?;
        Ok(Self { chip, digit })
    }

    /// Move to the next digit, wrapping onto the next chip after digit 8
    ///
    /// Moving past the last chip is not checked here; callers bound the
    /// walk with [`available_digits`].
    pub fn advance(&mut self) {
        if self.digit >= MAX_DIGIT {
            self.digit = MIN_DIGIT;
            self.chip = self.chip.wrapping_add(1);
        } else {
            self.digit += 1;
        }
    }
}

/// Digits from `(start_chip, start_digit)` to the last digit of the chain, inclusive
pub fn available_digits(chain_length: u8, start_chip: u8, start_digit: u8) -> usize {
    (chain_length as usize - start_chip as usize) * DIGITS_PER_CHIP
        + (MAX_DIGIT as usize - start_digit as usize)
        + 1
}

/// Check that a bulk write of `count` codes fits the chain from its start position
///
/// Returns the number of available digits.
pub fn check_digit_count(
    chain_length: u8,
    start_chip: u8,
    start_digit: u8,
    count: usize,
) -> Result<usize> {
    check_chip(chain_length, start_chip)?;
    check_digit(start_digit)?;

    let available = available_digits(chain_length, start_chip, start_digit);
    if count == 0 || count > available {
        return Err(ArgumentError::DigitCount {
            requested: count,
            available,
        }
        .into());
    }
    Ok(available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_advance_wraps_to_next_chip() {
        let mut cursor = DigitCursor::new(3, 1, 7).unwrap();
        cursor.advance();
        assert_eq!(cursor, DigitCursor { chip: 1, digit: 8 });
        cursor.advance();
        assert_eq!(cursor, DigitCursor { chip: 2, digit: 1 });
    }

    #[test]
    fn test_available_digits() {
        assert_eq!(available_digits(1, 1, 1), 8);
        assert_eq!(available_digits(1, 1, 8), 1);
        assert_eq!(available_digits(4, 1, 1), 32);
        assert_eq!(available_digits(4, 3, 5), 12);
        assert_eq!(available_digits(254, 1, 1), 2032);
    }

    #[test]
    fn test_digit_count_bounds() {
        assert_eq!(check_digit_count(2, 1, 1, 16), Ok(16));
        assert_eq!(
            check_digit_count(2, 1, 1, 17),
            Err(Error::InvalidArgument(ArgumentError::DigitCount {
                requested: 17,
                available: 16
            }))
        );
        assert_eq!(
            check_digit_count(2, 2, 8, 0),
            Err(Error::InvalidArgument(ArgumentError::DigitCount {
                requested: 0,
                available: 1
            }))
        );
        assert!(check_digit_count(2, 3, 1, 1).is_err());
        assert!(check_digit_count(2, 1, 9, 1).is_err());
    }
}
