//! Digit fonts
//!
//! Digits are written either as Code B values (decoded by the chip, see
//! [`DecodeMode`]) or as raw segment patterns (direct addressing). Both
//! encodings use bit 7 for the decimal point.

use bitflags::bitflags;

use crate::error::{ArgumentError, Result};
use crate::register::DecodeMode;

/// Code B font values
pub mod code_b {
    /// Digit 0 (digits 1 to 9 follow in order)
    pub const DIGIT_0: u8 = 0;
    /// Minus sign
    pub const MINUS: u8 = 10;
    /// Letter E
    pub const E: u8 = 11;
    /// Letter H
    pub const H: u8 = 12;
    /// Letter L
    pub const L: u8 = 13;
    /// Letter P
    pub const P: u8 = 14;
    /// Blank digit
    pub const BLANK: u8 = 15;
    /// Decimal point, OR with any other value
    pub const DP: u8 = 0x80;
}

bitflags! {
    /// Segments of one digit in direct addressing mode
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Segment: u8 {
        /// Middle bar
        const G = 0x01;
        /// Upper left
        const F = 0x02;
        /// Lower left
        const E = 0x04;
        /// Bottom bar
        const D = 0x08;
        /// Lower right
        const C = 0x10;
        /// Upper right
        const B = 0x20;
        /// Top bar
        const A = 0x40;
        /// Decimal point
        const DP = 0x80;
    }
}

const fn seg(segments: Segment) -> u8 {
    segments.bits()
}

/// Segment patterns for direct addressing
pub mod glyph {
    use super::{seg, Segment as S};

    /// Digits 0 to 9
    pub const DIGITS: [u8; 10] = [
        seg(S::A.union(S::B).union(S::C).union(S::D).union(S::E).union(S::F)),
        seg(S::B.union(S::C)),
        seg(S::A.union(S::B).union(S::G).union(S::E).union(S::D)),
        seg(S::A.union(S::B).union(S::G).union(S::C).union(S::D)),
        seg(S::F.union(S::G).union(S::B).union(S::C)),
        seg(S::A.union(S::F).union(S::G).union(S::C).union(S::D)),
        seg(S::F.union(S::G).union(S::C).union(S::D).union(S::E)),
        seg(S::A.union(S::B).union(S::C)),
        seg(S::DP.complement()),
        seg(S::A.union(S::B).union(S::C).union(S::D).union(S::F).union(S::G)),
    ];

    /// Letter A
    pub const UPPER_A: u8 = seg(S::A.union(S::B).union(S::C).union(S::E).union(S::F).union(S::G));
    /// Letter C
    pub const UPPER_C: u8 = seg(S::A.union(S::F).union(S::E).union(S::D));
    /// Letter E
    pub const UPPER_E: u8 = seg(S::A.union(S::F).union(S::E).union(S::D).union(S::G));
    /// Letter F
    pub const UPPER_F: u8 = seg(S::A.union(S::F).union(S::E).union(S::G));
    /// Letter H
    pub const UPPER_H: u8 = seg(S::F.union(S::E).union(S::G).union(S::B).union(S::C));
    /// Letter J
    pub const UPPER_J: u8 = seg(S::B.union(S::C).union(S::D));
    /// Letter L
    pub const UPPER_L: u8 = seg(S::F.union(S::E).union(S::D));
    /// Letter P
    pub const UPPER_P: u8 = seg(S::A.union(S::F).union(S::B).union(S::G).union(S::E));
    /// Letter U
    pub const UPPER_U: u8 = seg(S::F.union(S::E).union(S::D).union(S::C).union(S::B));
    /// Letter b
    pub const LOWER_B: u8 = seg(S::F.union(S::G).union(S::C).union(S::D).union(S::E));
    /// Letter d
    pub const LOWER_D: u8 = seg(S::B.union(S::G).union(S::C).union(S::D).union(S::E));
    /// Letter h
    pub const LOWER_H: u8 = seg(S::F.union(S::E).union(S::G).union(S::C));
    /// Letter o
    pub const LOWER_O: u8 = seg(S::G.union(S::C).union(S::D).union(S::E));
    /// Letter r
    pub const LOWER_R: u8 = seg(S::E.union(S::G));
    /// Letter t
    pub const LOWER_T: u8 = seg(S::F.union(S::G).union(S::E).union(S::D));
    /// Letter u
    pub const LOWER_U: u8 = seg(S::E.union(S::D).union(S::C));
    /// Letter y
    pub const LOWER_Y: u8 = seg(S::F.union(S::G).union(S::B).union(S::C).union(S::D));
    /// Minus sign
    pub const MINUS: u8 = seg(S::G);
    /// Blank digit
    pub const BLANK: u8 = 0;
}

/// Digit encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Font {
    /// Chip-decoded Code B values
    #[default]
    CodeB,
    /// Raw segment patterns
    Segments,
}

impl Font {
    /// Decode mode the chips need for this font
    pub const fn decode_mode(self) -> DecodeMode {
        match self {
            Font::CodeB => DecodeMode::ALL,
            Font::Segments => DecodeMode::NONE,
        }
    }

    /// Code for an empty digit
    pub const fn blank(self) -> u8 {
        match self {
            Font::CodeB => code_b::BLANK,
            Font::Segments => glyph::BLANK,
        }
    }

    /// Code for a decimal digit 0..=9
    pub fn digit(self, value: u8) -> Option<u8> {
        match self {
            Font::CodeB => (value <= 9).then_some(code_b::DIGIT_0 + value),
            Font::Segments => glyph::DIGITS.get(value as usize).copied(),
        }
    }

    /// Code for a character, without decimal point
    pub fn glyph(self, c: char) -> Result<u8> {
        if let Some(value) = c.to_digit(10) {
            return self.digit(value as u8).ok_or(ArgumentError::Glyph(c).into());
        }

        let code = match self {
            Font::CodeB => match c {
                '-' => Some(code_b::MINUS),
                'E' | 'e' => Some(code_b::E),
                'H' | 'h' => Some(code_b::H),
                'L' | 'l' => Some(code_b::L),
                'P' | 'p' => Some(code_b::P),
                ' ' => Some(code_b::BLANK),
                _ => None,
            },
            Font::Segments => match c {
                'A' | 'a' => Some(glyph::UPPER_A),
                'B' | 'b' => Some(glyph::LOWER_B),
                'C' | 'c' => Some(glyph::UPPER_C),
                'D' | 'd' => Some(glyph::LOWER_D),
                'E' | 'e' => Some(glyph::UPPER_E),
                'F' | 'f' => Some(glyph::UPPER_F),
                'H' => Some(glyph::UPPER_H),
                'h' => Some(glyph::LOWER_H),
                'J' | 'j' => Some(glyph::UPPER_J),
                'L' | 'l' => Some(glyph::UPPER_L),
                'O' => Some(glyph::DIGITS[0]),
                'o' => Some(glyph::LOWER_O),
                'P' | 'p' => Some(glyph::UPPER_P),
                'R' | 'r' => Some(glyph::LOWER_R),
                'T' | 't' => Some(glyph::LOWER_T),
                'U' => Some(glyph::UPPER_U),
                'u' => Some(glyph::LOWER_U),
                'Y' | 'y' => Some(glyph::LOWER_Y),
                '-' => Some(glyph::MINUS),
                ' ' => Some(glyph::BLANK),
                _ => None,
            },
        };
        code.ok_or(ArgumentError::Glyph(c).into())
    }
}

/// Encode `text` into digit codes, left to right
///
/// A `.` sets the decimal point of the digit before it; a leading `.` or a
/// second `.` in a row takes a blank digit of its own. Returns the number of
/// codes written. Fails if a character has no glyph or the codes do not fit
/// in `out`.
pub fn encode_text(text: &str, font: Font, out: &mut [u8]) -> Result<usize> {
    let mut len = 0usize;
    let mut dp_free = false;

    for c in text.chars() {
        if c == '.' && dp_free {
            if let Some(last) = out.get_mut(len - 1) {
                *last |= code_b::DP;
            }
            dp_free = false;
            continue;
        }

        let code = if c == '.' {
            font.blank() | code_b::DP
        } else {
            font.glyph(c)?
        };
        if let Some(slot) = out.get_mut(len) {
            *slot = code;
        }
        len += 1;
        dp_free = c != '.';
    }

    if len > out.len() {
        return Err(ArgumentError::DigitCount {
            requested: len,
            available: out.len(),
        }
        .into());
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_segment_glyphs() {
        assert_eq!(glyph::DIGITS[0], 0x7E);
        assert_eq!(glyph::DIGITS[1], 0x30);
        assert_eq!(glyph::DIGITS[8], 0x7F);
        assert_eq!(glyph::UPPER_H, 0x37);
        assert_eq!(glyph::MINUS, 0x01);
    }

    #[test]
    fn test_code_b_text() {
        let mut out = [0u8; 8];
        let n = encode_text("-12.5 HELP", Font::CodeB, &mut out).unwrap_err();
        assert_eq!(
            n,
            Error::InvalidArgument(ArgumentError::DigitCount {
                requested: 9,
                available: 8
            })
        );

        let n = encode_text("-12.5 HE", Font::CodeB, &mut out).unwrap();
        assert_eq!(n, 7);
        assert_eq!(&out[..n], &[10, 1, 2 | 0x80, 5, 15, 12, 11]);
    }

    #[test]
    fn test_decimal_point_folding() {
        let mut out = [0u8; 4];
        let n = encode_text(".1..", Font::CodeB, &mut out).unwrap();
        assert_eq!(&out[..n], &[15 | 0x80, 1 | 0x80, 15 | 0x80]);
    }

    #[test]
    fn test_segment_text() {
        let mut out = [0u8; 4];
        let n = encode_text("bEEF", Font::Segments, &mut out).unwrap();
        assert_eq!(n, 4);
        assert_eq!(
            out,
            [glyph::LOWER_B, glyph::UPPER_E, glyph::UPPER_E, glyph::UPPER_F]
        );
    }

    #[test]
    fn test_unknown_glyph() {
        let mut out = [0u8; 4];
        assert_eq!(
            encode_text("HA", Font::CodeB, &mut out),
            Err(Error::InvalidArgument(ArgumentError::Glyph('A')))
        );
        assert!(encode_text("K", Font::Segments, &mut out).is_err());
    }

    #[test]
    fn test_decode_mode_for_font() {
        assert_eq!(Font::CodeB.decode_mode(), DecodeMode::ALL);
        assert_eq!(Font::Segments.decode_mode(), DecodeMode::NONE);
    }
}
