//! Property-based tests for chain addressing.
//! Frame slots and the bulk-write cursor must agree for every chain length and start position.

use proptest::prelude::*;
use segchain_core::buffer::{slot_index, Command, CommandBuffer};
use segchain_core::cursor::{available_digits, check_digit_count, DigitCursor};
use segchain_core::register::{Register, MAX_DIGIT, MIN_DIGIT};

fn chip_in_chain() -> impl Strategy<Value = (u8, u8)> {
    (1u8..=254).prop_flat_map(|len| (Just(len), 1..=len))
}

proptest! {
    /// A per-chip command lands in slot L - c and every other slot is a no-op.
    #[test]
    fn target_fills_exactly_one_slot((chain_length, chip) in chip_in_chain(), data in any::<u8>()) {
        let mut buffer = CommandBuffer::new(chain_length).unwrap();
        let cmd = Command::new(Register::Digit3, data);
        buffer.target(chip, cmd).unwrap();

        prop_assert_eq!(buffer.as_bytes().len(), chain_length as usize * 2);
        for (slot, actual) in buffer.commands().enumerate() {
            if slot == slot_index(chain_length, chip) {
                prop_assert_eq!(actual, cmd);
            } else {
                prop_assert!(actual.is_noop());
            }
        }
    }

    /// The capacity formula counts exactly the digits the cursor can visit.
    #[test]
    fn available_matches_cursor_walk((chain_length, chip) in chip_in_chain(), digit in 1u8..=8) {
        let mut cursor = DigitCursor::new(chain_length, chip, digit).unwrap();
        let mut visited = 1usize;
        while !(cursor.chip == chain_length && cursor.digit == MAX_DIGIT) {
            cursor.advance();
            prop_assert!(cursor.chip >= 1 && cursor.chip <= chain_length);
            prop_assert!((MIN_DIGIT..=MAX_DIGIT).contains(&cursor.digit));
            visited += 1;
        }
        prop_assert_eq!(visited, available_digits(chain_length, chip, digit));
    }

    /// Bulk writes are accepted exactly for 1..=available codes.
    #[test]
    fn digit_count_bounds((chain_length, chip) in chip_in_chain(), digit in 1u8..=8, count in 0usize..2100) {
        let available = available_digits(chain_length, chip, digit);
        let accepted = check_digit_count(chain_length, chip, digit, count).is_ok();
        prop_assert_eq!(accepted, count > 0 && count <= available);
    }
}
