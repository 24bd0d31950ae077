//! Command buffer and frame layout
//!
//! A frame carries one 2-byte command per chip and is shifted through the
//! whole chain before it is latched. The first command in the frame travels
//! furthest, so slot `i` of a frame for a chain of length `L` lands in chip
//! `L - i`. Addressing chip `c` means writing slot `L - c` and filling every
//! other slot with a no-op.
//!
//! The buffer stores the frame exactly as it goes on the wire. Chains of one
//! or two chips fit in a small inline array; longer chains get a heap buffer
//! sized to the chain, allocated once when the buffer is created.

use crate::error::{ArgumentError, Error, Result};
use crate::register::Register;

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Bytes per command (register address + data)
pub const COMMAND_SIZE: usize = 2;

/// Frame bytes that fit in the inline buffer
pub const INLINE_FRAME_BYTES: usize = 4;

/// Shortest supported chain
pub const MIN_CHAIN_LENGTH: u8 = 1;

/// Longest supported chain
pub const MAX_CHAIN_LENGTH: u8 = 254;

/// One register write for one chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Command {
    /// Register address byte
    pub address: u8,
    /// Data byte
    pub data: u8,
}

impl Command {
    /// Command that leaves the receiving chip unchanged
    pub const NOOP: Self = Self {
        address: Register::Noop.addr(),
        data: 0,
    };

    /// Create a command for a register
    pub const fn new(register: Register, data: u8) -> Self {
        Self {
            address: register.addr(),
            data,
        }
    }

    /// Wire representation (address first)
    pub const fn to_bytes(self) -> [u8; COMMAND_SIZE] {
        [self.address, self.data]
    }

    /// Check if this is the no-op command
    pub const fn is_noop(self) -> bool {
        self.address == Register::Noop.addr() && self.data == 0
    }
}

/// Check a chain length against the supported range
pub fn check_chain_length(chain_length: u8) -> Result<()> {
    if (MIN_CHAIN_LENGTH..=MAX_CHAIN_LENGTH).contains(&chain_length) {
        Ok(())
    } else {
        Err(ArgumentError::ChainLength(chain_length).into())
    }
}

/// Check a 1-based chip id against the chain length
pub fn check_chip(chain_length: u8, chip: u8) -> Result<()> {
    if chip >= 1 && chip <= chain_length {
        Ok(())
    } else {
        Err(ArgumentError::ChipId { chip, chain_length }.into())
    }
}

/// Frame slot holding the command for `chip`
///
/// The caller must have validated `chip` with [`check_chip`].
pub const fn slot_index(chain_length: u8, chip: u8) -> usize {
    (chain_length - chip) as usize
}

/// Reusable frame storage, one slot per chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandBuffer {
    /// Frame fits in the inline array (chains of one or two chips)
    Inline(heapless::Vec<u8, INLINE_FRAME_BYTES>),
    /// Heap buffer sized exactly to the chain
    #[cfg(feature = "alloc")]
    Heap(Vec<u8>),
}

impl CommandBuffer {
    /// Create a zeroed buffer for a chain, picking the storage once
    pub fn new(chain_length: u8) -> Result<Self> {
        check_chain_length(chain_length)?;

        let len = chain_length as usize * COMMAND_SIZE;
        if len <= INLINE_FRAME_BYTES {
            let mut bytes = heapless::Vec::new();
            bytes.resize(len, 0).map_err(|_| Error::OutOfMemory)?;
            return Ok(Self::Inline(bytes));
        }

        Self::allocate_heap(len)
    }

    #[cfg(feature = "alloc")]
    fn allocate_heap(len: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len).map_err(|_| {
            log::error!("Could not allocate {} byte command buffer", len);
            Error::OutOfMemory
        })?;
        bytes.resize(len, 0);
        Ok(Self::Heap(bytes))
    }

    #[cfg(not(feature = "alloc"))]
    fn allocate_heap(len: usize) -> Result<Self> {
        log::error!("{} byte command buffer needs the alloc feature", len);
        Err(Error::OutOfMemory)
    }

    /// Check if the frame lives in the inline array
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    /// Number of chips (slots) in the frame
    pub fn chain_length(&self) -> u8 {
        (self.as_bytes().len() / COMMAND_SIZE) as u8
    }

    /// The frame as it goes on the wire
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Inline(bytes) => bytes,
            #[cfg(feature = "alloc")]
            Self::Heap(bytes) => bytes,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Inline(bytes) => bytes,
            #[cfg(feature = "alloc")]
            Self::Heap(bytes) => bytes,
        }
    }

    /// Command in frame slot `index`
    pub fn command(&self, index: usize) -> Option<Command> {
        self.as_bytes()
            .chunks_exact(COMMAND_SIZE)
            .nth(index)
            .map(|pair| Command {
                address: pair[0],
                data: pair[1],
            })
    }

    /// Iterate over the commands in frame order
    pub fn commands(&self) -> impl Iterator<Item = Command> + '_ {
        self.as_bytes()
            .chunks_exact(COMMAND_SIZE)
            .map(|pair| Command {
                address: pair[0],
                data: pair[1],
            })
    }

    /// Fill every slot with a no-op
    pub fn clear(&mut self) {
        self.bytes_mut().fill(0);
    }

    /// Put the same command in every slot
    pub fn broadcast(&mut self, cmd: Command) {
        for pair in self.bytes_mut().chunks_exact_mut(COMMAND_SIZE) {
            pair.copy_from_slice(&cmd.to_bytes());
        }
    }

    /// Address a single chip: no-ops everywhere, `cmd` in the chip's slot
    pub fn target(&mut self, chip: u8, cmd: Command) -> Result<()> {
        let chain_length = self.chain_length();
        check_chip(chain_length, chip)?;

        self.clear();
        let offset = slot_index(chain_length, chip) * COMMAND_SIZE;
        self.bytes_mut()[offset..offset + COMMAND_SIZE].copy_from_slice(&cmd.to_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "alloc")]
    fn test_storage_selection() {
        assert!(CommandBuffer::new(1).unwrap().is_inline());
        assert!(CommandBuffer::new(2).unwrap().is_inline());
        assert!(!CommandBuffer::new(3).unwrap().is_inline());
        let buffer = CommandBuffer::new(254).unwrap();
        assert!(!buffer.is_inline());
        assert_eq!(buffer.as_bytes().len(), 508);
    }

    #[test]
    fn test_chain_length_bounds() {
        assert_eq!(
            CommandBuffer::new(0),
            Err(Error::InvalidArgument(ArgumentError::ChainLength(0)))
        );
        assert_eq!(
            CommandBuffer::new(255),
            Err(Error::InvalidArgument(ArgumentError::ChainLength(255)))
        );
    }

    #[test]
    #[cfg(feature = "alloc")]
    fn test_new_buffer_is_all_noops() {
        let buffer = CommandBuffer::new(5).unwrap();
        assert_eq!(buffer.chain_length(), 5);
        assert!(buffer.commands().all(Command::is_noop));
    }

    #[test]
    #[cfg(feature = "alloc")]
    fn test_target_places_command_in_reverse_slot() {
        for chain_length in MIN_CHAIN_LENGTH..=MAX_CHAIN_LENGTH {
            let mut buffer = CommandBuffer::new(chain_length).unwrap();
            for chip in 1..=chain_length {
                let cmd = Command::new(Register::Intensity, chip);
                buffer.target(chip, cmd).unwrap();

                let expected_slot = (chain_length - chip) as usize;
                for (slot, actual) in buffer.commands().enumerate() {
                    if slot == expected_slot {
                        assert_eq!(actual, cmd);
                    } else {
                        assert_eq!(actual, Command::NOOP);
                    }
                }
            }
        }
    }

    #[test]
    #[cfg(feature = "alloc")]
    fn test_target_clears_previous_frame() {
        let mut buffer = CommandBuffer::new(3).unwrap();
        buffer.broadcast(Command::new(Register::ScanLimit, 7));
        buffer.target(1, Command::new(Register::Digit0, 0x0F)).unwrap();
        assert_eq!(buffer.as_bytes(), &[0, 0, 0, 0, 0x01, 0x0F]);
    }

    #[test]
    #[cfg(not(feature = "alloc"))]
    fn test_long_chain_needs_alloc() {
        assert!(CommandBuffer::new(2).unwrap().is_inline());
        assert_eq!(CommandBuffer::new(3), Err(Error::OutOfMemory));
        assert_eq!(CommandBuffer::new(254), Err(Error::OutOfMemory));
    }

    #[test]
    fn test_target_rejects_bad_chip() {
        let mut buffer = CommandBuffer::new(2).unwrap();
        let cmd = Command::new(Register::Digit0, 1);
        assert_eq!(
            buffer.target(0, cmd),
            Err(Error::InvalidArgument(ArgumentError::ChipId {
                chip: 0,
                chain_length: 2
            }))
        );
        assert!(buffer.target(3, cmd).is_err());
    }

    #[test]
    #[cfg(feature = "alloc")]
    fn test_broadcast() {
        let mut buffer = CommandBuffer::new(4).unwrap();
        let cmd = Command::new(Register::DecodeMode, 0xFF);
        buffer.broadcast(cmd);
        assert!(buffer.commands().all(|c| c == cmd));
        assert_eq!(buffer.command(3), Some(cmd));
        assert_eq!(buffer.command(4), None);
    }
}
