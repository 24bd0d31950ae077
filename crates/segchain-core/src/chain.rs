//! Chain driver
//!
//! [`SegmentChain`] owns the transport and the command buffer of one
//! physical chain. Every operation validates its arguments first, then takes
//! the handle lock, then the bus, and holds both until all of its frames are
//! sent. The guards release the bus and then the lock on every exit path.

use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use crate::buffer::{check_chip, Command, CommandBuffer};
use crate::config::ChainConfig;
use crate::cursor::{check_digit_count, DigitCursor};
use crate::error::{Error, Result};
use crate::lock::ChainLock;
use crate::register::{
    scan_limit_value, DecodeMode, Intensity, Mode, Register, MAX_DIGIT, MIN_DIGIT,
};
use crate::transport::{BusGuard, Transport};

const TEST_SEQUENCE: [Command; 1] = [Command::new(Register::DisplayTest, 1)];
const NORMAL_SEQUENCE: [Command; 2] = [
    Command::new(Register::DisplayTest, 0),
    Command::new(Register::Shutdown, 1),
];
const SHUTDOWN_SEQUENCE: [Command; 2] = [
    Command::new(Register::DisplayTest, 0),
    Command::new(Register::Shutdown, 0),
];

/// Frames that put a chip into `mode`, in transmission order
fn mode_sequence(mode: Mode) -> &'static [Command] {
    match mode {
        Mode::Test => &TEST_SEQUENCE,
        Mode::Normal => &NORMAL_SEQUENCE,
        Mode::Shutdown => &SHUTDOWN_SEQUENCE,
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Chain,
    Chip(u8),
}

enum ChainState<T> {
    Attached { buffer: CommandBuffer, transport: T },
    Released,
}

/// Handle for one daisy chain of MAX7219 / MAX7221 chips
///
/// Chips are numbered from 1 (the chip wired to the controller) to
/// `chain_length`. The handle is `Sync` when the transport is `Send`, so it
/// can be shared between threads behind an `Arc`.
pub struct SegmentChain<T: Transport> {
    chain_length: u8,
    inline_buffer: bool,
    lock_timeout: Option<Duration>,
    bus_timeout: Option<Duration>,
    attached: AtomicBool,
    state: ChainLock<ChainState<T>>,
}

impl<T: Transport> SegmentChain<T> {
    /// Validate `config`, allocate the command buffer and attach the transport
    pub fn new(config: &ChainConfig, mut transport: T) -> Result<Self> {
        config.validate()?;
        let buffer = CommandBuffer::new(config.chain_length)?;
        let inline_buffer = buffer.is_inline();

        transport.attach(&config.bus)?;
        log::info!(
            "Attached chain of {} chip(s) at {} Hz, latch {:?}",
            config.chain_length,
            config.bus.clock_speed_hz,
            config.bus.latch
        );

        Ok(Self {
            chain_length: config.chain_length,
            inline_buffer,
            lock_timeout: config.lock_timeout,
            bus_timeout: config.bus_timeout,
            attached: AtomicBool::new(true),
            state: ChainLock::new(ChainState::Attached { buffer, transport }),
        })
    }

    /// Number of chips in the chain
    pub fn chain_length(&self) -> u8 {
        self.chain_length
    }

    /// Check if the command buffer is stored inline rather than on the heap
    pub fn uses_inline_buffer(&self) -> bool {
        self.inline_buffer
    }

    /// Check if the handle has not been released yet
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.is_attached() {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    fn check_target(&self, target: Target) -> Result<()> {
        self.ensure_attached()?;
        match target {
            Target::Chain => Ok(()),
            Target::Chip(chip) => check_chip(self.chain_length, chip),
        }
    }

    /// Run `f` with the lock and the bus held
    fn with_bus<R>(
        &self,
        f: impl FnOnce(&mut CommandBuffer, &mut BusGuard<'_, T>) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.lock(self.lock_timeout)?;
        let ChainState::Attached { buffer, transport } = &mut *state else {
            return Err(Error::InvalidState);
        };
        let mut bus = BusGuard::acquire(transport, self.bus_timeout)?;
        f(buffer, &mut bus)
    }

    /// Send `commands` as consecutive frames to one chip or to the whole chain
    fn send(&self, target: Target, commands: &[Command]) -> Result<()> {
        self.check_target(target)?;
        self.with_bus(|buffer, bus| {
            for &cmd in commands {
                match target {
                    Target::Chain => buffer.broadcast(cmd),
                    Target::Chip(chip) => buffer.target(chip, cmd)?,
                }
                log::debug!(
                    "{:?}: register {:#04x} <- {:#04x}",
                    target,
                    cmd.address,
                    cmd.data
                );
                bus.transmit(buffer.as_bytes()).map_err(|e| {
                    log::error!("Frame transmission failed: {}", e);
                    e
                })?;
            }
            Ok(())
        })
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Set the Code B decode mode on every chip
    pub fn configure_chain_decode(&self, mode: DecodeMode) -> Result<()> {
        self.send(Target::Chain, &[Command::new(Register::DecodeMode, mode.bits())])
    }

    /// Set the Code B decode mode on one chip
    pub fn configure_decode(&self, chip: u8, mode: DecodeMode) -> Result<()> {
        self.send(
            Target::Chip(chip),
            &[Command::new(Register::DecodeMode, mode.bits())],
        )
    }

    /// Set the number of scanned digits (1..=8) on every chip
    pub fn configure_chain_scan_limit(&self, digits: u8) -> Result<()> {
        let value = scan_limit_value(digits)?;
        self.send(Target::Chain, &[Command::new(Register::ScanLimit, value)])
    }

    /// Set the number of scanned digits (1..=8) on one chip
    pub fn configure_scan_limit(&self, chip: u8, digits: u8) -> Result<()> {
        let value = scan_limit_value(digits)?;
        self.send(Target::Chip(chip), &[Command::new(Register::ScanLimit, value)])
    }

    /// Set the intensity of every chip
    pub fn set_chain_intensity(&self, intensity: Intensity) -> Result<()> {
        self.send(
            Target::Chain,
            &[Command::new(Register::Intensity, intensity.register_value())],
        )
    }

    /// Set the intensity of one chip
    pub fn set_intensity(&self, chip: u8, intensity: Intensity) -> Result<()> {
        self.send(
            Target::Chip(chip),
            &[Command::new(Register::Intensity, intensity.register_value())],
        )
    }

    /// Put every chip in `mode`
    ///
    /// Normal and shutdown take two frames (leave display test, then set
    /// the shutdown register); both are sent under one bus acquisition.
    pub fn set_chain_mode(&self, mode: Mode) -> Result<()> {
        log::debug!("Chain mode -> {}", mode);
        self.send(Target::Chain, mode_sequence(mode))
    }

    /// Put one chip in `mode`; the other chips receive no-ops
    pub fn set_mode(&self, chip: u8, mode: Mode) -> Result<()> {
        log::debug!("Chip {} mode -> {}", chip, mode);
        self.send(Target::Chip(chip), mode_sequence(mode))
    }

    // ========================================================================
    // Digits
    // ========================================================================

    /// Write one digit register on one chip
    pub fn set_digit(&self, chip: u8, digit: u8, code: u8) -> Result<()> {
        let register = Register::digit(digit)?;
        self.send(Target::Chip(chip), &[Command::new(register, code)])
    }

    /// Write consecutive digits starting at `(start_chip, start_digit)`
    ///
    /// After digit 8 the run continues at digit 1 of the next chip. The run
    /// must be non-empty and must not pass the last digit of the chain.
    pub fn set_digits(&self, start_chip: u8, start_digit: u8, codes: &[u8]) -> Result<()> {
        self.ensure_attached()?;
        check_digit_count(self.chain_length, start_chip, start_digit, codes.len())?;
        let mut cursor = DigitCursor::new(self.chain_length, start_chip, start_digit)?;

        self.with_bus(|buffer, bus| {
            for &code in codes {
                let register = Register::digit(cursor.digit)?;
                buffer.target(cursor.chip, Command::new(register, code))?;
                bus.transmit(buffer.as_bytes()).map_err(|e| {
                    log::error!(
                        "Digit write failed at chip {} digit {}: {}",
                        cursor.chip,
                        cursor.digit,
                        e
                    );
                    e
                })?;
                cursor.advance();
            }
            Ok(())
        })
    }

    /// Write `code` to every digit of every chip
    pub fn set_chain(&self, code: u8) -> Result<()> {
        self.ensure_attached()?;
        self.with_bus(|buffer, bus| {
            for digit in MIN_DIGIT..=MAX_DIGIT {
                buffer.broadcast(Command::new(Register::digit(digit)?, code));
                bus.transmit(buffer.as_bytes())?;
            }
            Ok(())
        })
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Shut every chip down, detach the transport and free the buffer
    ///
    /// Every step is attempted even if an earlier one fails; the first error
    /// is returned. Releasing an already released handle fails with
    /// `InvalidState`.
    pub fn release(&self) -> Result<()> {
        let mut state = self.state.lock_recover(None)?;
        let ChainState::Attached {
            mut buffer,
            mut transport,
        } = mem::replace(&mut *state, ChainState::Released)
        else {
            return Err(Error::InvalidState);
        };
        self.attached.store(false, Ordering::Release);

        let mut first_error = None;

        match BusGuard::acquire(&mut transport, self.bus_timeout) {
            Ok(mut bus) => {
                for &cmd in mode_sequence(Mode::Shutdown) {
                    buffer.broadcast(cmd);
                    if let Err(e) = bus.transmit(buffer.as_bytes()) {
                        log::warn!("Failed to put chain in shutdown mode: {}", e);
                        first_error.get_or_insert(e);
                        break;
                    }
                }
            }
            Err(e) => {
                log::warn!("Failed to acquire bus for shutdown: {}", e);
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = transport.detach() {
            log::warn!("Failed to detach chain from bus: {}", e);
            first_error.get_or_insert(e);
        }

        drop(buffer);
        log::info!("Released chain of {} chip(s)", self.chain_length);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<T: Transport> Drop for SegmentChain<T> {
    fn drop(&mut self) {
        if self.is_attached() {
            if let Err(e) = self.release() {
                log::warn!("Error releasing chain on drop: {}", e);
            }
        }
    }
}

impl<T: Transport> core::fmt::Debug for SegmentChain<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SegmentChain")
            .field("chain_length", &self.chain_length)
            .field("inline_buffer", &self.inline_buffer)
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BusConfig, LatchLine};
    use crate::error::{ArgumentError, Resource, TransportError};
    use std::sync::{Arc, Mutex};
    use std::vec;
    use std::vec::Vec;

    #[derive(Debug, Default)]
    struct Log {
        frames: Vec<Vec<u8>>,
        acquired: usize,
        released: usize,
        detached: usize,
        fail_frame: Option<usize>,
        refuse_bus: bool,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Log>>);

    impl Recorder {
        fn log(&self) -> std::sync::MutexGuard<'_, Log> {
            self.0.lock().unwrap()
        }
    }

    impl Transport for Recorder {
        fn attach(&mut self, _config: &BusConfig) -> Result<()> {
            Ok(())
        }

        fn acquire_bus(&mut self, _timeout: Option<Duration>) -> Result<()> {
            let mut log = self.log();
            if log.refuse_bus {
                return Err(Error::Timeout(Resource::Bus));
            }
            log.acquired += 1;
            Ok(())
        }

        fn release_bus(&mut self) {
            self.log().released += 1;
        }

        fn transmit(&mut self, frame: &[u8]) -> Result<()> {
            let mut log = self.log();
            if log.fail_frame == Some(log.frames.len()) {
                return Err(TransportError::Transfer.into());
            }
            log.frames.push(frame.to_vec());
            Ok(())
        }

        fn detach(&mut self) -> Result<()> {
            self.log().detached += 1;
            Ok(())
        }
    }

    fn chain(chain_length: u8) -> (SegmentChain<Recorder>, Recorder) {
        let recorder = Recorder::default();
        let config = ChainConfig::new(
            chain_length,
            BusConfig::new(1_000_000, LatchLine::ChipSelect(0)),
        );
        let chain = SegmentChain::new(&config, recorder.clone()).unwrap();
        (chain, recorder)
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = ChainConfig::new(0, BusConfig::new(1_000_000, LatchLine::ChipSelect(0)));
        assert_eq!(
            SegmentChain::new(&config, Recorder::default()).err(),
            Some(Error::InvalidArgument(ArgumentError::ChainLength(0)))
        );
    }

    #[test]
    fn test_buffer_strategy() {
        assert!(chain(2).0.uses_inline_buffer());
        assert!(!chain(3).0.uses_inline_buffer());
    }

    #[test]
    fn test_per_chip_frame() {
        let (chain, recorder) = chain(3);
        chain.set_digit(1, 2, 0x5A).unwrap();
        assert_eq!(recorder.log().frames, vec![vec![0, 0, 0, 0, 0x02, 0x5A]]);

        chain.set_intensity(3, Intensity::MAX).unwrap();
        assert_eq!(recorder.log().frames[1], vec![0x0A, 0x0F, 0, 0, 0, 0]);
    }

    #[test]
    fn test_chain_scan_limit_broadcast() {
        let (chain, recorder) = chain(2);
        chain.configure_chain_scan_limit(8).unwrap();
        assert_eq!(recorder.log().frames, vec![vec![0x0B, 0x07, 0x0B, 0x07]]);
    }

    #[test]
    fn test_mode_sequences() {
        let (chain, recorder) = chain(2);
        chain.set_mode(2, Mode::Normal).unwrap();
        chain.set_chain_mode(Mode::Test).unwrap();
        let log = recorder.log();
        assert_eq!(
            log.frames,
            vec![
                vec![0x0F, 0x00, 0, 0],
                vec![0x0C, 0x01, 0, 0],
                vec![0x0F, 0x01, 0x0F, 0x01],
            ]
        );
        assert_eq!(log.acquired, 2);
        assert_eq!(log.released, 2);
    }

    #[test]
    fn test_validation_touches_nothing() {
        let (chain, recorder) = chain(2);
        assert!(chain.set_digit(3, 1, 0).is_err());
        assert!(chain.set_digit(1, 9, 0).is_err());
        assert!(chain.configure_scan_limit(1, 0).is_err());
        assert!(chain.set_digits(1, 1, &[]).is_err());
        assert!(chain.set_digits(2, 1, &[0; 9]).is_err());
        let log = recorder.log();
        assert!(log.frames.is_empty());
        assert_eq!(log.acquired, 0);
    }

    #[test]
    fn test_set_digits_walks_chips() {
        let (chain, recorder) = chain(2);
        chain.set_digits(1, 8, &[0xAA, 0xBB]).unwrap();
        let log = recorder.log();
        assert_eq!(log.frames, vec![vec![0, 0, 0x08, 0xAA], vec![0x01, 0xBB, 0, 0]]);
        assert_eq!(log.acquired, 1);
    }

    #[test]
    fn test_set_chain_is_digit_major() {
        let (chain, recorder) = chain(2);
        chain.set_chain(0x0F).unwrap();
        let log = recorder.log();
        assert_eq!(log.frames.len(), 8);
        for (i, frame) in log.frames.iter().enumerate() {
            let addr = i as u8 + 1;
            assert_eq!(frame, &vec![addr, 0x0F, addr, 0x0F]);
        }
    }

    #[test]
    fn test_failed_frame_releases_bus_and_lock() {
        let (chain, recorder) = chain(1);
        recorder.log().fail_frame = Some(1);
        assert_eq!(
            chain.set_chain_mode(Mode::Normal),
            Err(Error::Transport(TransportError::Transfer))
        );
        {
            let log = recorder.log();
            assert_eq!(log.frames.len(), 1);
            assert_eq!(log.acquired, log.released);
        }
        recorder.log().fail_frame = None;
        chain.set_digit(1, 1, 3).unwrap();
    }

    #[test]
    fn test_bus_timeout() {
        let (chain, recorder) = chain(1);
        recorder.log().refuse_bus = true;
        assert_eq!(chain.set_chain(0), Err(Error::Timeout(Resource::Bus)));
    }

    #[test]
    fn test_release() {
        let (chain, recorder) = chain(2);
        chain.release().unwrap();
        {
            let log = recorder.log();
            assert_eq!(log.frames, vec![vec![0x0F, 0, 0x0F, 0], vec![0x0C, 0, 0x0C, 0]]);
            assert_eq!(log.detached, 1);
        }
        assert!(!chain.is_attached());
        assert_eq!(chain.release(), Err(Error::InvalidState));
        assert_eq!(chain.set_digit(1, 1, 0), Err(Error::InvalidState));
    }

    #[test]
    fn test_release_after_failed_shutdown() {
        let (chain, recorder) = chain(2);
        recorder.log().fail_frame = Some(0);
        assert_eq!(
            chain.release(),
            Err(Error::Transport(TransportError::Transfer))
        );
        assert_eq!(recorder.log().detached, 1);
        assert_eq!(chain.release(), Err(Error::InvalidState));
    }

    #[test]
    fn test_drop_releases() {
        let (chain, recorder) = chain(1);
        drop(chain);
        assert_eq!(recorder.log().detached, 1);
    }
}
