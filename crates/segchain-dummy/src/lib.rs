//! segchain-dummy - In-memory MAX7219 chain emulator for testing
//!
//! This crate provides a dummy transport that emulates a chain of MAX7219
//! chips in memory. Bytes are shifted through the chain one at a time like
//! in the real 16-bit shift registers, and every chip applies the command it
//! holds when the frame is latched. It's useful for testing and development
//! without real hardware.
//!
//! Clones of a [`DummyChain`] share the same emulated chain, so a test can
//! keep one clone to inspect the chips after handing the other to the
//! driver.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use segchain_core::error::{Error, Result, TransportError};
use segchain_core::register::DIGITS_PER_CHIP;
use segchain_core::transport::BUS_TIMEOUT;
use segchain_core::{BusConfig, Transport};

/// Register contents of one emulated chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChipState {
    /// Digit registers, digit 1 first
    pub digits: [u8; DIGITS_PER_CHIP],
    /// Decode mode register
    pub decode_mode: u8,
    /// Intensity register
    pub intensity: u8,
    /// Scan limit register
    pub scan_limit: u8,
    /// Shutdown register (0 = shutdown, 1 = normal)
    pub shutdown: u8,
    /// Display test register
    pub display_test: u8,
}

impl ChipState {
    /// Check if the chip is in shutdown mode
    pub fn is_shutdown(&self) -> bool {
        self.shutdown & 0x01 == 0
    }

    /// Check if the chip is in display test mode
    pub fn in_test(&self) -> bool {
        self.display_test & 0x01 != 0
    }

    /// Contents of a 1-based digit register (panics outside 1..=8)
    pub fn digit(&self, digit: u8) -> u8 {
        self.digits[digit as usize - 1]
    }

    fn apply(&mut self, address: u8, data: u8) {
        match address & 0x0F {
            0x00 => {}
            a @ 0x01..=0x08 => self.digits[(a - 1) as usize] = data,
            0x09 => self.decode_mode = data,
            0x0A => self.intensity = data & 0x0F,
            0x0B => self.scan_limit = data & 0x07,
            0x0C => self.shutdown = data,
            0x0F => self.display_test = data,
            // 0x0D and 0x0E are not implemented by the chip
            _ => {}
        }
    }
}

impl fmt::Display for ChipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.in_test() {
            "test"
        } else if self.is_shutdown() {
            "shutdown"
        } else {
            "normal"
        };
        write!(
            f,
            "{:8} decode={:02x} intensity={:2} scan={} digits={:02x?}",
            mode,
            self.decode_mode,
            self.intensity + 1,
            self.scan_limit + 1,
            self.digits
        )
    }
}

/// Bus activity seen by the emulator, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Device attached with this configuration
    Attach(BusConfig),
    /// Bus acquired
    Acquire,
    /// Frame of this many bytes transmitted
    Transmit(usize),
    /// Bus released
    Release,
    /// Device detached
    Detach,
}

#[derive(Debug)]
struct Emulator {
    chips: Vec<ChipState>,
    shift: Vec<u8>,
    bus: Option<BusConfig>,
    bus_owned: bool,
    frames: Vec<Vec<u8>>,
    events: Vec<BusEvent>,
    transmit_count: usize,
    fail_transmit: Option<usize>,
    bus_held_elsewhere: bool,
    fail_detach: bool,
    transmit_delay: Option<Duration>,
}

impl Emulator {
    fn shift_in(&mut self, byte: u8) {
        // An empty chain passes every byte straight through
        if self.shift.is_empty() {
            return;
        }
        self.shift.rotate_right(1);
        self.shift[0] = byte;
    }

    fn latch(&mut self) {
        for (index, chip) in self.chips.iter_mut().enumerate() {
            let address = self.shift[2 * index + 1];
            let data = self.shift[2 * index];
            chip.apply(address, data);
        }
    }
}

/// Emulated MAX7219 chain
///
/// The chips power up in shutdown mode with every register cleared.
#[derive(Debug, Clone)]
pub struct DummyChain {
    inner: Arc<Mutex<Emulator>>,
}

impl DummyChain {
    /// Create an emulated chain of `chain_length` chips
    pub fn new(chain_length: u8) -> Self {
        let chips = chain_length as usize;
        Self {
            inner: Arc::new(Mutex::new(Emulator {
                chips: vec![ChipState::default(); chips],
                shift: vec![0; chips * 2],
                bus: None,
                bus_owned: false,
                frames: Vec::new(),
                events: Vec::new(),
                transmit_count: 0,
                fail_transmit: None,
                bus_held_elsewhere: false,
                fail_detach: false,
                transmit_delay: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, Emulator> {
        // The emulator never panics while holding its own lock
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of emulated chips
    pub fn chain_length(&self) -> u8 {
        self.state().chips.len() as u8
    }

    /// Register contents of a 1-based chip
    ///
    /// # Panics
    ///
    /// Panics if `chip` is not in the chain.
    pub fn chip(&self, chip: u8) -> ChipState {
        self.state().chips[chip as usize - 1]
    }

    /// Register contents of every chip, chip 1 first
    pub fn chips(&self) -> Vec<ChipState> {
        self.state().chips.clone()
    }

    /// Every frame transmitted so far
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state().frames.clone()
    }

    /// Every bus event so far
    pub fn events(&self) -> Vec<BusEvent> {
        self.state().events.clone()
    }

    /// Forget recorded frames and events
    pub fn clear_history(&self) {
        let mut state = self.state();
        state.frames.clear();
        state.events.clear();
    }

    /// Check if a device is attached
    pub fn is_attached(&self) -> bool {
        self.state().bus.is_some()
    }

    /// Check if the bus is currently acquired
    pub fn bus_owned(&self) -> bool {
        self.state().bus_owned
    }

    /// Fail the transmission with this 0-based index (counted from creation)
    pub fn fail_transmit_at(&self, index: usize) {
        self.state().fail_transmit = Some(index);
    }

    /// Make bus acquisition fail as if another device owned the bus
    pub fn hold_bus_elsewhere(&self, held: bool) {
        self.state().bus_held_elsewhere = held;
    }

    /// Make the next detach fail
    pub fn fail_detach(&self) {
        self.state().fail_detach = true;
    }

    /// Sleep this long in every transmission
    pub fn set_transmit_delay(&self, delay: Option<Duration>) {
        self.state().transmit_delay = delay;
    }

    /// Render the chip registers, one line per chip
    pub fn render(&self) -> String {
        self.state()
            .chips
            .iter()
            .enumerate()
            .map(|(index, chip)| format!("chip {:3}: {}\n", index + 1, chip))
            .collect()
    }
}

impl Transport for DummyChain {
    fn attach(&mut self, config: &BusConfig) -> Result<()> {
        let mut state = self.state();
        if state.bus.is_some() {
            log::error!("Dummy chain is already attached");
            return Err(TransportError::Configure.into());
        }
        state.bus = Some(*config);
        state.events.push(BusEvent::Attach(*config));
        log::debug!(
            "Dummy chain of {} chip(s) attached at {} Hz",
            state.chips.len(),
            config.clock_speed_hz
        );
        Ok(())
    }

    fn acquire_bus(&mut self, timeout: Option<Duration>) -> Result<()> {
        let mut state = self.state();
        if state.bus.is_none() {
            return Err(Error::InvalidState);
        }
        if state.bus_held_elsewhere {
            drop(state);
            return match timeout {
                Some(timeout) => {
                    thread::sleep(timeout);
                    Err(BUS_TIMEOUT)
                }
                None => Err(TransportError::Busy.into()),
            };
        }
        state.bus_owned = true;
        state.events.push(BusEvent::Acquire);
        Ok(())
    }

    fn release_bus(&mut self) {
        let mut state = self.state();
        state.bus_owned = false;
        state.events.push(BusEvent::Release);
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        let delay = self.state().transmit_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let mut state = self.state();
        if !state.bus_owned {
            log::error!("Frame transmitted without owning the bus");
            return Err(TransportError::Transfer.into());
        }

        let index = state.transmit_count;
        state.transmit_count += 1;
        if state.fail_transmit == Some(index) {
            log::error!("Injected failure on transmission {}", index);
            return Err(TransportError::Transfer.into());
        }

        for &byte in frame {
            state.shift_in(byte);
        }
        state.latch();
        state.frames.push(frame.to_vec());
        state.events.push(BusEvent::Transmit(frame.len()));
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        let mut state = self.state();
        if std::mem::take(&mut state.fail_detach) {
            log::error!("Injected detach failure");
            return Err(TransportError::Detach.into());
        }
        state.bus = None;
        state.events.push(BusEvent::Detach);
        drop(state);
        log::debug!("Dummy chain detached, final state:\n{}", self.render());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segchain_core::LatchLine;

    fn attached(chain_length: u8) -> DummyChain {
        let mut chain = DummyChain::new(chain_length);
        chain
            .attach(&BusConfig::new(1_000_000, LatchLine::ChipSelect(0)))
            .unwrap();
        chain
    }

    #[test]
    fn test_power_on_state() {
        let chain = DummyChain::new(3);
        assert_eq!(chain.chain_length(), 3);
        assert!(chain.chips().iter().all(ChipState::is_shutdown));
        assert!(!chain.is_attached());
    }

    #[test]
    fn test_frame_reaches_reverse_chip() {
        let mut chain = attached(3);
        chain.acquire_bus(None).unwrap();
        // Slot 0 goes to chip 3, slot 2 to chip 1
        chain
            .transmit(&[0x01, 0x33, 0x00, 0x00, 0x01, 0x11])
            .unwrap();
        chain.release_bus();

        assert_eq!(chain.chip(3).digit(1), 0x33);
        assert_eq!(chain.chip(2).digit(1), 0x00);
        assert_eq!(chain.chip(1).digit(1), 0x11);
    }

    #[test]
    fn test_short_frame_misaddresses() {
        let mut chain = attached(2);
        chain.acquire_bus(None).unwrap();
        chain.transmit(&[0x0A, 0x05, 0x0A, 0x05]).unwrap();
        // Only one command: lands in chip 1, chip 2 gets chip 1's old pair
        chain.transmit(&[0x0A, 0x09]).unwrap();
        chain.release_bus();

        assert_eq!(chain.chip(1).intensity, 0x09);
        assert_eq!(chain.chip(2).intensity, 0x05);
    }

    #[test]
    fn test_empty_chain_ignores_frames() {
        let mut chain = attached(0);
        chain.acquire_bus(None).unwrap();
        chain.transmit(&[0x01, 0x08]).unwrap();
        chain.release_bus();

        assert!(chain.chips().is_empty());
        assert_eq!(chain.frames(), vec![vec![0x01, 0x08]]);
    }

    #[test]
    fn test_transmit_requires_bus() {
        let mut chain = attached(1);
        assert_eq!(
            chain.transmit(&[0, 0]),
            Err(Error::Transport(TransportError::Transfer))
        );
    }

    #[test]
    fn test_bus_held_elsewhere() {
        let mut chain = attached(1);
        chain.hold_bus_elsewhere(true);
        assert_eq!(
            chain.acquire_bus(Some(Duration::from_millis(1))),
            Err(BUS_TIMEOUT)
        );
        assert_eq!(
            chain.acquire_bus(None),
            Err(Error::Transport(TransportError::Busy))
        );
    }

    #[test]
    fn test_injected_failures() {
        let mut chain = attached(1);
        chain.fail_transmit_at(1);
        chain.fail_detach();
        chain.acquire_bus(None).unwrap();
        assert!(chain.transmit(&[0x0C, 0x01]).is_ok());
        assert!(chain.transmit(&[0x0C, 0x00]).is_err());
        chain.release_bus();
        assert!(!chain.chip(1).is_shutdown());

        assert!(chain.detach().is_err());
        assert!(chain.is_attached());
        assert!(chain.detach().is_ok());
        assert!(!chain.is_attached());
    }

    #[test]
    fn test_render() {
        let chain = DummyChain::new(2);
        let text = chain.render();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("chip   1: shutdown"));
    }
}
