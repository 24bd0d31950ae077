//! Chain and bus configuration

use core::time::Duration;

use crate::buffer::check_chain_length;
use crate::error::{ArgumentError, Result};

/// Highest serial clock the chips accept
pub const MAX_CLOCK_HZ: u32 = 10_000_000;

/// Line that latches a frame into the chain (LOAD on MAX7219, CS on MAX7221)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchLine {
    /// Native chip select of the SPI controller
    ///
    /// Transports whose device already fixes the chip select (a spidev
    /// node, an embedded-hal `SpiDevice`) check or ignore the index.
    ChipSelect(u8),
    /// GPIO line offset driven by the transport
    Gpio(u32),
}

impl core::fmt::Display for LatchLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LatchLine::ChipSelect(cs) => write!(f, "cs{}", cs),
            LatchLine::Gpio(line) => write!(f, "gpio:{}", line),
        }
    }
}

/// Bus device configuration handed to [`Transport::attach`](crate::Transport::attach)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Serial clock in Hz, 1..=10 MHz
    pub clock_speed_hz: u32,
    /// Latch line; mandatory
    pub latch: Option<LatchLine>,
}

impl BusConfig {
    /// Create a bus configuration with a latch line
    pub const fn new(clock_speed_hz: u32, latch: LatchLine) -> Self {
        Self {
            clock_speed_hz,
            latch: Some(latch),
        }
    }

    /// Check the clock speed and latch line
    pub fn validate(&self) -> Result<()> {
        if self.clock_speed_hz == 0 || self.clock_speed_hz > MAX_CLOCK_HZ {
            return Err(ArgumentError::ClockSpeed(self.clock_speed_hz).into());
        }
        if self.latch.is_none() {
            return Err(ArgumentError::MissingLatch.into());
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            clock_speed_hz: MAX_CLOCK_HZ,
            latch: None,
        }
    }
}

/// Everything needed to create a chain handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainConfig {
    /// Bus device configuration
    pub bus: BusConfig,
    /// Number of chips in the chain, 1..=254
    pub chain_length: u8,
    /// How long an operation waits for the handle lock (`None` waits forever)
    pub lock_timeout: Option<Duration>,
    /// How long an operation waits for the bus (`None` waits forever)
    pub bus_timeout: Option<Duration>,
}

impl ChainConfig {
    /// Create a configuration that waits without bound
    pub const fn new(chain_length: u8, bus: BusConfig) -> Self {
        Self {
            bus,
            chain_length,
            lock_timeout: None,
            bus_timeout: None,
        }
    }

    /// Set the lock acquisition timeout
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Set the bus acquisition timeout
    pub const fn with_bus_timeout(mut self, timeout: Duration) -> Self {
        self.bus_timeout = Some(timeout);
        self
    }

    /// Check bus settings and chain length
    pub fn validate(&self) -> Result<()> {
        self.bus.validate()?;
        check_chain_length(self.chain_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn bus() -> BusConfig {
        BusConfig::new(1_000_000, LatchLine::ChipSelect(0))
    }

    #[test]
    fn test_valid_config() {
        assert!(ChainConfig::new(1, bus()).validate().is_ok());
        assert!(ChainConfig::new(254, bus()).validate().is_ok());
        let config = ChainConfig::new(2, BusConfig::new(MAX_CLOCK_HZ, LatchLine::Gpio(17)))
            .with_lock_timeout(Duration::from_millis(5));
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_timeout, Some(Duration::from_millis(5)));
        assert_eq!(config.bus_timeout, None);
    }

    #[test]
    fn test_clock_speed_bounds() {
        let mut config = ChainConfig::new(1, bus());
        config.bus.clock_speed_hz = 0;
        assert_eq!(
            config.validate(),
            Err(Error::InvalidArgument(ArgumentError::ClockSpeed(0)))
        );
        config.bus.clock_speed_hz = MAX_CLOCK_HZ + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_latch() {
        let config = ChainConfig::new(1, BusConfig::default());
        assert_eq!(
            config.validate(),
            Err(Error::InvalidArgument(ArgumentError::MissingLatch))
        );
    }

    #[test]
    fn test_chain_length_bounds() {
        assert!(ChainConfig::new(0, bus()).validate().is_err());
        assert!(ChainConfig::new(255, bus()).validate().is_err());
    }
}
