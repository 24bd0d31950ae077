//! Transport over an embedded-hal 1.0 [`SpiDevice`]
//!
//! The device's chip select acts as the latch: it is asserted for the whole
//! frame and released at the end, which loads every chip in the chain. Bus
//! sharing is left to the `SpiDevice` implementation, so acquiring and
//! releasing the bus are no-ops here.

use core::time::Duration;

use embedded_hal::spi::{Error as _, SpiDevice};

use crate::config::BusConfig;
use crate::error::{Error, Result, TransportError};
use crate::transport::Transport;

/// [`Transport`] for any blocking `SpiDevice`
#[derive(Debug)]
pub struct SpiDeviceTransport<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> SpiDeviceTransport<SPI> {
    /// Wrap an SPI device whose chip select drives the chain's LOAD pin
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Give back the SPI device
    pub fn into_inner(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> Transport for SpiDeviceTransport<SPI> {
    fn attach(&mut self, config: &BusConfig) -> Result<()> {
        // Clock and CS are fixed when the SpiDevice is built
        log::debug!(
            "embedded-hal transport attached (requested {} Hz)",
            config.clock_speed_hz
        );
        Ok(())
    }

    fn acquire_bus(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn release_bus(&mut self) {}

    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        self.spi.write(frame).map_err(|e| {
            log::error!("SPI write failed: {:?}", e.kind());
            Error::Transport(TransportError::Transfer)
        })
    }

    fn detach(&mut self) -> Result<()> {
        Ok(())
    }
}
