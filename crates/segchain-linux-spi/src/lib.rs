//! segchain-linux-spi - Linux spidev transport
//!
//! This crate drives a MAX7219 / MAX7221 chain through the Linux
//! `/dev/spidevX.Y` device interface.
//!
//! # Latch line
//!
//! The chain latches a frame on the rising edge of LOAD (CS on MAX7221).
//! With `LatchLine::ChipSelect` the controller's own chip select for the
//! spidev node is wired to LOAD; its number must match the `Y` of
//! `/dev/spidevX.Y`. With `LatchLine::Gpio(offset)` the spidev
//! node is put in `SPI_NO_CS` mode and the LOAD pin is a GPIO line on the
//! configured gpiochip, pulled low for the frame and raised to latch it.
//!
//! # Example
//!
//! ```no_run
//! use segchain_core::{BusConfig, ChainConfig, LatchLine, SegmentChain};
//! use segchain_linux_spi::{LinuxSpi, LinuxSpiConfig};
//!
//! let spi = LinuxSpi::open(&LinuxSpiConfig::new("/dev/spidev0.0"))?;
//! let config = ChainConfig::new(2, BusConfig::new(1_000_000, LatchLine::ChipSelect(0)));
//! let chain = SegmentChain::new(&config, spi)?;
//! chain.set_chain(0x0F)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with segchain CLI
//!
//! ```bash
//! # Native chip select
//! segchain -t linux_spi:dev=/dev/spidev0.0 -n 4 init
//!
//! # LOAD on GPIO line 25 of gpiochip0
//! segchain -t linux_spi:dev=/dev/spidev0.0,gpiochip=0 --latch gpio:25 -n 4 init
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` (and `/dev/gpiochipN` for a GPIO latch)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxSpi, LinuxSpiConfig};
pub use error::{LinuxSpiError, Result};
