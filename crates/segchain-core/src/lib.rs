//! segchain-core - Core library for daisy-chained segment display drivers
//!
//! This crate drives one or more cascaded MAX7219 / MAX7221 8-digit LED
//! drivers that share a single SPI data line. Every chip in the chain is
//! addressed through one [`SegmentChain`] handle.
//!
//! The register model, command buffer, digit cursor and font tables are
//! `no_std` compatible. The chain driver itself needs `std` for its lock.
//!
//! # Features
//!
//! - `std` - Enable the chain driver (includes `alloc`)
//! - `alloc` - Enable heap command buffers for chains longer than two chips
//! - `embedded-hal` - Transport adapter for any `embedded_hal::spi::SpiDevice`
//!
//! # Example
//!
//! ```ignore
//! use segchain_core::{BusConfig, ChainConfig, LatchLine, SegmentChain};
//! use segchain_core::register::{DecodeMode, Intensity, Mode};
//!
//! let config = ChainConfig::new(4, BusConfig::new(10_000_000, LatchLine::ChipSelect(0)));
//! let chain = SegmentChain::new(&config, transport)?;
//!
//! chain.configure_chain_scan_limit(8)?;
//! chain.configure_chain_decode(DecodeMode::ALL)?;
//! chain.set_chain_intensity(Intensity::MIN)?;
//! chain.set_chain_mode(Mode::Normal)?;
//! chain.set_digits(1, 1, &[1, 2, 3, 4])?;
//! chain.release()?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod buffer;
#[cfg(feature = "std")]
pub mod chain;
pub mod config;
pub mod cursor;
pub mod error;
pub mod font;
#[cfg(feature = "embedded-hal")]
pub mod hal;
#[cfg(feature = "std")]
pub mod lock;
pub mod register;
pub mod transport;

pub use buffer::{Command, CommandBuffer};
#[cfg(feature = "std")]
pub use chain::SegmentChain;
pub use config::{BusConfig, ChainConfig, LatchLine};
pub use error::{ArgumentError, Error, Resource, Result, TransportError};
pub use transport::{BusGuard, Transport};
