//! Transport registry
//!
//! This crate opens a transport from a short string and builds a
//! [`SegmentChain`](segchain_core::SegmentChain) over it. The CLI only deals
//! with the type-erased chain returned from here, never with a concrete
//! transport type.
//!
//! ```text
//! "linux_spi:dev=/dev/spidev0.0,gpiochip=0"
//!  ─────┬───  ──────────────┬─────────────
//!    name         key=value options
//! ```
//!
//! # Example
//!
//! ```ignore
//! use segchain_core::{BusConfig, ChainConfig, LatchLine};
//! use segchain_registry::open_chain;
//!
//! let config = ChainConfig::new(4, BusConfig::new(1_000_000, LatchLine::ChipSelect(0)));
//! let chain = open_chain("dummy", &config)?;
//! chain.set_chain(0x0F)?;
//! ```

mod registry;

pub use registry::{
    available_transports, open_chain, open_transport, parse_transport_params,
    transport_names_short, BoxedChain, BoxedTransport, TransportInfo, TransportParams,
};
