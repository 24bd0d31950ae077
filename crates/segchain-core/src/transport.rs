//! Transport trait definitions
//!
//! A transport owns the serial bus device that the chain hangs off. The
//! driver attaches it once, then for every command sequence acquires the
//! bus, transmits one or more frames and releases the bus again.
//!
//! ## Example: Implementing a transport
//!
//! ```ignore
//! impl Transport for MySpi {
//!     fn attach(&mut self, config: &BusConfig) -> Result<()> {
//!         self.set_speed(config.clock_speed_hz)
//!     }
//!
//!     fn acquire_bus(&mut self, _timeout: Option<Duration>) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn release_bus(&mut self) {}
//!
//!     fn transmit(&mut self, frame: &[u8]) -> Result<()> {
//!         self.write_and_latch(frame)
//!     }
//!
//!     fn detach(&mut self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

use core::time::Duration;

use crate::config::BusConfig;
use crate::error::{Error, Resource, Result};

/// Serial bus transport for a chain of display drivers
pub trait Transport {
    /// Register the chain as a device on the bus
    fn attach(&mut self, config: &BusConfig) -> Result<()>;

    /// Take exclusive ownership of the bus
    ///
    /// `None` waits without bound. A transport that gives up returns
    /// `Error::Timeout(Resource::Bus)`.
    fn acquire_bus(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Give up bus ownership taken with [`acquire_bus`](Self::acquire_bus)
    fn release_bus(&mut self);

    /// Shift one frame into the chain and latch it at the end
    fn transmit(&mut self, frame: &[u8]) -> Result<()>;

    /// Remove the chain device from the bus
    fn detach(&mut self) -> Result<()>;
}

#[cfg(feature = "alloc")]
impl Transport for alloc::boxed::Box<dyn Transport + Send> {
    fn attach(&mut self, config: &BusConfig) -> Result<()> {
        (**self).attach(config)
    }

    fn acquire_bus(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).acquire_bus(timeout)
    }

    fn release_bus(&mut self) {
        (**self).release_bus()
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        (**self).transmit(frame)
    }

    fn detach(&mut self) -> Result<()> {
        (**self).detach()
    }
}

/// Scoped bus ownership; the bus is released when the guard drops
pub struct BusGuard<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> BusGuard<'a, T> {
    /// Acquire the bus, waiting at most `timeout`
    pub fn acquire(transport: &'a mut T, timeout: Option<Duration>) -> Result<Self> {
        transport.acquire_bus(timeout).map_err(|e| {
            log::debug!("Bus acquisition failed: {}", e);
            e
        })?;
        Ok(Self { transport })
    }

    /// Transmit one frame while holding the bus
    pub fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        log::trace!("frame {:02x?}", frame);
        self.transport.transmit(frame)
    }
}

impl<T: Transport + ?Sized> Drop for BusGuard<'_, T> {
    fn drop(&mut self) {
        self.transport.release_bus();
    }
}

/// Error returned by transports that cannot get the bus in time
pub const BUS_TIMEOUT: Error = Error::Timeout(Resource::Bus);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        acquired: usize,
        released: usize,
        frames: usize,
        refuse: bool,
    }

    impl Transport for Counting {
        fn attach(&mut self, _config: &BusConfig) -> Result<()> {
            Ok(())
        }

        fn acquire_bus(&mut self, _timeout: Option<Duration>) -> Result<()> {
            if self.refuse {
                return Err(BUS_TIMEOUT);
            }
            self.acquired += 1;
            Ok(())
        }

        fn release_bus(&mut self) {
            self.released += 1;
        }

        fn transmit(&mut self, _frame: &[u8]) -> Result<()> {
            self.frames += 1;
            Ok(())
        }

        fn detach(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let mut transport = Counting::default();
        {
            let mut bus = BusGuard::acquire(&mut transport, None).unwrap();
            bus.transmit(&[0, 0]).unwrap();
            bus.transmit(&[0, 0]).unwrap();
        }
        assert_eq!(transport.acquired, 1);
        assert_eq!(transport.released, 1);
        assert_eq!(transport.frames, 2);
    }

    #[test]
    fn test_failed_acquire_does_not_release() {
        let mut transport = Counting {
            refuse: true,
            ..Default::default()
        };
        assert!(matches!(
            BusGuard::acquire(&mut transport, Some(Duration::from_millis(1))),
            Err(Error::Timeout(Resource::Bus))
        ));
        assert_eq!(transport.released, 0);
    }
}
