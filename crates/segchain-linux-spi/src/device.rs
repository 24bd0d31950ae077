//! Linux SPI device implementation
//!
//! This module provides the `LinuxSpi` struct that implements the
//! `Transport` trait using Linux's spidev interface.

use crate::error::{LinuxSpiError, Result};

use segchain_core::error::{Error as CoreError, Result as CoreResult, TransportError};
use segchain_core::transport::BUS_TIMEOUT;
use segchain_core::{BusConfig, LatchLine, Transport};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

/// Default GPIO chip for a GPIO latch line
const DEFAULT_GPIOCHIP: &str = "/dev/gpiochip0";

/// Interval between non-blocking lock attempts
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// SPI mode bits
mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0x00;
    /// Controller does not drive chip select
    pub const NO_CS: u8 = 0x40;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of spi_ioc_transfer struct
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOC(_IOC_WRITE, type, nr, size) = (1 << 30) | (size << 16) | (type << 8) | nr
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

/// Configuration for opening a Linux SPI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// GPIO chip used when the latch is a GPIO line
    pub gpiochip: String,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            gpiochip: DEFAULT_GPIOCHIP.to_string(),
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the GPIO chip for a GPIO latch line
    pub fn with_gpiochip(mut self, gpiochip: impl Into<String>) -> Self {
        self.gpiochip = gpiochip.into();
        self
    }
}

/// LOAD line driven through the GPIO character device
struct GpioLatch {
    request: Request,
    offset: Offset,
}

impl GpioLatch {
    fn request(chip: &str, offset: Offset) -> Result<Self> {
        let mut config = Config::default();
        // LOAD idles high, frames are latched on the rising edge
        config.with_line(offset).as_output(Value::Active);

        let request = Request::from_config(config)
            .on_chip(chip)
            .with_consumer("segchain")
            .request()
            .map_err(|source| LinuxSpiError::LatchRequestFailed {
                chip: chip.to_string(),
                line: offset,
                source,
            })?;
        Ok(Self { request, offset })
    }

    fn set(&self, value: Value) -> Result<()> {
        self.request
            .set_value(self.offset, value)
            .map(|_| ())
            .map_err(LinuxSpiError::LatchFailed)
    }
}

/// Chain transport over Linux spidev
///
/// The device node is opened by [`LinuxSpi::open`]; the SPI mode, word size
/// and clock are applied when the driver attaches. Bus ownership is an
/// exclusive `flock` on the device node, so every process that drives the
/// same spidev through this transport is serialized.
pub struct LinuxSpi {
    /// File handle for spidev device
    file: File,
    /// Path, for log messages
    device: String,
    /// GPIO chip for a GPIO latch line
    gpiochip: String,
    /// Current speed in Hz, set on attach
    speed_hz: Option<u32>,
    /// GPIO latch line, if the native chip select is not used
    latch: Option<GpioLatch>,
    /// Whether this transport holds the device lock
    locked: bool,
}

impl LinuxSpi {
    /// Open a Linux SPI device node
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        Ok(Self {
            file,
            device: config.device.clone(),
            gpiochip: config.gpiochip.clone(),
            speed_hz: None,
            latch: None,
            locked: false,
        })
    }

    fn configure(&mut self, config: &BusConfig) -> Result<()> {
        let fd = self.file.as_raw_fd();

        let mode = match config.latch {
            Some(LatchLine::Gpio(_)) => mode::MODE_0 | mode::NO_CS,
            _ => mode::MODE_0,
        };
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| LinuxSpiError::SetModeFailed {
                mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        // Set bits per word (always 8)
        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        let speed = config.clock_speed_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| {
                LinuxSpiError::SetSpeedFailed {
                    speed,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }
        self.speed_hz = Some(speed);

        self.latch = match config.latch {
            Some(LatchLine::Gpio(offset)) => Some(GpioLatch::request(&self.gpiochip, offset)?),
            Some(LatchLine::ChipSelect(cs)) => {
                check_chip_select(&self.device, cs)?;
                log::debug!("linux_spi: Latching with native chip select {}", cs);
                None
            }
            None => return Err(LinuxSpiError::InvalidParameter("no latch line".into())),
        };

        log::info!(
            "linux_spi: Attached {} (mode={:#04x}, speed={} kHz)",
            self.device,
            mode,
            speed / 1000
        );
        Ok(())
    }

    /// Write one frame with a single SPI_IOC_MESSAGE(1)
    fn spi_write(&mut self, frame: &[u8]) -> Result<()> {
        let speed_hz = self.speed_hz.ok_or(LinuxSpiError::NotAttached)?;
        let transfer = SpiIocTransfer {
            tx_buf: frame.as_ptr() as u64,
            len: frame.len() as u32,
            speed_hz,
            bits_per_word: 8,
            ..Default::default()
        };

        let fd = self.file.as_raw_fd();
        let ret = unsafe {
            libc::ioctl(
                fd,
                ioctl::spi_ioc_message(1),
                &transfer as *const SpiIocTransfer,
            )
        };
        if ret < 0 {
            return Err(LinuxSpiError::TransferFailed(
                std::io::Error::last_os_error(),
            ));
        }
        Ok(())
    }

    fn try_lock(&self, operation: libc::c_int) -> std::io::Result<()> {
        let ret = unsafe { libc::flock(self.file.as_raw_fd(), operation) };
        if ret < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn lock(&mut self, timeout: Option<Duration>) -> CoreResult<()> {
        let Some(timeout) = timeout else {
            return self
                .try_lock(libc::LOCK_EX)
                .map_err(|e| transport_error(LinuxSpiError::LockFailed(e), TransportError::Busy));
        };

        let deadline = Instant::now() + timeout;
        loop {
            match self.try_lock(libc::LOCK_EX | libc::LOCK_NB) {
                Ok(()) => return Ok(()),
                Err(e) if e.raw_os_error() == Some(libc::EWOULDBLOCK) => {
                    if Instant::now() >= deadline {
                        log::debug!("linux_spi: {} still locked after {:?}", self.device, timeout);
                        return Err(BUS_TIMEOUT);
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(transport_error(
                        LinuxSpiError::LockFailed(e),
                        TransportError::Busy,
                    ))
                }
            }
        }
    }
}

/// Chip select encoded in a `/dev/spidevX.Y` node name (the `Y`)
fn spidev_chip_select(device: &str) -> Option<u8> {
    let name = device.rsplit('/').next()?;
    let (_, cs) = name.strip_prefix("spidev")?.split_once('.')?;
    cs.parse().ok()
}

/// The spidev node fixes the chip select, so a native latch must name the same one
fn check_chip_select(device: &str, cs: u8) -> Result<()> {
    match spidev_chip_select(device) {
        Some(node_cs) if node_cs != cs => Err(LinuxSpiError::InvalidParameter(format!(
            "latch cs{} does not match {} (chip select {})",
            cs, device, node_cs
        ))),
        Some(_) => Ok(()),
        None => {
            log::warn!(
                "linux_spi: Cannot tell the chip select of {}, assuming cs{}",
                device,
                cs
            );
            Ok(())
        }
    }
}

/// Log a backend error and map it to the core error kind
fn transport_error(err: LinuxSpiError, kind: TransportError) -> CoreError {
    log::error!("linux_spi: {}", err);
    CoreError::Transport(kind)
}

impl Transport for LinuxSpi {
    fn attach(&mut self, config: &BusConfig) -> CoreResult<()> {
        self.configure(config)
            .map_err(|e| transport_error(e, TransportError::Configure))
    }

    fn acquire_bus(&mut self, timeout: Option<Duration>) -> CoreResult<()> {
        if self.speed_hz.is_none() {
            return Err(CoreError::InvalidState);
        }
        self.lock(timeout)?;
        self.locked = true;
        Ok(())
    }

    fn release_bus(&mut self) {
        if !self.locked {
            return;
        }
        if let Err(e) = self.try_lock(libc::LOCK_UN) {
            log::warn!("linux_spi: Failed to unlock {}: {}", self.device, e);
        }
        self.locked = false;
    }

    fn transmit(&mut self, frame: &[u8]) -> CoreResult<()> {
        if let Some(latch) = &self.latch {
            latch
                .set(Value::Inactive)
                .map_err(|e| transport_error(e, TransportError::Latch))?;
        }

        self.spi_write(frame)
            .map_err(|e| transport_error(e, TransportError::Transfer))?;

        if let Some(latch) = &self.latch {
            latch
                .set(Value::Active)
                .map_err(|e| transport_error(e, TransportError::Latch))?;
        }
        Ok(())
    }

    fn detach(&mut self) -> CoreResult<()> {
        self.release_bus();
        // Dropping the request hands the line back to the kernel
        self.latch = None;
        self.speed_hz = None;
        log::info!("linux_spi: Detached {}", self.device);
        Ok(())
    }
}

/// Parse transport options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxSpiConfig, String> {
    let mut config = LinuxSpiConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "gpiochip" => {
                // Accept either a chip number or a path
                config.gpiochip = if value.chars().all(|c| c.is_ascii_digit()) && !value.is_empty()
                {
                    format!("/dev/gpiochip{}", value)
                } else if value.starts_with('/') {
                    value.to_string()
                } else {
                    return Err(format!("Invalid gpiochip value: {}", value));
                };
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err("No device specified. Use dev=/dev/spidevX.Y".to_string());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_device() {
        let config = parse_options(&[("dev", "/dev/spidev0.1")]).unwrap();
        assert_eq!(config.device, "/dev/spidev0.1");
        assert_eq!(config.gpiochip, DEFAULT_GPIOCHIP);
    }

    #[test]
    fn test_parse_options_gpiochip() {
        let config = parse_options(&[("dev", "/dev/spidev1.0"), ("gpiochip", "4")]).unwrap();
        assert_eq!(config.gpiochip, "/dev/gpiochip4");

        let config =
            parse_options(&[("dev", "/dev/spidev1.0"), ("gpiochip", "/dev/gpiochip2")]).unwrap();
        assert_eq!(config.gpiochip, "/dev/gpiochip2");

        assert!(parse_options(&[("dev", "/dev/spidev1.0"), ("gpiochip", "chip")]).is_err());
    }

    #[test]
    fn test_parse_options_requires_device() {
        assert!(parse_options(&[]).is_err());
        assert!(parse_options(&[("gpiochip", "0")]).is_err());
    }

    #[test]
    fn test_open_missing_device() {
        let err = LinuxSpi::open(&LinuxSpiConfig::new("/nonexistent/spidev9.9"))
            .err()
            .unwrap();
        assert!(matches!(err, LinuxSpiError::OpenFailed { .. }));
        assert!(matches!(
            LinuxSpi::open(&LinuxSpiConfig::default()),
            Err(LinuxSpiError::NoDevice)
        ));
    }

    #[test]
    fn test_spidev_chip_select() {
        assert_eq!(spidev_chip_select("/dev/spidev0.0"), Some(0));
        assert_eq!(spidev_chip_select("/dev/spidev1.3"), Some(3));
        assert_eq!(spidev_chip_select("/dev/display"), None);
        assert_eq!(spidev_chip_select("/dev/spidev0"), None);
    }

    #[test]
    fn test_native_latch_must_match_node() {
        assert!(check_chip_select("/dev/spidev0.0", 0).is_ok());
        assert!(check_chip_select("/dev/spidev0.1", 1).is_ok());
        assert!(matches!(
            check_chip_select("/dev/spidev0.0", 3),
            Err(LinuxSpiError::InvalidParameter(_))
        ));
        // Names without a chip select (udev symlinks) are accepted
        assert!(check_chip_select("/dev/max7219", 2).is_ok());
    }

    #[test]
    fn test_ioc_message_number() {
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6b00);
    }
}
