//! Transport registry and chain initialization

use segchain_core::{ChainConfig, SegmentChain, Transport};
use std::collections::HashMap;

/// Type-erased transport
pub type BoxedTransport = Box<dyn Transport + Send>;

/// Chain handle over a type-erased transport
pub type BoxedChain = SegmentChain<BoxedTransport>;

/// Parsed transport parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParams {
    /// Transport name as given
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl TransportParams {
    #[allow(dead_code)] // Used in feature-gated code
    fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a transport string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_transport_params(s: &str) -> Result<TransportParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    if name.is_empty() {
        return Err("Empty transport name".into());
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(TransportParams {
        name: name.to_string(),
        params,
    })
}

/// Open a transport by specification
///
/// `chain_length` sizes the emulated chain of the dummy transport.
#[allow(unused_variables)] // chain_length is only used by feature-gated transports
pub fn open_transport(
    transport: &str,
    chain_length: u8,
) -> Result<BoxedTransport, Box<dyn std::error::Error>> {
    let params = parse_transport_params(transport)?;

    match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params, chain_length),

        #[cfg(feature = "linux-spi")]
        "linux_spi" | "linux-spi" | "spidev" => open_linux_spi(&params),

        _ => Err(format!(
            "Unknown transport: {} (available: {})",
            params.name,
            transport_names_short()
        )
        .into()),
    }
}

/// Open a transport and create a chain handle over it
///
/// This is the main entry point for the CLI.
pub fn open_chain(
    transport: &str,
    config: &ChainConfig,
) -> Result<BoxedChain, Box<dyn std::error::Error>> {
    // Reject bad chain settings before touching any device
    config.validate()?;
    let transport = open_transport(transport, config.chain_length)?;
    Ok(SegmentChain::new(config, transport)?)
}

#[cfg(feature = "dummy")]
fn open_dummy(
    params: &TransportParams,
    chain_length: u8,
) -> Result<BoxedTransport, Box<dyn std::error::Error>> {
    for key in params.params.keys() {
        log::warn!("dummy: Unknown option: {}", key);
    }
    log::info!("Opening dummy chain of {} chip(s)...", chain_length);
    Ok(Box::new(segchain_dummy::DummyChain::new(chain_length)))
}

#[cfg(feature = "linux-spi")]
fn open_linux_spi(params: &TransportParams) -> Result<BoxedTransport, Box<dyn std::error::Error>> {
    use segchain_linux_spi::{parse_options, LinuxSpi};

    log::info!("Opening Linux SPI transport...");

    let config = parse_options(&params.options())
        .map_err(|e| format!("Invalid linux_spi parameters: {}", e))?;

    let spi = LinuxSpi::open(&config).map_err(|e| {
        format!(
            "Failed to open Linux SPI device: {}\n\
             Make sure the device exists and you have read/write permissions.\n\
             You may need to: sudo usermod -aG spi $USER",
            e
        )
    })?;

    Ok(Box::new(spi))
}

/// Information about a transport
#[derive(Debug, Clone)]
pub struct TransportInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available transports (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_transports() -> Vec<TransportInfo> {
    let mut transports = Vec::new();

    #[cfg(feature = "dummy")]
    transports.push(TransportInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory emulated MAX7219 chain for testing",
    });

    #[cfg(feature = "linux-spi")]
    transports.push(TransportInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev (dev=/dev/spidevX.Y, gpiochip=<N|path> for a GPIO latch)",
    });

    transports
}

/// Comma-separated list of available transport names
pub fn transport_names_short() -> String {
    let transports = available_transports();
    if transports.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = transports.iter().map(|t| t.name).collect();
    names.join(", ")
}
