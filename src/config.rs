//! Configuration file support
//!
//! Chain settings can be kept in a TOML file and overridden on the command
//! line:
//!
//! ```toml
//! [chain]
//! transport = "linux_spi:dev=/dev/spidev0.0"
//! chain_length = 4
//! speed = "10M"
//! latch = "gpio:25"
//! lock_timeout_ms = 100
//! bus_timeout_ms = 100
//! ```

use crate::cli::{self, Cli};
use segchain_core::config::MAX_CLOCK_HZ;
use segchain_core::{BusConfig, ChainConfig, LatchLine};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Transport used when neither the command line nor the file names one
pub const DEFAULT_TRANSPORT: &str = "dummy";

/// Errors from loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid latch in config file: {0}")]
    Latch(String),
}

/// Configuration file structure
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub chain: ChainSection,
}

/// `[chain]` table
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSection {
    pub transport: Option<String>,
    pub chain_length: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_speed")]
    pub speed: Option<u32>,
    pub latch: Option<String>,
    pub lock_timeout_ms: Option<u64>,
    pub bus_timeout_ms: Option<u64>,
}

/// Deserialize a clock speed given as a number or a string like "500k"
fn deserialize_speed<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SpeedOrStr {
        Int(u32),
        Str(String),
    }

    match SpeedOrStr::deserialize(deserializer)? {
        SpeedOrStr::Int(n) => Ok(Some(n)),
        SpeedOrStr::Str(s) => cli::parse_speed(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl ConfigFile {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content, path)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Effective settings after merging defaults, file and command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub transport: String,
    pub chain: ChainConfig,
}

impl Settings {
    /// Merge settings; the command line wins over the file, the file over defaults
    pub fn resolve(file: Option<&ConfigFile>, cli: &Cli) -> Result<Self, ConfigError> {
        let section = file.map(|f| &f.chain);
        let file_latch = section
            .and_then(|s| s.latch.as_deref())
            .map(cli::parse_latch)
            .transpose()
            .map_err(ConfigError::Latch)?;

        let transport = cli
            .transport
            .clone()
            .or_else(|| section.and_then(|s| s.transport.clone()))
            .unwrap_or_else(|| DEFAULT_TRANSPORT.to_string());
        let chain_length = cli
            .chain_length
            .or_else(|| section.and_then(|s| s.chain_length))
            .unwrap_or(1);
        let speed = cli
            .speed
            .or_else(|| section.and_then(|s| s.speed))
            .unwrap_or(MAX_CLOCK_HZ);
        let latch = cli
            .latch
            .or(file_latch)
            .unwrap_or(LatchLine::ChipSelect(0));

        let mut chain = ChainConfig::new(chain_length, BusConfig::new(speed, latch));
        if let Some(ms) = section.and_then(|s| s.lock_timeout_ms) {
            chain = chain.with_lock_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = section.and_then(|s| s.bus_timeout_ms) {
            chain = chain.with_bus_timeout(Duration::from_millis(ms));
        }

        Ok(Self { transport, chain })
    }
}
