//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use segchain_core::font::Font;
use segchain_core::register::Mode;
use segchain_core::LatchLine;
use std::path::PathBuf;
use std::time::Duration;

/// Parse a string as a hex or decimal u8
pub fn parse_hex_u8(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a clock speed: plain Hz or with a `k` / `M` suffix
pub fn parse_speed(s: &str) -> Result<u32, String> {
    let (digits, scale) = match s.trim().to_ascii_lowercase() {
        v if v.ends_with('m') => (v[..v.len() - 1].to_string(), 1_000_000),
        v if v.ends_with('k') => (v[..v.len() - 1].to_string(), 1_000),
        v => (v, 1),
    };
    let value: u32 = digits
        .parse()
        .map_err(|_| format!("Invalid speed: {}", s))?;
    value
        .checked_mul(scale)
        .ok_or_else(|| format!("Speed out of range: {}", s))
}

/// Parse a latch line: `cs`, `csN` or `gpio:N`
pub fn parse_latch(s: &str) -> Result<LatchLine, String> {
    if let Some(line) = s.strip_prefix("gpio:") {
        return line
            .parse()
            .map(LatchLine::Gpio)
            .map_err(|_| format!("Invalid GPIO line: {}", line));
    }
    match s.strip_prefix("cs") {
        Some("") => Ok(LatchLine::ChipSelect(0)),
        Some(cs) => cs
            .trim_start_matches(':')
            .parse()
            .map(LatchLine::ChipSelect)
            .map_err(|_| format!("Invalid chip select: {}", cs)),
        None => Err(format!("Invalid latch '{}' (expected cs, csN or gpio:N)", s)),
    }
}

/// Parse a duration in seconds (fractions allowed)
pub fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("Invalid duration: {}", s))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("Invalid duration {}: {}", s, e))
}

/// Generate dynamic help text for the transport argument
fn transport_help() -> String {
    format!(
        "Transport to use, name:key=value,... [available: {}]",
        segchain_registry::transport_names_short()
    )
}

#[derive(Parser)]
#[command(name = "segchain")]
#[command(author, version, about = "MAX7219/MAX7221 segment display chain driver", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML); command line options take precedence
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = transport_help())]
    pub transport: Option<String>,

    /// Number of chips in the chain (1-254)
    #[arg(short = 'n', long, global = true)]
    pub chain_length: Option<u8>,

    /// Serial clock (e.g. 1000000, 500k, 10M)
    #[arg(long, global = true, value_parser = parse_speed)]
    pub speed: Option<u32>,

    /// Latch line: cs, csN or gpio:N
    #[arg(long, global = true, value_parser = parse_latch)]
    pub latch: Option<LatchLine>,

    /// Keep the display on for this many seconds before shutting it down
    #[arg(long, global = true, value_parser = parse_seconds)]
    pub hold: Option<Duration>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Digit font
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FontArg {
    /// Chip-decoded Code B
    #[default]
    CodeB,
    /// Raw segment patterns
    Segments,
}

impl From<FontArg> for Font {
    fn from(font: FontArg) -> Self {
        match font {
            FontArg::CodeB => Font::CodeB,
            FontArg::Segments => Font::Segments,
        }
    }
}

/// Chip operating mode
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Display digits
    Normal,
    /// Blank the display, keep registers
    Shutdown,
    /// Light every segment
    Test,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => Mode::Normal,
            ModeArg::Shutdown => Mode::Shutdown,
            ModeArg::Test => Mode::Test,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure every chip (scan limit, decode, intensity), blank it and turn it on
    Init {
        /// Font the chain is decoded for
        #[arg(long, value_enum, default_value_t)]
        font: FontArg,

        /// Intensity step (1-16)
        #[arg(long, default_value_t = 1)]
        intensity: u8,

        /// Number of scanned digits (1-8)
        #[arg(long, default_value_t = 8)]
        scan_limit: u8,
    },

    /// Set the operating mode
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,

        /// Only this chip (default: whole chain)
        #[arg(short, long)]
        chip: Option<u8>,
    },

    /// Set the intensity step (1-16)
    Intensity {
        step: u8,

        /// Only this chip (default: whole chain)
        #[arg(short, long)]
        chip: Option<u8>,
    },

    /// Set the Code B decode mask (bit 0 = digit 1)
    Decode {
        #[arg(value_parser = parse_hex_u8)]
        mask: u8,

        /// Only this chip (default: whole chain)
        #[arg(short, long)]
        chip: Option<u8>,
    },

    /// Set the number of scanned digits (1-8)
    ScanLimit {
        digits: u8,

        /// Only this chip (default: whole chain)
        #[arg(short, long)]
        chip: Option<u8>,
    },

    /// Write one digit register
    Digit {
        /// Chip (1 is nearest the controller)
        chip: u8,
        /// Digit (1-8)
        digit: u8,
        /// Raw code (hex or decimal)
        #[arg(value_parser = parse_hex_u8)]
        code: u8,
    },

    /// Write consecutive digit registers, continuing on the next chip after digit 8
    Digits {
        /// Start chip
        #[arg(long, default_value_t = 1)]
        chip: u8,

        /// Start digit
        #[arg(long, default_value_t = 1)]
        digit: u8,

        /// Raw codes (hex or decimal)
        #[arg(value_parser = parse_hex_u8, required = true)]
        codes: Vec<u8>,
    },

    /// Write the same code to every digit of every chip
    Fill {
        #[arg(value_parser = parse_hex_u8)]
        code: u8,
    },

    /// Blank every digit
    Clear {
        /// Font the chain is decoded for
        #[arg(long, value_enum, default_value_t)]
        font: FontArg,
    },

    /// Show text, right-aligned on the chain (digit 1 of chip 1 is rightmost)
    Text {
        #[arg(allow_hyphen_values = true)]
        text: String,

        #[arg(long, value_enum, default_value_t)]
        font: FontArg,
    },

    /// Cycle the intensity through all 16 steps
    Sweep {
        /// Number of full cycles
        #[arg(long, default_value_t = 1)]
        cycles: u32,

        /// Time per step in milliseconds
        #[arg(long, default_value_t = 250)]
        step_ms: u64,
    },

    /// Count up on the display
    Count {
        /// First value
        #[arg(long, default_value_t = 0)]
        from: u64,

        /// Last value
        #[arg(long, default_value_t = 100)]
        to: u64,

        /// Time per value in milliseconds
        #[arg(long, default_value_t = 100)]
        step_ms: u64,
    },

    /// List available transports
    ListTransports,
}
