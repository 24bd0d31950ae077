//! segchain - Drive daisy-chained MAX7219/MAX7221 segment displays
//!
//! Every invocation opens the chain, runs one command and releases it again.
//! Releasing shuts the chips down, so `--hold` keeps the result visible for a
//! while before the program exits.

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{demo, display, CommandResult};
use config::{ConfigFile, Settings};
use segchain_core::register::Intensity;
use segchain_core::{SegmentChain, Transport};
use segchain_registry::open_chain;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Commands::ListTransports = cli.command {
        commands::list_transports();
        return Ok(());
    }

    let file = cli.config.as_deref().map(ConfigFile::load).transpose()?;
    let settings = Settings::resolve(file.as_ref(), &cli)?;
    log::debug!("Using {} with {:?}", settings.transport, settings.chain);

    let chain = open_chain(&settings.transport, &settings.chain)?;

    let result = run(&chain, &cli.command);
    if result.is_ok() {
        if let Some(hold) = cli.hold {
            log::info!("Holding display for {:.1}s", hold.as_secs_f64());
            std::thread::sleep(hold);
        }
    }

    // Always shut the chain down, but report the command's error first
    let released = chain.release();
    result?;
    released?;
    Ok(())
}

fn run<T: Transport>(chain: &SegmentChain<T>, command: &Commands) -> CommandResult {
    match command {
        Commands::Init {
            font,
            intensity,
            scan_limit,
        } => display::init(
            chain,
            (*font).into(),
            Intensity::from_step(*intensity)?,
            *scan_limit,
        ),
        Commands::Mode { mode, chip } => display::mode(chain, (*mode).into(), *chip),
        Commands::Intensity { step, chip } => display::intensity(chain, *step, *chip),
        Commands::Decode { mask, chip } => display::decode(chain, *mask, *chip),
        Commands::ScanLimit { digits, chip } => display::scan_limit(chain, *digits, *chip),
        Commands::Digit { chip, digit, code } => display::digits(chain, *chip, *digit, &[*code]),
        Commands::Digits { chip, digit, codes } => display::digits(chain, *chip, *digit, codes),
        Commands::Fill { code } => Ok(chain.set_chain(*code)?),
        Commands::Clear { font } => {
            Ok(chain.set_chain(segchain_core::font::Font::from(*font).blank())?)
        }
        Commands::Text { text, font } => display::text(chain, text, (*font).into()),
        Commands::Sweep { cycles, step_ms } => {
            demo::sweep(chain, *cycles, Duration::from_millis(*step_ms))
        }
        Commands::Count { from, to, step_ms } => {
            demo::count(chain, *from, *to, Duration::from_millis(*step_ms))
        }
        Commands::ListTransports => {
            commands::list_transports();
            Ok(())
        }
    }
}
