//! Animated demo commands

use super::display::{self, layout_text};
use super::CommandResult;
use indicatif::{ProgressBar, ProgressStyle};
use segchain_core::font::{code_b, Font};
use segchain_core::register::{Intensity, MAX_DIGIT};
use segchain_core::{SegmentChain, Transport};
use std::thread;
use std::time::Duration;

fn progress_bar(len: u64, what: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(what.to_string());
    Ok(pb)
}

/// Light every segment and walk the intensity through all 16 steps
///
/// Starts at the dimmest step and wraps back to it after the brightest.
pub fn sweep<T: Transport>(chain: &SegmentChain<T>, cycles: u32, step: Duration) -> CommandResult {
    display::init(chain, Font::CodeB, Intensity::MIN, MAX_DIGIT)?;
    chain.set_chain((code_b::DIGIT_0 + 8) | code_b::DP)?;

    let steps = u64::from(cycles) * 16;
    let pb = progress_bar(steps, "intensity")?;
    let mut intensity = Intensity::MIN;

    for _ in 0..steps {
        chain.set_chain_intensity(intensity)?;
        pb.set_message(format!("intensity {}/16", intensity.step()));
        pb.inc(1);
        thread::sleep(step);
        intensity = intensity.next_wrapping();
    }

    pb.finish_with_message("Sweep complete");
    Ok(())
}

/// Show every value in `from..=to` in turn, right-aligned
pub fn count<T: Transport>(
    chain: &SegmentChain<T>,
    from: u64,
    to: u64,
    step: Duration,
) -> CommandResult {
    if from > to {
        return Err(format!("Empty range: {} > {}", from, to).into());
    }
    // Fail before touching the display if the last value cannot fit
    layout_text(&to.to_string(), Font::CodeB, chain.chain_length())?;

    display::init(chain, Font::CodeB, Intensity::MIN, MAX_DIGIT)?;

    let pb = progress_bar((to - from).saturating_add(1), "counting")?;
    for value in from..=to {
        display::text(chain, &value.to_string(), Font::CodeB)?;
        pb.inc(1);
        thread::sleep(step);
    }

    pb.finish_with_message("Count complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use segchain_core::{BusConfig, ChainConfig, LatchLine};
    use segchain_dummy::DummyChain;

    fn open(chain_length: u8) -> (SegmentChain<DummyChain>, DummyChain) {
        let dummy = DummyChain::new(chain_length);
        let config = ChainConfig::new(
            chain_length,
            BusConfig::new(1_000_000, LatchLine::ChipSelect(0)),
        );
        (SegmentChain::new(&config, dummy.clone()).unwrap(), dummy)
    }

    #[test]
    fn test_sweep_wraps_intensity() {
        let (chain, dummy) = open(2);
        sweep(&chain, 1, Duration::ZERO).unwrap();

        for chip in dummy.chips() {
            assert_eq!(chip.intensity, Intensity::MAX.register_value());
            assert_eq!(chip.digit(4), 8 | code_b::DP);
            assert!(!chip.is_shutdown());
        }
    }

    #[test]
    fn test_count_leaves_last_value() {
        let (chain, dummy) = open(1);
        count(&chain, 98, 101, Duration::ZERO).unwrap();

        let chip = dummy.chip(1);
        assert_eq!(chip.digit(1), 1);
        assert_eq!(chip.digit(2), 0);
        assert_eq!(chip.digit(3), 1);
        assert_eq!(chip.digit(4), code_b::BLANK);
    }

    #[test]
    fn test_count_rejects_overflow_before_writing() {
        let (chain, dummy) = open(1);
        assert!(count(&chain, 0, 123_456_789, Duration::ZERO).is_err());
        assert!(count(&chain, 5, 4, Duration::ZERO).is_err());
        assert!(dummy.frames().is_empty());
    }
}
