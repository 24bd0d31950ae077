//! Single-operation display commands

use super::CommandResult;
use segchain_core::font::{encode_text, Font};
use segchain_core::register::{DecodeMode, Intensity, Mode, DIGITS_PER_CHIP};
use segchain_core::{SegmentChain, Transport};

/// Bring every chip into a known state and switch the display on
///
/// The chain is shut down while it is reconfigured so stale digit contents
/// never flash up with the new decode mode.
pub fn init<T: Transport>(
    chain: &SegmentChain<T>,
    font: Font,
    intensity: Intensity,
    scan_limit: u8,
) -> CommandResult {
    chain.set_chain_mode(Mode::Shutdown)?;
    chain.configure_chain_scan_limit(scan_limit)?;
    chain.configure_chain_decode(font.decode_mode())?;
    chain.set_chain_intensity(intensity)?;
    chain.set_chain(font.blank())?;
    chain.set_chain_mode(Mode::Normal)?;

    log::info!(
        "Initialized {} chip(s): {:?} font, intensity {}/16, {} digit(s)",
        chain.chain_length(),
        font,
        intensity.step(),
        scan_limit
    );
    Ok(())
}

/// Set the operating mode of the chain or of one chip
pub fn mode<T: Transport>(chain: &SegmentChain<T>, mode: Mode, chip: Option<u8>) -> CommandResult {
    match chip {
        Some(chip) => chain.set_mode(chip, mode)?,
        None => chain.set_chain_mode(mode)?,
    }
    log::info!("Mode set to {}", mode);
    Ok(())
}

/// Set the intensity of the chain or of one chip
pub fn intensity<T: Transport>(
    chain: &SegmentChain<T>,
    step: u8,
    chip: Option<u8>,
) -> CommandResult {
    let intensity = Intensity::from_step(step)?;
    match chip {
        Some(chip) => chain.set_intensity(chip, intensity)?,
        None => chain.set_chain_intensity(intensity)?,
    }
    Ok(())
}

/// Set the decode mask of the chain or of one chip
pub fn decode<T: Transport>(chain: &SegmentChain<T>, mask: u8, chip: Option<u8>) -> CommandResult {
    let mode = DecodeMode::from_bits_retain(mask);
    match chip {
        Some(chip) => chain.configure_decode(chip, mode)?,
        None => chain.configure_chain_decode(mode)?,
    }
    Ok(())
}

/// Set the scan limit of the chain or of one chip
pub fn scan_limit<T: Transport>(
    chain: &SegmentChain<T>,
    digits: u8,
    chip: Option<u8>,
) -> CommandResult {
    match chip {
        Some(chip) => chain.configure_scan_limit(chip, digits)?,
        None => chain.configure_chain_scan_limit(digits)?,
    }
    Ok(())
}

/// Write raw codes starting at a chip and digit
pub fn digits<T: Transport>(
    chain: &SegmentChain<T>,
    chip: u8,
    digit: u8,
    codes: &[u8],
) -> CommandResult {
    match codes {
        [code] => chain.set_digit(chip, digit, *code)?,
        _ => chain.set_digits(chip, digit, codes)?,
    }
    log::debug!("Wrote {} code(s) from chip {} digit {}", codes.len(), chip, digit);
    Ok(())
}

/// Digit codes for `text`, right-aligned across the whole chain
///
/// Digit 1 of chip 1 is the rightmost position, so the last character lands
/// there. Unused positions on the left are blank.
pub fn layout_text(text: &str, font: Font, chain_length: u8) -> segchain_core::Result<Vec<u8>> {
    let total = chain_length as usize * DIGITS_PER_CHIP;
    let mut encoded = vec![0u8; total];
    let len = encode_text(text, font, &mut encoded)?;

    let mut codes = vec![font.blank(); total];
    for (slot, code) in codes.iter_mut().zip(encoded[..len].iter().rev()) {
        *slot = *code;
    }
    Ok(codes)
}

/// Show text on the chain in one bulk write
pub fn text<T: Transport>(chain: &SegmentChain<T>, text: &str, font: Font) -> CommandResult {
    let codes = layout_text(text, font, chain.chain_length())?;
    chain.set_digits(1, 1, &codes)?;
    Ok(())
}
