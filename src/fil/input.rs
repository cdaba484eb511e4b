//! FIL input files, plain or base64-wrapped (`.fil.b64`)

use crate::error::Result;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions accepted when collecting FIL input, longest first
pub const EXTENSIONS: [&str; 2] = ["fil.b64", "fil"];

/// Standard alphabet, lenient about padding and trailing bits
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// True for a base64-wrapped file (name ends in `.b64`)
pub fn is_base64(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("b64"))
}

/// Drop everything outside the base64 alphabet and pad to a multiple of four
pub fn clean_base64(text: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = text
        .iter()
        .copied()
        .filter(|&b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();
    let rem = out.len() % 4;
    if rem != 0 {
        out.resize(out.len() + 4 - rem, b'=');
    }
    out
}

/// Decode base64 text after cleaning it
pub fn decode_base64(text: &[u8]) -> Result<Vec<u8>> {
    let cleaned = clean_base64(text);
    if cleaned.len() != text.len() {
        debug!(
            "Cleaned base64 input: {} bytes kept of {}",
            cleaned.len(),
            text.len()
        );
    }
    Ok(LENIENT.decode(cleaned)?)
}

/// Read a FIL file, unwrapping base64 when the name ends in `.b64`
pub fn read_fil(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path)?;
    if is_base64(path) {
        decode_base64(&data)
    } else {
        Ok(data)
    }
}

/// File name without `.fil.b64`, or without its last extension otherwise
pub fn fil_stem(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let suffix = ".fil.b64";
    let cut = name.len().checked_sub(suffix.len()).filter(|&cut| cut > 0);
    match cut {
        Some(cut) if name.as_bytes()[cut..].eq_ignore_ascii_case(suffix.as_bytes()) => {
            name.get(..cut)
        }
        _ => path.file_stem()?.to_str(),
    }
}

/// Default MIDI path for an input: `song.fil` and `song.fil.b64` both give
/// `song.mid`
pub fn midi_output_path(input: &Path) -> PathBuf {
    match fil_stem(input) {
        Some(stem) => input.with_file_name(format!("{}.mid", stem)),
        None => input.with_extension("mid"),
    }
}
