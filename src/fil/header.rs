//! FIL (Yamaha ESEQ) header layout and field extraction

use serde::Serialize;

/// Sub-tag at `offset::FORMAT_TAG` that selects the canonical decode path
pub const SIGNATURE: &[u8; 4] = b"OM-E";

/// Length of the ASCII format tag starting at `offset::FORMAT_TAG`
pub const FORMAT_TAG_LEN: usize = 12;

/// FIL header offsets (in bytes)
pub mod offset {
    /// 12-byte ASCII format tag
    pub const FORMAT_TAG: usize = 0x08;
    /// Target resolution (16-bit little-endian)
    pub const TARGET_RESOLUTION: usize = 0x18;
    /// Native timebase (16-bit little-endian)
    pub const TIMEBASE: usize = 0x1A;
    /// Start of the title region
    pub const TITLE: usize = 0x57;
    /// End of the title region (exclusive)
    pub const TITLE_END: usize = 0x7C;
    /// First byte of the event stream
    pub const EVENTS: usize = 0x7C;
}

/// Parsed FIL header fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilHeader {
    /// Format tag as found at 0x08..0x14 (non-printable bytes dropped)
    pub format_tag: String,
    /// Target resolution declared by the header
    pub target_resolution: u16,
    /// Native timebase declared by the header
    pub timebase: u16,
    /// Song title from the fixed title region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl FilHeader {
    /// Parse the header if the canonical signature is present.
    ///
    /// Returns `None` when the buffer is too short to hold the timing fields
    /// or the signature is missing.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if !has_signature(data) || data.len() <= offset::TIMEBASE + 1 {
            return None;
        }

        let tag_end = (offset::FORMAT_TAG + FORMAT_TAG_LEN).min(data.len());
        let format_tag = data[offset::FORMAT_TAG..tag_end]
            .iter()
            .filter(|b| b.is_ascii_graphic() || **b == b' ')
            .map(|&b| b as char)
            .collect::<String>()
            .trim()
            .to_string();

        let title = if data.len() >= offset::TITLE_END {
            extract_title(&data[offset::TITLE..offset::TITLE_END])
        } else {
            None
        };

        Some(Self {
            format_tag,
            target_resolution: read_u16_le(data, offset::TARGET_RESOLUTION),
            timebase: read_u16_le(data, offset::TIMEBASE),
            title,
        })
    }

    /// True when both timing fields are non-zero, meaning the stream deltas
    /// are already native MIDI ticks.
    pub fn has_native_timebase(&self) -> bool {
        self.timebase != 0 && self.target_resolution != 0
    }
}

/// Check for the canonical 4-byte sub-tag
pub fn has_signature(data: &[u8]) -> bool {
    data.get(offset::FORMAT_TAG..offset::FORMAT_TAG + SIGNATURE.len()) == Some(&SIGNATURE[..])
}

fn read_u16_le(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

/// Extract a printable title from a header window.
///
/// Stops at the first byte that looks like a MIDI system marker (>= 0xF0).
pub fn extract_title(window: &[u8]) -> Option<String> {
    let raw: String = window
        .iter()
        .take_while(|&&b| b < 0xF0)
        .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { ' ' })
        .collect();

    let title = collapse_whitespace(&raw);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Collapse runs of whitespace into single spaces and trim both ends
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
