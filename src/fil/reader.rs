//! FIL event stream decoder

use super::event::{channel_data_len, is_channel_status, TimedEvent};
use super::header::{self, offset, FilHeader};
use crate::error::{Error, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

/// FIL stream marker bytes
pub mod marker {
    /// Delta marker with an 8-bit immediate: F3 <n>
    pub const DELTA_8: u8 = 0xF3;
    /// Delta marker with two 7-bit fields, low first: F4 <lo7> <hi7>
    pub const DELTA_14: u8 = 0xF4;
    /// End of stream
    pub const END: u8 = 0xFC;
    /// End of stream (alternate form seen in some files)
    pub const END_ALT: u8 = 0xF2;
    /// System exclusive start
    pub const SYSEX_START: u8 = 0xF0;
    /// System exclusive terminator
    pub const SYSEX_END: u8 = 0xF7;
}

/// Heuristic start search, used when the canonical signature is missing
pub mod fallback {
    /// First offset inspected for a plausible status byte
    pub const SCAN_START: usize = 100;
    /// Offset at which the scan gives up
    pub const SCAN_END: usize = 500;
    /// Bytes to back up from the first plausible status byte to recover timing bytes
    pub const BACKUP: usize = 10;
}

/// How the event stream start was located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DecodeMode {
    /// Signature present, stream starts at the fixed header offset
    Canonical,
    /// No signature, stream start guessed by scanning
    Heuristic { start: usize },
    /// Raw event region, no header
    Raw,
}

/// Result of decoding a FIL buffer
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStream {
    pub header: Option<FilHeader>,
    pub mode: DecodeMode,
    pub events: Vec<TimedEvent>,
    /// Channel-voice events discarded for out-of-range data bytes
    pub dropped: usize,
}

impl DecodedStream {
    pub fn fil_timebase(&self) -> Option<u16> {
        self.header.as_ref().map(|h| h.timebase)
    }

    pub fn target_resolution(&self) -> Option<u16> {
        self.header.as_ref().map(|h| h.target_resolution)
    }

    pub fn title(&self) -> Option<&str> {
        self.header.as_ref().and_then(|h| h.title.as_deref())
    }

    /// True when the header declares a coherent timebase/resolution pair
    pub fn has_native_timebase(&self) -> bool {
        self.header
            .as_ref()
            .is_some_and(FilHeader::has_native_timebase)
    }
}

/// One step of the stream grammar
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Sets the delta for the next emitted event
    Delta(u32),
    /// A complete, valid event (its delta is attached by the caller)
    Event(EventBody),
    /// A channel-voice event with a data byte >= 0x80
    Dropped,
    /// Byte that carries no meaning at this position
    Skip,
    /// End marker
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EventBody {
    Channel {
        status: u8,
        data1: u8,
        data2: Option<u8>,
    },
    SysEx(Vec<u8>),
}

/// Cursor over a FIL event region
pub struct FilReader<'a> {
    data: &'a [u8],
    pos: usize,
    running_status: Option<u8>,
}

impl<'a> FilReader<'a> {
    /// Create a reader over an event region (no header)
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            running_status: None,
        }
    }

    /// Check if we've reached the end of data
    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get current position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Last channel-voice status seen
    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }

    /// Take `len` bytes, or `None` (without advancing) if the region is too short
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let data = self.data;
        let end = self.pos.checked_add(len)?;
        let bytes = data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    /// Decode every event in the region.
    ///
    /// Returns the events and the number of dropped channel-voice events.
    pub fn parse_events(&mut self) -> (Vec<TimedEvent>, usize) {
        let mut events = Vec::new();
        let mut dropped = 0;
        let mut next_delta = 0u32;

        while let Some(token) = self.next_token() {
            match token {
                Token::Delta(delta) => next_delta = delta,
                Token::Event(body) => {
                    events.push(match body {
                        EventBody::Channel {
                            status,
                            data1,
                            data2,
                        } => TimedEvent::channel(next_delta, status, data1, data2),
                        EventBody::SysEx(data) => TimedEvent::sysex(next_delta, data),
                    });
                    next_delta = 0;
                }
                Token::Dropped => {
                    debug!(
                        "Dropped event with out-of-range data near offset {}",
                        self.pos
                    );
                    dropped += 1;
                    next_delta = 0;
                }
                Token::Skip => {}
                Token::End => break,
            }
        }

        (events, dropped)
    }

    /// Read the next grammar token; `None` at end of data or on truncation
    fn next_token(&mut self) -> Option<Token> {
        let b = *self.data.get(self.pos)?;

        let token = match b {
            marker::DELTA_8 => {
                let bytes = self.take(2)?;
                Token::Delta(bytes[1] as u32)
            }
            marker::DELTA_14 => {
                let bytes = self.take(3)?;
                let lo = (bytes[1] & 0x7F) as u32;
                let hi = (bytes[2] & 0x7F) as u32;
                Token::Delta((hi << 7) | lo)
            }
            marker::END | marker::END_ALT => {
                self.pos += 1;
                Token::End
            }
            marker::SYSEX_START => {
                let rest = &self.data[self.pos + 1..];
                let len = rest.iter().position(|&b| b == marker::SYSEX_END)?;
                let payload = rest[..len].to_vec();
                self.pos += len + 2;
                Token::Event(EventBody::SysEx(payload))
            }
            b if is_channel_status(b) => {
                self.running_status = Some(b);
                let len = channel_data_len(b);
                let bytes = self.take(len + 1)?;
                Self::channel_token(b, &bytes[1..])
            }
            // Data bytes and unassigned system bytes both continue the
            // running status; a system byte then fails the data check
            _ => match self.running_status {
                Some(status) => {
                    let bytes = self.take(channel_data_len(status))?;
                    Self::channel_token(status, bytes)
                }
                None => {
                    self.pos += 1;
                    Token::Skip
                }
            },
        };

        Some(token)
    }

    /// Accept a channel-voice event only if every data byte is below 0x80
    fn channel_token(status: u8, data: &[u8]) -> Token {
        if data.iter().any(|&b| b >= 0x80) {
            return Token::Dropped;
        }
        Token::Event(EventBody::Channel {
            status,
            data1: data[0],
            data2: data.get(1).copied(),
        })
    }
}

/// Decode a raw event region with no header
pub fn decode_events(region: &[u8]) -> DecodedStream {
    let (events, dropped) = FilReader::new(region).parse_events();
    DecodedStream {
        header: None,
        mode: DecodeMode::Raw,
        events,
        dropped,
    }
}

/// Decode a complete FIL file.
///
/// Files carrying the canonical signature are decoded from the fixed event
/// offset. Other files go through a best-effort scan for the stream start;
/// if that finds nothing plausible a `Format` error is returned.
pub fn decode(data: &[u8]) -> Result<DecodedStream> {
    let (header, mode, start) = match FilHeader::parse(data) {
        Some(header) => {
            info!(
                "FIL header: timebase={}, target_resolution={}",
                header.timebase, header.target_resolution
            );
            if let Some(title) = &header.title {
                info!("  Title: {}", title);
            }
            let start = offset::EVENTS.min(data.len());
            (Some(header), DecodeMode::Canonical, start)
        }
        None => {
            if header::has_signature(data) {
                return Err(Error::Format("FIL header truncated".into()));
            }
            let start = find_stream_start(data).ok_or_else(|| {
                Error::Format("no signature and no plausible event stream found".into())
            })?;
            warn!("No FIL signature, guessing event stream start at {}", start);
            (None, DecodeMode::Heuristic { start }, start)
        }
    };

    let (events, dropped) = FilReader::new(&data[start..]).parse_events();
    debug!("Decoded {} events ({} dropped)", events.len(), dropped);

    Ok(DecodedStream {
        header,
        mode,
        events,
        dropped,
    })
}

/// Scan for the first channel-voice status byte followed by two data bytes
/// below 0x80, then back up to recover the timing bytes before it.
pub fn find_stream_start(data: &[u8]) -> Option<usize> {
    let end = fallback::SCAN_END.min(data.len().saturating_sub(2));
    (fallback::SCAN_START..end)
        .find(|&i| is_channel_status(data[i]) && data[i + 1] < 0x80 && data[i + 2] < 0x80)
        .map(|i| i.saturating_sub(fallback::BACKUP).max(fallback::SCAN_START))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_of(region: &[u8]) -> Vec<TimedEvent> {
        decode_events(region).events
    }

    #[test]
    fn test_delta_marker_8bit() {
        let events = events_of(&[0xF3, 0x05, 0x90, 0x3C, 0x40]);
        assert_eq!(events, vec![TimedEvent::channel(5, 0x90, 0x3C, Some(0x40))]);
    }

    #[test]
    fn test_delta_marker_14bit() {
        // 0x7F + (0x02 << 7) = 383
        let events = events_of(&[0xF4, 0x7F, 0x02, 0xC0, 0x05]);
        assert_eq!(events, vec![TimedEvent::channel(383, 0xC0, 0x05, None)]);
    }

    #[test]
    fn test_delta_resets_after_event() {
        let events = events_of(&[0xF3, 0x10, 0x90, 60, 64, 0x80, 60, 0]);
        assert_eq!(events[0].delta, 0x10);
        assert_eq!(events[1].delta, 0);
    }

    #[test]
    fn test_invalid_data_dropped() {
        let stream = decode_events(&[0xB2, 0x40, 200]);
        assert!(stream.events.is_empty());
        assert_eq!(stream.dropped, 1);
    }

    #[test]
    fn test_dropped_event_consumes_delta() {
        let events = events_of(&[0xF3, 0x05, 0xB2, 0x40, 200, 0x90, 0x3C, 0x40]);
        assert_eq!(events, vec![TimedEvent::channel(0, 0x90, 0x3C, Some(0x40))]);
    }

    #[test]
    fn test_rogue_byte_not_reinterpreted_as_status() {
        // 0x90 inside the control change must not start a note-on; the
        // following bytes continue under the control-change running status
        let events = events_of(&[0xB0, 0x07, 0x90, 0x3C, 0x40]);
        assert_eq!(events, vec![TimedEvent::channel(0, 0xB0, 0x3C, Some(0x40))]);
    }

    #[test]
    fn test_running_status_equivalence() {
        let explicit = events_of(&[0x90, 60, 64, 0xF3, 10, 0x90, 62, 64, 0xC1, 5, 0xC1, 6]);
        let elided = events_of(&[0x90, 60, 64, 0xF3, 10, 62, 64, 0xC1, 5, 6]);
        assert_eq!(explicit, elided);
        assert_eq!(explicit.len(), 4);
    }

    #[test]
    fn test_running_status_invalid_second_byte() {
        let events = events_of(&[0x90, 60, 64, 61, 128]);
        assert_eq!(events, vec![TimedEvent::channel(0, 0x90, 60, Some(64))]);
    }

    #[test]
    fn test_data_byte_without_status_skipped() {
        let events = events_of(&[0x01, 0x02, 0x90, 60, 64]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_unassigned_system_byte_consumed_with_running_status() {
        let stream = decode_events(&[0x90, 0x3C, 0x40, 0xF8, 0x3C, 0x40]);
        assert_eq!(stream.events, vec![TimedEvent::channel(0, 0x90, 0x3C, Some(0x40))]);
        assert_eq!(stream.dropped, 1);

        // Without a running status the byte is skipped alone
        let stream = decode_events(&[0xFE, 0x90, 0x3C, 0x40]);
        assert_eq!(stream.events.len(), 1);
        assert_eq!(stream.dropped, 0);
    }

    #[test]
    fn test_unterminated_sysex_emits_nothing() {
        let stream = decode_events(&[0xF0, 0x43, 0x10, 0x4C]);
        assert!(stream.events.is_empty());
        assert_eq!(stream.dropped, 0);
    }

    #[test]
    fn test_sysex_payload() {
        let events = events_of(&[0xF3, 0x02, 0xF0, 0x43, 0x10, 0x4C, 0xF7, 0x90, 60, 1]);
        assert_eq!(events[0], TimedEvent::sysex(2, vec![0x43, 0x10, 0x4C]));
        assert_eq!(events[1].delta, 0);
    }

    #[test]
    fn test_end_markers() {
        assert_eq!(events_of(&[0x90, 60, 64, 0xFC, 0x90, 61, 64]).len(), 1);
        assert_eq!(events_of(&[0x90, 60, 64, 0xF2, 0x90, 61, 64]).len(), 1);
    }

    #[test]
    fn test_truncated_tail_ends_pass() {
        assert_eq!(events_of(&[0x90, 60, 64, 0x90, 61]).len(), 1);
        assert_eq!(events_of(&[0x90, 60, 64, 0xF4, 0x01]).len(), 1);
        assert_eq!(events_of(&[0x90, 60, 64, 0xF0, 0x43, 0x10]).len(), 1);
        assert!(events_of(&[]).is_empty());
    }

    #[test]
    fn test_canonical_decode() {
        let mut data = vec![0u8; offset::EVENTS];
        data[8..20].copy_from_slice(b"OM-ESEQ-FILE");
        data[0x18..0x1A].copy_from_slice(&384u16.to_le_bytes());
        data[0x1A..0x1C].copy_from_slice(&480u16.to_le_bytes());
        data[0x57..0x5D].copy_from_slice(b"Sonata");
        data.extend_from_slice(&[0x90, 60, 64, 0xF3, 96, 0x80, 60, 0, 0xFC]);

        let stream = decode(&data).unwrap();
        assert_eq!(stream.mode, DecodeMode::Canonical);
        assert_eq!(stream.title(), Some("Sonata"));
        assert_eq!(stream.fil_timebase(), Some(480));
        assert_eq!(stream.target_resolution(), Some(384));
        assert!(stream.has_native_timebase());
        assert_eq!(stream.events.len(), 2);
        assert_eq!(stream.events[1].delta, 96);
    }

    #[test]
    fn test_signature_without_events_is_degenerate() {
        let mut data = vec![0u8; offset::EVENTS];
        data[8..12].copy_from_slice(b"OM-E");
        let stream = decode(&data).unwrap();
        assert!(stream.events.is_empty());
    }

    #[test]
    fn test_heuristic_fallback() {
        let mut data = vec![0u8; 200];
        data[150] = 0xF3;
        data[151] = 0x04;
        data[152..156].copy_from_slice(&[0x90, 60, 64, 0xFC]);

        assert_eq!(find_stream_start(&data), Some(142));
        let stream = decode(&data).unwrap();
        assert_eq!(stream.mode, DecodeMode::Heuristic { start: 142 });
        assert_eq!(stream.header, None);
        assert_eq!(stream.events, vec![TimedEvent::channel(4, 0x90, 60, Some(64))]);
    }

    #[test]
    fn test_fallback_failure_is_format_error() {
        let data = vec![0u8; 300];
        assert!(matches!(decode(&data), Err(Error::Format(_))));
        assert!(matches!(decode(&[0x90, 60, 64]), Err(Error::Format(_))));
    }
}
