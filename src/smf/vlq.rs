//! Variable-length quantities and raw chunk/track walking
//!
//! These helpers only compute offsets and lengths; nothing here decodes the
//! meaning of an event, so callers can patch bytes in place without
//! re-serializing the file.

use crate::error::{Error, Result};
use crate::fil::event::channel_data_len;
use std::ops::Range;

/// Longest VLQ a Standard MIDI File may contain
pub const MAX_VLQ_BYTES: usize = 4;

/// Chunk identifiers
pub mod chunk {
    pub const HEADER: &[u8; 4] = b"MThd";
    pub const TRACK: &[u8; 4] = b"MTrk";
}

/// Event type bytes with special meaning inside a track chunk
pub mod event {
    pub const META: u8 = 0xFF;
    pub const SYSEX: u8 = 0xF0;
    pub const ESCAPE: u8 = 0xF7;
}

/// Read a VLQ (7 bits per byte, high bit = continuation, big-endian).
///
/// Returns the value and the position after it, or `None` if the data ends
/// inside the quantity or it runs longer than four bytes.
pub fn read_vlq(data: &[u8], mut pos: usize) -> Option<(u32, usize)> {
    let mut value = 0u32;
    for _ in 0..MAX_VLQ_BYTES {
        let byte = *data.get(pos)?;
        pos += 1;
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Some((value, pos));
        }
    }
    None
}

/// Fields of the `MThd` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmfHeader {
    pub format: u16,
    pub tracks: u16,
    pub division: u16,
    /// Offset of the first chunk after the header
    pub chunks_start: usize,
}

impl SmfHeader {
    /// Validate the file signature and read the header chunk
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 14 || &data[0..4] != chunk::HEADER {
            return Err(Error::MidiParse(
                "Not a valid MIDI file (missing MThd header)".into(),
            ));
        }
        let header_len = read_u32_be(data, 4) as usize;
        Ok(Self {
            format: read_u16_be(data, 8),
            tracks: read_u16_be(data, 10),
            division: read_u16_be(data, 12),
            chunks_start: 8usize.saturating_add(header_len.max(6)),
        })
    }
}

fn read_u16_be(data: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([data[pos], data[pos + 1]])
}

fn read_u32_be(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// A chunk located in the raw buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: [u8; 4],
    /// Body range, clamped to the buffer
    pub body: Range<usize>,
}

impl Chunk {
    pub fn is_track(&self) -> bool {
        &self.id == chunk::TRACK
    }
}

/// Iterator over the chunks following the header
pub struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkIter<'a> {
    pub fn new(data: &'a [u8], header: &SmfHeader) -> Self {
        Self {
            data,
            pos: header.chunks_start,
        }
    }
}

impl Iterator for ChunkIter<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let head = self.data.get(self.pos..self.pos.checked_add(8)?)?;
        let id = [head[0], head[1], head[2], head[3]];
        let len = read_u32_be(head, 4) as usize;
        let start = self.pos + 8;
        let end = start.saturating_add(len).min(self.data.len());
        self.pos = start.saturating_add(len);
        Some(Chunk {
            id,
            body: start..end,
        })
    }
}

/// What kind of event the walker stepped over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEventKind {
    Meta { meta_type: u8, payload: Range<usize> },
    SysEx { payload: Range<usize> },
    /// Channel-voice event; `running` when the status byte was elided
    Channel { status: u8, running: bool },
    /// A byte with no meaning at this position (skipped alone)
    Stray,
}

/// One event located inside a track chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Offset of the delta-time that precedes the event
    pub offset: usize,
    pub delta: u32,
    pub kind: RawEventKind,
    /// Offset just past the event
    pub end: usize,
}

impl RawEvent {
    /// Total byte length including the delta-time
    pub fn len(&self) -> usize {
        self.end - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.offset
    }
}

/// Walks a track chunk event by event, tracking running status
pub struct TrackWalker<'a> {
    data: &'a [u8],
    pos: usize,
    running_status: Option<u8>,
}

impl<'a> TrackWalker<'a> {
    /// Walk the given body range of `data`; offsets stay absolute
    pub fn new(data: &'a [u8], body: Range<usize>) -> Self {
        let end = body.end.min(data.len());
        Self {
            data: &data[..end],
            pos: body.start,
            running_status: None,
        }
    }
}

impl Iterator for TrackWalker<'_> {
    type Item = RawEvent;

    fn next(&mut self) -> Option<RawEvent> {
        let offset = self.pos;
        let (delta, pos) = read_vlq(self.data, offset)?;
        let byte = *self.data.get(pos)?;

        let (kind, end) = match byte {
            event::META => {
                let meta_type = *self.data.get(pos + 1)?;
                let (len, start) = read_vlq(self.data, pos + 2)?;
                let end = start.saturating_add(len as usize);
                (
                    RawEventKind::Meta {
                        meta_type,
                        payload: start..end,
                    },
                    end,
                )
            }
            event::SYSEX | event::ESCAPE => {
                let (len, start) = read_vlq(self.data, pos + 1)?;
                let end = start.saturating_add(len as usize);
                (RawEventKind::SysEx { payload: start..end }, end)
            }
            0x80..=0xEF => {
                self.running_status = Some(byte);
                (
                    RawEventKind::Channel {
                        status: byte,
                        running: false,
                    },
                    pos + 1 + channel_data_len(byte),
                )
            }
            // Running status: this byte is the first of the status's data
            // bytes, so the whole group is consumed, not just this byte
            0x00..=0x7F => match self.running_status {
                Some(status) => (
                    RawEventKind::Channel {
                        status,
                        running: true,
                    },
                    pos + channel_data_len(status),
                ),
                None => (RawEventKind::Stray, pos + 1),
            },
            _ => (RawEventKind::Stray, pos + 1),
        };

        self.pos = end;
        Some(RawEvent {
            offset,
            delta,
            kind,
            end,
        })
    }
}
