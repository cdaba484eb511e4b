//! Event-to-SMF assembler
//!
//! Turns decoded FIL events into a single Format 0 track with the leading
//! meta-events playback hardware inspects, then serializes it with `midly`.

use super::preset::DevicePreset;
use super::xf;
use crate::error::Result;
use crate::fil::event::status;
use crate::fil::{DecodedStream, EventKind, TimedEvent};
use midly::num::{u14, u15, u24, u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, TrackEvent, TrackEventKind,
};
use tracing::debug;

/// Ticks per quarter note declared in every assembled file
pub const TICKS_PER_QUARTER: u16 = 384;

/// Largest delta-time an SMF can encode
pub const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Channel-voice message with validated data bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOff { key: u8, velocity: u8 },
    NoteOn { key: u8, velocity: u8 },
    PolyPressure { key: u8, pressure: u8 },
    Controller { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    /// Signed bend, centered on zero (-8192..=8191)
    PitchBend { bend: i16 },
}

impl ChannelMessage {
    /// Build a message from a status nibble and raw data bytes.
    ///
    /// Returns `None` if a required data byte is missing or outside 0..=127.
    pub fn from_raw(status_byte: u8, data1: u8, data2: Option<u8>) -> Option<Self> {
        let d1 = valid(data1)?;
        let d2 = || data2.and_then(valid);
        let msg = match status_byte & 0xF0 {
            status::NOTE_OFF => ChannelMessage::NoteOff {
                key: d1,
                velocity: d2()?,
            },
            status::NOTE_ON => ChannelMessage::NoteOn {
                key: d1,
                velocity: d2()?,
            },
            status::POLY_PRESSURE => ChannelMessage::PolyPressure {
                key: d1,
                pressure: d2()?,
            },
            status::CONTROL_CHANGE => ChannelMessage::Controller {
                controller: d1,
                value: d2()?,
            },
            status::PROGRAM_CHANGE => ChannelMessage::ProgramChange { program: d1 },
            status::CHANNEL_PRESSURE => ChannelMessage::ChannelPressure { pressure: d1 },
            status::PITCH_BEND => {
                let raw = ((d2()? as i16) << 7) | d1 as i16;
                ChannelMessage::PitchBend { bend: raw - 0x2000 }
            }
            _ => return None,
        };
        Some(msg)
    }

    fn to_midly(self) -> MidiMessage {
        match self {
            ChannelMessage::NoteOff { key, velocity } => MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(velocity),
            },
            ChannelMessage::NoteOn { key, velocity } => MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(velocity),
            },
            ChannelMessage::PolyPressure { key, pressure } => MidiMessage::Aftertouch {
                key: u7::new(key),
                vel: u7::new(pressure),
            },
            ChannelMessage::Controller { controller, value } => MidiMessage::Controller {
                controller: u7::new(controller),
                value: u7::new(value),
            },
            ChannelMessage::ProgramChange { program } => MidiMessage::ProgramChange {
                program: u7::new(program),
            },
            ChannelMessage::ChannelPressure { pressure } => MidiMessage::ChannelAftertouch {
                vel: u7::new(pressure),
            },
            ChannelMessage::PitchBend { bend } => MidiMessage::PitchBend {
                bend: PitchBend(u14::new((bend + 0x2000) as u16)),
            },
        }
    }
}

fn valid(byte: u8) -> Option<u8> {
    (byte < 0x80).then_some(byte)
}

/// A message in an assembled track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmfMessage {
    TrackName(Vec<u8>),
    /// Microseconds per quarter note
    Tempo(u32),
    Copyright(Vec<u8>),
    SequencerSpecific(Vec<u8>),
    Channel {
        channel: u8,
        message: ChannelMessage,
    },
    /// Bytes following the F0 status, terminating F7 included
    SysEx(Vec<u8>),
    EndOfTrack,
}

impl SmfMessage {
    pub fn is_channel_voice(&self) -> bool {
        matches!(self, SmfMessage::Channel { .. })
    }

    pub(crate) fn to_midly(&self) -> TrackEventKind<'_> {
        match self {
            SmfMessage::TrackName(name) => TrackEventKind::Meta(MetaMessage::TrackName(name)),
            SmfMessage::Tempo(micros) => {
                TrackEventKind::Meta(MetaMessage::Tempo(u24::new(*micros)))
            }
            SmfMessage::Copyright(text) => TrackEventKind::Meta(MetaMessage::Copyright(text)),
            SmfMessage::SequencerSpecific(data) => {
                TrackEventKind::Meta(MetaMessage::SequencerSpecific(data))
            }
            SmfMessage::Channel { channel, message } => TrackEventKind::Midi {
                channel: u4::new(*channel),
                message: message.to_midly(),
            },
            SmfMessage::SysEx(data) => TrackEventKind::SysEx(data),
            SmfMessage::EndOfTrack => TrackEventKind::Meta(MetaMessage::EndOfTrack),
        }
    }
}

/// A message with the ticks elapsing before it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmfEvent {
    pub delta: u32,
    pub message: SmfMessage,
}

impl SmfEvent {
    pub fn at_start(message: SmfMessage) -> Self {
        Self { delta: 0, message }
    }
}

/// Exactly one track chunk of a Format 0 file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmfTrack {
    pub events: Vec<SmfEvent>,
}

impl SmfTrack {
    pub fn push(&mut self, delta: u32, message: SmfMessage) {
        self.events.push(SmfEvent { delta, message });
    }

    /// Total length in ticks (sum of all deltas)
    pub fn duration(&self) -> u64 {
        self.events.iter().map(|e| e.delta as u64).sum()
    }

    /// Serialize as a Format 0 Standard MIDI File
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let track: Vec<TrackEvent<'_>> = self
            .events
            .iter()
            .map(|e| TrackEvent {
                delta: u28::new(e.delta.min(MAX_DELTA)),
                kind: e.message.to_midly(),
            })
            .collect();

        let smf = Smf {
            header: Header::new(
                Format::SingleTrack,
                Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
            ),
            tracks: vec![track],
        };

        let mut out = Vec::new();
        smf.write_std(&mut out)?;
        Ok(out)
    }
}

/// Counters gathered while assembling
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AssembleStats {
    pub written: usize,
    /// Events discarded because a data byte failed the 0..=127 bound
    pub dropped: usize,
    /// Scaling factor actually applied to the deltas
    pub ticks_per_unit: f64,
}

/// Builds Format 0 tracks from decoded events
#[derive(Debug, Clone)]
pub struct Assembler {
    preset: DevicePreset,
    ticks_per_unit: f64,
    title: Option<String>,
    xf_year: Option<u16>,
}

impl Assembler {
    pub fn new(preset: DevicePreset) -> Self {
        Self {
            preset,
            ticks_per_unit: 1.0,
            title: None,
            xf_year: None,
        }
    }

    /// Scaling from FIL delta units to MIDI ticks, used when the source
    /// header does not declare a native timebase
    pub fn ticks_per_unit(mut self, factor: f64) -> Self {
        self.ticks_per_unit = factor;
        self
    }

    /// Title that takes precedence over the one in the FIL header
    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }

    /// Emit the copyright and device-recognition markers for `year`
    pub fn xf_metadata(mut self, year: Option<u16>) -> Self {
        self.xf_year = year;
        self
    }

    pub fn preset(&self) -> &DevicePreset {
        &self.preset
    }

    /// Assemble a decoded stream.
    ///
    /// A header with a coherent timebase pair means the deltas are already
    /// MIDI ticks, so the configured scaling is ignored.
    pub fn assemble(&self, stream: &DecodedStream) -> Result<(SmfTrack, AssembleStats)> {
        let factor = if stream.has_native_timebase() {
            1.0
        } else {
            self.ticks_per_unit
        };
        let title = self.title.as_deref().or(stream.title());
        self.assemble_events(&stream.events, factor, title)
    }

    /// Assemble an arbitrary event sequence with an explicit scaling factor
    pub fn assemble_events(
        &self,
        events: &[TimedEvent],
        ticks_per_unit: f64,
        title: Option<&str>,
    ) -> Result<(SmfTrack, AssembleStats)> {
        let mut track = SmfTrack::default();

        if let Some(title) = title {
            track.events.push(SmfEvent::at_start(SmfMessage::TrackName(
                encode_latin1(title),
            )));
        }
        track.events.push(SmfEvent::at_start(SmfMessage::Tempo(
            self.preset.tempo_micros()?,
        )));
        if let Some(year) = self.xf_year {
            track
                .events
                .extend(xf::solo_markers(year).into_iter().map(SmfEvent::at_start));
        }
        for (&channel, &program) in &self.preset.program_override {
            if let Some(message) = ChannelMessage::from_raw(status::PROGRAM_CHANGE, program, None) {
                track.events.push(SmfEvent::at_start(SmfMessage::Channel { channel, message }));
            }
        }

        let mut stats = AssembleStats {
            ticks_per_unit,
            ..Default::default()
        };
        // Ticks of dropped events carry over so later events keep their time
        let mut pending = 0u64;
        let mut last_tick = 0u64;

        for event in events {
            pending += scale(event.delta, ticks_per_unit);
            match self.translate(event) {
                Some(message) => {
                    let delta = pending.min(MAX_DELTA as u64) as u32;
                    track.push(delta, message);
                    last_tick += delta as u64;
                    pending -= delta as u64;
                    stats.written += 1;
                }
                None => {
                    debug!("Dropping invalid event {:?}", event);
                    stats.dropped += 1;
                }
            }
        }

        track.push(pending.min(MAX_DELTA as u64) as u32, SmfMessage::EndOfTrack);
        debug!(
            "Assembled {} events over {} ticks ({} dropped)",
            stats.written,
            last_tick,
            stats.dropped
        );
        Ok((track, stats))
    }

    /// Apply routing and overrides to one event
    fn translate(&self, event: &TimedEvent) -> Option<SmfMessage> {
        match &event.kind {
            EventKind::SysEx { data } => {
                if data.iter().any(|&b| b >= 0x80) {
                    return None;
                }
                let mut bytes = Vec::with_capacity(data.len() + 1);
                bytes.extend_from_slice(data);
                bytes.push(0xF7);
                Some(SmfMessage::SysEx(bytes))
            }
            EventKind::Channel {
                status: status_byte,
                data1,
                data2,
            } => {
                let channel = self.preset.route(status_byte & 0x0F);
                let mut message = ChannelMessage::from_raw(*status_byte, *data1, *data2)?;
                if let ChannelMessage::ProgramChange { program } = &mut message {
                    if let Some(&forced) = self.preset.program_override.get(&channel) {
                        *program = valid(forced)?;
                    }
                }
                Some(SmfMessage::Channel { channel, message })
            }
        }
    }
}

/// Scale a FIL delta to MIDI ticks, truncating
fn scale(delta: u32, ticks_per_unit: f64) -> u64 {
    let ticks = delta as f64 * ticks_per_unit;
    if ticks.is_finite() && ticks > 0.0 {
        ticks as u64
    } else {
        0
    }
}

/// Encode text as Latin-1.
///
/// Typographic quotes and dashes fold to ASCII; anything else outside
/// Latin-1 is dropped.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push(b'\''),
            '\u{201C}' | '\u{201D}' => out.push(b'"'),
            '\u{2013}' | '\u{2014}' => out.push(b'-'),
            '\u{2026}' => out.extend_from_slice(b"..."),
            _ => {
                if let Ok(byte) = u8::try_from(u32::from(c)) {
                    out.push(byte);
                }
            }
        }
    }
    out
}
