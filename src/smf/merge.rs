//! Format 1 to Format 0 conversion by absolute-time interleaving

use super::assembler::MAX_DELTA;
use crate::backup::{appended_backup_path, write_with_backup};
use crate::error::Result;
use midly::num::u28;
use midly::{Format, Header, MetaMessage, Smf, TrackEvent, TrackEventKind};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// What happened to a file handed to the converter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// The merged Format 0 file
    Converted(Vec<u8>),
    /// Already Format 0; nothing to do
    AlreadySingleTrack,
    /// More than one track and the caller did not force the merge
    Refused { tracks: usize },
}

fn is_end_of_track(kind: &TrackEventKind<'_>) -> bool {
    matches!(kind, TrackEventKind::Meta(MetaMessage::EndOfTrack))
}

/// Merge tracks into one, ordered by `(absolute tick, track index)`.
///
/// Per-track End-of-Track events are dropped; a single one is appended at
/// the latest end time of any source track.
pub fn merge_tracks<'a>(tracks: &[Vec<TrackEvent<'a>>]) -> Vec<TrackEvent<'a>> {
    let mut timed: Vec<(u64, usize, TrackEventKind<'a>)> = Vec::new();
    let mut end = 0u64;

    for (index, track) in tracks.iter().enumerate() {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            if !is_end_of_track(&event.kind) {
                timed.push((tick, index, event.kind));
            }
        }
        end = end.max(tick);
    }

    // Stable, so events of one track keep their order at equal ticks
    timed.sort_by_key(|&(tick, index, _)| (tick, index));

    let mut merged = Vec::with_capacity(timed.len() + 1);
    let mut last = 0u64;
    for (tick, _, kind) in timed {
        merged.push(TrackEvent {
            delta: delta_between(last, tick),
            kind,
        });
        last = tick;
    }
    merged.push(TrackEvent {
        delta: delta_between(last, end),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    merged
}

fn delta_between(from: u64, to: u64) -> u28 {
    let delta = to.saturating_sub(from);
    if delta > MAX_DELTA as u64 {
        warn!("Delta of {} ticks exceeds the SMF limit, clamping", delta);
    }
    u28::new(delta.min(MAX_DELTA as u64) as u32)
}

/// Convert the bytes of a MIDI file to Format 0.
///
/// A file with several tracks is refused unless `force` is set. The timing
/// division of the source is kept.
pub fn convert_to_single_track(data: &[u8], force: bool) -> Result<Conversion> {
    let smf = Smf::parse(data)?;
    let tracks = smf.tracks.len();

    if smf.header.format == Format::SingleTrack {
        return Ok(Conversion::AlreadySingleTrack);
    }
    if tracks > 1 && !force {
        return Ok(Conversion::Refused { tracks });
    }

    let merged = merge_tracks(&smf.tracks);
    debug!("Merged {} tracks into {} events", tracks, merged.len());

    let out = Smf {
        header: Header::new(Format::SingleTrack, smf.header.timing),
        tracks: vec![merged],
    };
    let mut bytes = Vec::new();
    out.write_std(&mut bytes)?;
    Ok(Conversion::Converted(bytes))
}

/// Convert `input`, writing to `output` or over the input.
///
/// Overwriting in place keeps the original as `<file>.backup` unless
/// `backup` is false.
pub fn convert_file(
    input: &Path,
    output: Option<&Path>,
    backup: bool,
    force: bool,
) -> Result<Conversion> {
    let data = fs::read(input)?;
    let conversion = convert_to_single_track(&data, force)?;

    if let Conversion::Converted(bytes) = &conversion {
        let target = output.unwrap_or(input);
        let backup_path = (backup && target == input).then(|| appended_backup_path(input));
        write_with_backup(target, bytes, backup_path.as_deref())?;
        info!("Converted {} to Format 0", target.display());
    }
    Ok(conversion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u4, u7};
    use midly::{MidiMessage, Timing};

    fn note_on(delta: u32, channel: u8, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(100),
                },
            },
        }
    }

    fn eot(delta: u32) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        }
    }

    fn key_of(event: &TrackEvent<'_>) -> Option<u8> {
        match event.kind {
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { key, .. },
                ..
            } => Some(key.as_int()),
            _ => None,
        }
    }

    fn format1(tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let smf = Smf {
            header: Header::new(Format::Parallel, Timing::Metrical(u15::new(480))),
            tracks,
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_merge_ties_keep_track_order() {
        let a = vec![note_on(100, 0, 60), eot(0)];
        let b = vec![note_on(100, 1, 64), eot(0)];
        let merged = merge_tracks(&[a, b]);

        assert_eq!(merged.len(), 3);
        assert_eq!(key_of(&merged[0]), Some(60));
        assert_eq!(merged[0].delta.as_int(), 100);
        assert_eq!(key_of(&merged[1]), Some(64));
        assert_eq!(merged[1].delta.as_int(), 0);
        assert!(is_end_of_track(&merged[2].kind));
    }

    #[test]
    fn test_merge_interleaves_and_ends_at_latest_track() {
        let a = vec![note_on(0, 0, 60), note_on(200, 0, 62), eot(10)];
        let b = vec![note_on(50, 1, 70), eot(500)];
        let merged = merge_tracks(&[a, b]);

        let keys: Vec<_> = merged.iter().filter_map(key_of).collect();
        assert_eq!(keys, vec![60, 70, 62]);
        let deltas: Vec<_> = merged.iter().map(|e| e.delta.as_int()).collect();
        assert_eq!(deltas, vec![0, 50, 150, 350]);
        assert_eq!(merged.iter().filter(|e| is_end_of_track(&e.kind)).count(), 1);
    }

    #[test]
    fn test_convert_refuses_multitrack_without_force() {
        let data = format1(vec![
            vec![note_on(0, 0, 60), eot(0)],
            vec![note_on(0, 1, 61), eot(0)],
        ]);
        assert_eq!(
            convert_to_single_track(&data, false).unwrap(),
            Conversion::Refused { tracks: 2 }
        );

        let Conversion::Converted(out) = convert_to_single_track(&data, true).unwrap() else {
            panic!("expected a forced conversion");
        };
        let smf = Smf::parse(&out).unwrap();
        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(480)));
        assert_eq!(smf.tracks.len(), 1);
        assert_eq!(smf.tracks[0].len(), 3);
    }

    #[test]
    fn test_convert_single_track_format1_without_force() {
        let data = format1(vec![vec![note_on(0, 0, 60), eot(0)]]);
        assert!(matches!(
            convert_to_single_track(&data, false).unwrap(),
            Conversion::Converted(_)
        ));
    }

    #[test]
    fn test_format0_is_noop() {
        let data = b"MThd\0\0\0\x06\0\0\0\x01\x01\x80MTrk\0\0\0\x04\x00\xFF\x2F\x00";
        assert_eq!(
            convert_to_single_track(data, false).unwrap(),
            Conversion::AlreadySingleTrack
        );
    }

    #[test]
    fn test_rejects_non_midi() {
        assert!(convert_to_single_track(b"not a midi file", true).is_err());
    }
}
