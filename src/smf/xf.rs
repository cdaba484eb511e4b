//! Yamaha XF solo metadata (copyright and device-recognition markers)

use super::assembler::SmfMessage;
use crate::error::Result;
use midly::num::u28;
use midly::{Format, MetaMessage, Smf, TrackEvent, TrackEventKind};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// XF format marker (XF02 signature)
pub const XF_FORMAT: [u8; 9] = [67, 123, 0, 88, 70, 48, 50, 0, 27];
/// XG system marker
pub const XG_SYSTEM: [u8; 7] = [67, 113, 0, 1, 0, 1, 0];
/// XG system on
pub const XG_SYSTEM_ON: [u8; 6] = [67, 113, 0, 0, 0, 65];
/// XF end marker
pub const XF_END: [u8; 5] = [67, 123, 12, 1, 0];

/// Copyright text recognized by the player
pub fn copyright(year: u16) -> String {
    format!("(P) {} Yamaha Corporation", year)
}

/// Copyright followed by the four markers, in emission order
pub fn solo_markers(year: u16) -> Vec<SmfMessage> {
    vec![
        SmfMessage::Copyright(copyright(year).into_bytes()),
        SmfMessage::SequencerSpecific(XF_FORMAT.to_vec()),
        SmfMessage::SequencerSpecific(XG_SYSTEM.to_vec()),
        SmfMessage::SequencerSpecific(XG_SYSTEM_ON.to_vec()),
        SmfMessage::SequencerSpecific(XF_END.to_vec()),
    ]
}

/// True for a sequencer-specific payload carrying the XF format marker
pub fn is_xf_format_marker(data: &[u8]) -> bool {
    data.len() >= 5 && data[0] == 67 && data[1] == 123 && data[3] == 88 && data[4] == 70
}

/// Result of tagging an existing file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XfOutcome {
    /// Markers inserted; the rewritten file
    Tagged(Vec<u8>),
    /// The file already carries an XF format marker
    AlreadyTagged,
    /// Only Format 0 files are tagged
    NotSingleTrack { tracks: usize },
}

/// Insert the solo markers into a Format 0 file.
///
/// They go right after the leading run of tempo, time-signature and
/// track-name meta-events.
pub fn add_solo_metadata(data: &[u8], year: u16) -> Result<XfOutcome> {
    let markers = solo_markers(year);
    let mut smf = Smf::parse(data)?;

    if smf.header.format != Format::SingleTrack || smf.tracks.len() != 1 {
        return Ok(XfOutcome::NotSingleTrack {
            tracks: smf.tracks.len(),
        });
    }

    let track = &mut smf.tracks[0];
    let tagged = track.iter().any(|e| {
        matches!(
            e.kind,
            TrackEventKind::Meta(MetaMessage::SequencerSpecific(d)) if is_xf_format_marker(d)
        )
    });
    if tagged {
        return Ok(XfOutcome::AlreadyTagged);
    }

    let insert_at = track
        .iter()
        .take_while(|e| {
            matches!(
                e.kind,
                TrackEventKind::Meta(
                    MetaMessage::Tempo(_)
                        | MetaMessage::TimeSignature(..)
                        | MetaMessage::TrackName(_)
                )
            )
        })
        .count();

    for (i, marker) in markers.iter().enumerate() {
        track.insert(
            insert_at + i,
            TrackEvent {
                delta: u28::new(0),
                kind: marker.to_midly(),
            },
        );
    }
    debug!("Inserting XF solo metadata at event {}", insert_at);

    let mut out = Vec::new();
    smf.write_std(&mut out)?;
    Ok(XfOutcome::Tagged(out))
}

/// Current year (UTC) from the system clock
pub fn current_year() -> u16 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    year_from_days((secs / 86_400) as i64)
}

/// Gregorian year of a day count since 1970-01-01
fn year_from_days(days: i64) -> u16 {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let year = yoe + era * 400 + if mp >= 10 { 1 } else { 0 };
    year as u16
}
