//! In-place repair of corrupted key-signature meta-events
//!
//! The file is never deserialized: the walker only locates events, and each
//! repair overwrites a single mode byte, so no length field changes.

use super::vlq::{ChunkIter, RawEventKind, SmfHeader, TrackWalker};
use crate::backup::{original_backup_path, write_with_backup};
use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Meta-event type of a key signature
pub const KEY_SIGNATURE: u8 = 0x59;

/// Mode byte written over an invalid one (major)
pub const MAJOR: u8 = 0;

/// A key signature whose mode byte is neither major nor minor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySignatureFault {
    /// Track number, 1-based
    pub track: usize,
    /// Absolute file offset of the mode byte
    pub offset: usize,
    pub sharps_flats: i8,
    pub mode: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub format: u16,
    pub tracks: u16,
    pub faults: Vec<KeySignatureFault>,
}

impl RepairReport {
    /// Number of bytes patched (or to patch, for a scan)
    pub fn repairs(&self) -> usize {
        self.faults.len()
    }
}

/// Locate invalid key signatures without modifying anything
pub fn scan_key_signatures(data: &[u8]) -> Result<RepairReport> {
    let header = SmfHeader::parse(data)?;
    let mut faults = Vec::new();
    let mut track = 0;

    for chunk in ChunkIter::new(data, &header) {
        if !chunk.is_track() {
            debug!("Skipping {} chunk", String::from_utf8_lossy(&chunk.id));
            continue;
        }
        track += 1;

        for event in TrackWalker::new(data, chunk.body.clone()) {
            let RawEventKind::Meta {
                meta_type: KEY_SIGNATURE,
                payload,
            } = &event.kind
            else {
                continue;
            };
            if payload.len() < 2 || payload.start + 2 > chunk.body.end {
                continue;
            }
            let (sf, mode) = (data[payload.start], data[payload.start + 1]);
            if mode > 1 {
                faults.push(KeySignatureFault {
                    track,
                    offset: payload.start + 1,
                    sharps_flats: sf as i8,
                    mode,
                });
            }
        }
    }

    Ok(RepairReport {
        format: header.format,
        tracks: header.tracks,
        faults,
    })
}

/// Overwrite every invalid mode byte with major, in place
pub fn repair_key_signatures(data: &mut [u8]) -> Result<RepairReport> {
    let report = scan_key_signatures(data)?;
    for fault in &report.faults {
        warn!(
            "Track {}: key signature at 0x{:X} has mode 0x{:02X} (sharps/flats {}), set to major",
            fault.track, fault.offset, fault.mode, fault.sharps_flats
        );
        data[fault.offset] = MAJOR;
    }
    Ok(report)
}

/// Repair `input`, writing to `output` or over the input.
///
/// Nothing is written when no repair was needed. Overwriting in place keeps
/// the original as `<stem>.original.<ext>`.
pub fn repair_file(input: &Path, output: Option<&Path>) -> Result<RepairReport> {
    let mut data = fs::read(input)?;
    let report = repair_key_signatures(&mut data)?;

    if report.repairs() > 0 {
        let target = output.unwrap_or(input);
        let backup = (target == input).then(|| original_backup_path(input));
        write_with_backup(target, &data, backup.as_deref())?;
        info!(
            "Repaired {} key signature(s) in {}",
            report.repairs(),
            target.display()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smf_with(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut data = b"MThd\0\0\0\x06\0\0\0\x01\x01\x80".to_vec();
        for (id, body) in chunks {
            data.extend_from_slice(*id);
            data.extend_from_slice(&(body.len() as u32).to_be_bytes());
            data.extend_from_slice(body);
        }
        data
    }

    const EOT: [u8; 4] = [0x00, 0xFF, 0x2F, 0x00];

    #[test]
    fn test_repairs_invalid_mode_byte() {
        let mut track = vec![0x00, 0xFF, 0x59, 0x02, 0xFE, 0xFF];
        track.extend_from_slice(&EOT);
        let original = smf_with(&[(b"MTrk", &track[..])]);

        let mut data = original.clone();
        let report = repair_key_signatures(&mut data).unwrap();
        assert_eq!(report.repairs(), 1);
        assert_eq!(
            report.faults[0],
            KeySignatureFault {
                track: 1,
                offset: 27,
                sharps_flats: -2,
                mode: 0xFF
            }
        );

        assert_eq!(data.len(), original.len());
        assert_eq!(data[27], 0x00);
        assert_eq!(data[..27], original[..27]);
        assert_eq!(data[28..], original[28..]);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let mut track = vec![0x00, 0xFF, 0x59, 0x02, 0x03, 0x80];
        track.extend_from_slice(&[0x10, 0xFF, 0x59, 0x02, 0x00, 0x01]);
        track.extend_from_slice(&EOT);
        let mut data = smf_with(&[(b"MTrk", &track[..])]);

        assert_eq!(repair_key_signatures(&mut data).unwrap().repairs(), 1);
        let once = data.clone();
        assert_eq!(repair_key_signatures(&mut data).unwrap().repairs(), 0);
        assert_eq!(data, once);
    }

    #[test]
    fn test_running_status_and_sysex() {
        let track = [
            0x00, 0x90, 0x3C, 0x40, // note on
            0x10, 0x3C, 0x00, // running status
            0x00, 0xF0, 0x05, 0xFF, 0x59, 0x02, 0x03, 0xF7, // sysex that looks like a meta
            0x00, 0xFF, 0x59, 0x02, 0x01, 0x07, // corrupted key signature
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let data = smf_with(&[(b"MTrk", &track[..])]);
        let report = scan_key_signatures(&data).unwrap();
        assert_eq!(report.repairs(), 1);
        assert_eq!(report.faults[0].sharps_flats, 1);
        assert_eq!(report.faults[0].mode, 0x07);
        assert_eq!(report.faults[0].offset, 22 + 20);
    }

    #[test]
    fn test_skips_foreign_chunks() {
        let vendor = [0x00, 0xFF, 0x59, 0x02, 0x00, 0x09];
        let mut track = vec![0x00, 0xFF, 0x59, 0x02, 0x00, 0x09];
        track.extend_from_slice(&EOT);
        let data = smf_with(&[(b"XFIH", &vendor[..]), (b"MTrk", &track[..])]);

        let report = scan_key_signatures(&data).unwrap();
        assert_eq!(report.repairs(), 1);
        assert_eq!(report.faults[0].track, 1);
        assert_eq!(report.faults[0].offset, 14 + 8 + 6 + 8 + 5);
    }

    #[test]
    fn test_rejects_missing_header() {
        let mut data = b"RIFF0000".to_vec();
        assert!(repair_key_signatures(&mut data).is_err());
    }
}
