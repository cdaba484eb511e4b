//! Timed events produced by the FIL decoder

use serde::Serialize;

/// Channel-voice status nibbles
pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_PRESSURE: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_PRESSURE: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;
    pub const SYSEX: u8 = 0xF0;
}

/// Number of data bytes following a channel-voice status byte
pub fn channel_data_len(status: u8) -> usize {
    match status & 0xF0 {
        status::PROGRAM_CHANGE | status::CHANNEL_PRESSURE => 1,
        _ => 2,
    }
}

/// True for status bytes 0x80..=0xEF
pub fn is_channel_status(byte: u8) -> bool {
    (0x80..=0xEF).contains(&byte)
}

/// Payload of a decoded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Channel-voice message; data bytes are always below 0x80
    Channel {
        status: u8,
        data1: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        data2: Option<u8>,
    },
    /// System exclusive payload without the F0/F7 brackets
    SysEx { data: Vec<u8> },
}

/// A decoded event with the ticks elapsing before it fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimedEvent {
    pub delta: u32,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl TimedEvent {
    pub fn channel(delta: u32, status: u8, data1: u8, data2: Option<u8>) -> Self {
        Self {
            delta,
            kind: EventKind::Channel {
                status,
                data1,
                data2,
            },
        }
    }

    pub fn sysex(delta: u32, data: Vec<u8>) -> Self {
        Self {
            delta,
            kind: EventKind::SysEx { data },
        }
    }

    /// Status byte (0xF0 for system exclusive)
    pub fn status(&self) -> u8 {
        match &self.kind {
            EventKind::Channel { status, .. } => *status,
            EventKind::SysEx { .. } => status::SYSEX,
        }
    }

    pub fn is_sysex(&self) -> bool {
        matches!(self.kind, EventKind::SysEx { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_len() {
        assert_eq!(channel_data_len(0x90), 2);
        assert_eq!(channel_data_len(0xC3), 1);
        assert_eq!(channel_data_len(0xD0), 1);
        assert_eq!(channel_data_len(0xEF), 2);
    }

    #[test]
    fn test_serialize_event() {
        let ev = TimedEvent::channel(5, 0x90, 60, Some(64));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["delta"], 5);
        assert_eq!(json["type"], "channel");
        assert_eq!(json["status"], 144);
        assert_eq!(json["data2"], 64);

        let sysex = serde_json::to_value(TimedEvent::sysex(0, vec![0x43, 0x10])).unwrap();
        assert_eq!(sysex["type"], "sys_ex");
        assert!(sysex.get("data2").is_none());
    }
}
