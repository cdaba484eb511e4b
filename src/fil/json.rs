//! JSON serialization types for decoded FIL data

use super::event::TimedEvent;
use super::header::FilHeader;
use super::reader::{DecodeMode, DecodedStream};
use serde::Serialize;

/// Top-level JSON structure for a decoded FIL file
#[derive(Debug, Clone, Serialize)]
pub struct FilJson {
    /// Header fields (absent when decoded heuristically)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<FilHeader>,
    /// How the event stream was located
    pub decode: DecodeMode,
    /// Number of decoded events
    pub event_count: usize,
    /// Events dropped for out-of-range data bytes
    pub dropped_events: usize,
    /// Decoded events
    pub events: Vec<TimedEvent>,
}

impl FilJson {
    pub fn new(stream: DecodedStream) -> Self {
        Self {
            header: stream.header,
            decode: stream.mode,
            event_count: stream.events.len(),
            dropped_events: stream.dropped,
            events: stream.events,
        }
    }
}
