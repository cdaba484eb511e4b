pub mod event;
pub mod header;
pub mod input;
pub mod json;
pub mod reader;

pub use event::{EventKind, TimedEvent};
pub use header::FilHeader;
pub use input::{midi_output_path, read_fil};
pub use json::FilJson;
pub use reader::{decode, decode_events, DecodeMode, DecodedStream, FilReader};
