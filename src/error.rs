use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("FIL format error: {0}")]
    Format(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("Invalid channel map entry: '{0}'")]
    InvalidChannelMap(String),

    #[error("Invalid MIDI channel: {0} (expected 0-15)")]
    InvalidChannel(u8),

    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),

    #[error("Unknown preset: '{0}'")]
    UnknownPreset(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::MidiParse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
