pub mod backup;
pub mod batch;
pub mod cli;
pub mod error;
pub mod fil;
pub mod smf;
pub mod title;

pub use error::{Error, Result};
pub use fil::{decode, DecodedStream};
pub use smf::{Assembler, DevicePreset};
