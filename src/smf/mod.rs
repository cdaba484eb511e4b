pub mod assembler;
pub mod merge;
pub mod preset;
pub mod repair;
pub mod vlq;
pub mod xf;

pub use assembler::{AssembleStats, Assembler, ChannelMessage, SmfEvent, SmfMessage, SmfTrack};
pub use merge::{convert_file, convert_to_single_track, merge_tracks, Conversion};
pub use preset::{ChannelMap, DevicePreset, PresetName, UserOverrides};
pub use repair::{
    repair_file, repair_key_signatures, scan_key_signatures, KeySignatureFault, RepairReport,
};
pub use vlq::{read_vlq, TrackWalker};
pub use xf::{add_solo_metadata, XfOutcome};
