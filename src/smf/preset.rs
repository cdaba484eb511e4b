//! Device presets: channel remapping, program overrides and tempo

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Tempo used when neither the caller nor a preset picks one
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// Highest MIDI channel number (0-based)
pub const MAX_CHANNEL: u8 = 15;

fn check_channel(channel: u8) -> Result<u8> {
    if channel > MAX_CHANNEL {
        return Err(Error::InvalidChannel(channel));
    }
    Ok(channel)
}

/// Source channel to destination channel mapping, parsed from `src:dst,...`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap(BTreeMap<u8, u8>);

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: u8, dst: u8) -> Result<()> {
        self.0.insert(check_channel(src)?, check_channel(dst)?);
        Ok(())
    }

    pub fn get(&self, channel: u8) -> Option<u8> {
        self.0.get(&channel).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for ChannelMap {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut map = ChannelMap::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (src, dst) = pair
                .split_once(':')
                .ok_or_else(|| Error::InvalidChannelMap(pair.to_string()))?;
            let parse = |v: &str| {
                v.trim()
                    .parse::<u8>()
                    .map_err(|_| Error::InvalidChannelMap(pair.to_string()))
            };
            map.insert(parse(src)?, parse(dst)?)?;
        }
        Ok(map)
    }
}

/// Named device presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetName {
    /// Yamaha Disklavier DKC-900 controller
    Dkc900,
}

impl PresetName {
    pub const ALL: &'static [PresetName] = &[PresetName::Dkc900];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetName::Dkc900 => "dkc900",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PresetName::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownPreset(s.to_string()))
    }
}

/// Values the caller supplied explicitly; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct UserOverrides {
    pub channel_map: Option<ChannelMap>,
    pub force_channel: Option<u8>,
    pub tempo_bpm: Option<f64>,
}

/// Resolved channel/program/tempo settings applied while assembling
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePreset {
    pub channel_map: ChannelMap,
    pub forced_channel: Option<u8>,
    /// Program forced on a channel, also emitted once at tick 0
    pub program_override: BTreeMap<u8, u8>,
    pub tempo_bpm: f64,
}

impl Default for DevicePreset {
    fn default() -> Self {
        Self {
            channel_map: ChannelMap::new(),
            forced_channel: None,
            program_override: BTreeMap::new(),
            tempo_bpm: DEFAULT_TEMPO_BPM,
        }
    }
}

impl DevicePreset {
    /// Layer an optional named preset under the caller's explicit values.
    ///
    /// Preset defaults only fill in what the caller left unset.
    pub fn resolve(preset: Option<PresetName>, user: UserOverrides) -> Result<Self> {
        let mut resolved = Self {
            channel_map: user.channel_map.unwrap_or_default(),
            forced_channel: user.force_channel.map(check_channel).transpose()?,
            ..Self::default()
        };

        let preset_tempo = match preset {
            Some(PresetName::Dkc900) => {
                // Acoustic Grand Piano on channel 0, Mark IV default tempo
                resolved.program_override.insert(0, 0);
                Some(117.0)
            }
            None => None,
        };

        resolved.tempo_bpm = user
            .tempo_bpm
            .or(preset_tempo)
            .unwrap_or(DEFAULT_TEMPO_BPM);
        resolved.tempo_micros()?;
        Ok(resolved)
    }

    /// Destination channel for an event on `channel`; the map wins over the
    /// forced channel.
    pub fn route(&self, channel: u8) -> u8 {
        self.channel_map
            .get(channel)
            .or(self.forced_channel)
            .unwrap_or(channel)
    }

    /// Microseconds per quarter note for the tempo meta-event
    pub fn tempo_micros(&self) -> Result<u32> {
        let bpm = self.tempo_bpm;
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(Error::InvalidTempo(bpm));
        }
        let micros = (60_000_000.0 / bpm) as u64;
        if micros == 0 || micros > 0x00FF_FFFF {
            return Err(Error::InvalidTempo(bpm));
        }
        Ok(micros as u32)
    }
}
