//! # Tempo Model
//!
//! Maps duration keys (`quarter`, `half`, ...) to seconds for a given BPM.
//!
//! The table is always derived from the BPM in one go; changing tempo builds a
//! new model rather than editing entries.
//!
//! | key              | beats |
//! |------------------|-------|
//! | `full`           | 4     |
//! | `half`           | 2     |
//! | `quarter`        | 1     |
//! | `eighth`         | 0.5   |
//! | `sixteenth`      | 0.25  |
//! | `quarter_dotted` | 1.5   |
//! | `half_dotted`    | 3     |
//!
//! ## Example
//! ```rust
//! use jointplay::TempoModel;
//!
//! let tempo = TempoModel::from_bpm(120).unwrap();
//! assert_eq!(tempo.seconds("quarter"), Some(0.5));
//! assert_eq!(tempo.seconds("half"), Some(1.0));
//! assert_eq!(tempo.seconds("eighth"), Some(0.25));
//! assert_eq!(tempo.seconds("triplet"), None);
//! ```

use std::fmt;

use crate::error::ConfigError;

pub const MIN_BPM: u32 = 40;
pub const MAX_BPM: u32 = 240;
pub const DEFAULT_BPM: u32 = 120;

/// Duration keys and their length in beats, in display order.
const BEAT_TABLE: [(&str, f64); 7] = [
    ("full", 4.0),
    ("half", 2.0),
    ("quarter", 1.0),
    ("eighth", 0.5),
    ("sixteenth", 0.25),
    ("quarter_dotted", 1.5),
    ("half_dotted", 3.0),
];

/// Note durations in seconds, derived from a BPM.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoModel {
    bpm: u32,
    durations: Vec<(&'static str, f64)>,
}

impl TempoModel {
    /// Build the duration table for `bpm`, which must lie in 40..=240.
    pub fn from_bpm(bpm: u32) -> Result<Self, ConfigError> {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(ConfigError::InvalidBpm(bpm));
        }
        let beat = 60.0 / bpm as f64;
        let durations = BEAT_TABLE
            .iter()
            .map(|&(key, beats)| (key, beat * beats))
            .collect();
        Ok(Self { bpm, durations })
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Seconds per quarter note.
    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.bpm as f64
    }

    pub fn seconds(&self, key: &str) -> Option<f64> {
        self.durations
            .iter()
            .find(|(k, _)| *k == key)
            .map(|&(_, seconds)| seconds)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seconds(key).is_some()
    }

    /// `(key, seconds)` pairs in table order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.durations.iter().copied()
    }

    /// Sorted, comma-separated key list for error messages.
    pub fn available_keys(&self) -> String {
        let mut keys: Vec<&str> = self.durations.iter().map(|(k, _)| *k).collect();
        keys.sort_unstable();
        keys.join(", ")
    }
}

impl Default for TempoModel {
    fn default() -> Self {
        let beat = 60.0 / DEFAULT_BPM as f64;
        Self {
            bpm: DEFAULT_BPM,
            durations: BEAT_TABLE.iter().map(|&(k, b)| (k, beat * b)).collect(),
        }
    }
}

/// Time signature (e.g., 4/4, 3/4, 6/8). Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    /// Parse `"N/D"`.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTimeSignature(s.to_string());
        let (beats, beat_type) = s.trim().split_once('/').ok_or_else(invalid)?;
        let beats: u8 = beats.trim().parse().map_err(|_| invalid())?;
        let beat_type: u8 = beat_type.trim().parse().map_err(|_| invalid())?;
        if beats == 0 || beat_type == 0 {
            return Err(invalid());
        }
        Ok(Self { beats, beat_type })
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}
