//! # Instrument Configuration
//!
//! An instrument configuration tells the player which notes exist, which hand
//! plays each one, where each note's episode lives, the tempo, and the episodes
//! that hold the initial and final resting positions.
//!
//! ## Format
//! YAML (or JSON, chosen by file extension) with kebab-case keys:
//! ```yaml
//! instrument-name: xylophone
//! description: Small wooden xylophone
//! tempo-bpm: 100
//! time-signature: 4/4
//! init-position-episode: positions/init.json
//! final-position-episode: positions/final.json
//! notes:
//!   C1: { hand: left, episode: notes/C1_left.json, recorded: true }
//!   E1: { hand: right, episode: notes/E1_right.json, recorded: true }
//! playback:
//!   tick-rate-hz: 500
//!   note-transition-seconds: 1.0
//! ```
//!
//! Parsing goes through a raw `Deserialize` struct that is then validated into
//! [`InstrumentConfig`]; unknown keys are ignored.
//!
//! ## Example
//! ```rust
//! use jointplay::{Hand, InstrumentConfig};
//!
//! let config = InstrumentConfig::from_yaml_str(r#"
//! instrument-name: bells
//! tempo-bpm: 60
//! notes:
//!   A: { hand: left, episode: a.json, recorded: true }
//! "#).unwrap();
//!
//! assert_eq!(config.tempo().seconds("quarter"), Some(1.0));
//! assert_eq!(config.note("A").unwrap().hand, Hand::Left);
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sequence::Hand;
use crate::tempo::{TempoModel, TimeSignature, DEFAULT_BPM};

pub const MIN_TICK_RATE_HZ: f64 = 1.0;
pub const MAX_TICK_RATE_HZ: f64 = 10_000.0;

/// Control-loop and transition parameters.
///
/// Checked by [`PlaybackSettings::validate`] when a configuration is loaded
/// and again by `Session::new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlaybackSettings {
    /// Control loop rate, independent of any episode's recording rate.
    pub tick_rate_hz: f64,
    /// Eased move to an episode's first frame for stand-alone replay.
    pub transition_seconds: f64,
    /// Eased move to a note episode's first frame inside a chord.
    pub note_transition_seconds: f64,
    /// Eased move to the init/final resting poses, before speed scaling.
    pub position_transition_seconds: f64,
    /// Ticks the last pose is re-sent for after a cancel.
    pub cancel_hold_ticks: u32,
    /// Pause after the init move and before the final move.
    pub settle_seconds: f64,
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_rate_hz: 500.0,
            transition_seconds: 3.0,
            note_transition_seconds: 1.0,
            position_transition_seconds: 3.0,
            cancel_hold_ticks: 25,
            settle_seconds: 0.5,
            min_speed: 0.25,
            max_speed: 2.0,
        }
    }
}

impl PlaybackSettings {
    /// Control tick period (2 ms at the default 500 Hz).
    pub fn tick(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }

    /// Clamp a speed multiplier into the safe band.
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        if speed.is_nan() {
            log::warn!("Speed is NaN, using 1.0");
            return 1.0_f64.clamp(self.min_speed, self.max_speed);
        }
        let clamped = speed.clamp(self.min_speed, self.max_speed);
        if clamped != speed {
            log::warn!(
                "Speed {} outside [{}, {}], clamped to {}",
                speed,
                self.min_speed,
                self.max_speed,
                clamped
            );
        }
        clamped
    }

    /// Settle pause as a `Duration`; values too large to represent saturate.
    pub fn settle(&self) -> Duration {
        Duration::try_from_secs_f64(self.settle_seconds).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TICK_RATE_HZ..=MAX_TICK_RATE_HZ).contains(&self.tick_rate_hz) {
            return Err(ConfigError::InvalidSetting(format!(
                "tick-rate-hz must be between {} and {}, got {}",
                MIN_TICK_RATE_HZ, MAX_TICK_RATE_HZ, self.tick_rate_hz
            )));
        }
        let positive = [
            ("min-speed", self.min_speed),
            ("max-speed", self.max_speed),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidSetting(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        let non_negative = [
            ("transition-seconds", self.transition_seconds),
            ("note-transition-seconds", self.note_transition_seconds),
            ("position-transition-seconds", self.position_transition_seconds),
            ("settle-seconds", self.settle_seconds),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidSetting(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }
        if self.min_speed > self.max_speed {
            return Err(ConfigError::InvalidSetting(format!(
                "min-speed {} exceeds max-speed {}",
                self.min_speed, self.max_speed
            )));
        }
        Ok(())
    }
}

/// One configured note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEntry {
    pub hand: Hand,
    pub episode: PathBuf,
    /// Whether the episode has been recorded.
    pub recorded: bool,
}

/// Validated instrument configuration. Read-only input to the compiler.
#[derive(Debug, Clone)]
pub struct InstrumentConfig {
    pub instrument_name: String,
    pub description: String,
    pub time_signature: TimeSignature,
    pub init_position_episode: Option<PathBuf>,
    pub final_position_episode: Option<PathBuf>,
    pub playback: PlaybackSettings,
    tempo: TempoModel,
    notes: BTreeMap<String, NoteEntry>,
}

/// Raw configuration for YAML/JSON deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct RawInstrumentConfig {
    instrument_name: Option<String>,
    description: Option<String>,
    tempo_bpm: Option<u32>,
    time_signature: Option<String>,
    init_position_episode: Option<PathBuf>,
    final_position_episode: Option<PathBuf>,
    #[serde(default)]
    notes: BTreeMap<String, RawNoteEntry>,
    playback: Option<PlaybackSettings>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct RawNoteEntry {
    hand: String,
    #[serde(alias = "episode-path")]
    episode: PathBuf,
    #[serde(default)]
    recorded: bool,
}

impl InstrumentConfig {
    /// An empty configuration at the default tempo.
    pub fn new(instrument_name: impl Into<String>) -> Self {
        Self {
            instrument_name: instrument_name.into(),
            description: String::new(),
            time_signature: TimeSignature::default(),
            init_position_episode: None,
            final_position_episode: None,
            playback: PlaybackSettings::default(),
            tempo: TempoModel::default(),
            notes: BTreeMap::new(),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawInstrumentConfig = serde_yaml::from_str(content)?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawInstrumentConfig = serde_json::from_str(content)?;
        Self::from_raw(raw)
    }

    /// Load from a `.json` file, or YAML for any other extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_yaml_str(&content)?,
        };
        log::info!(
            "Configuration loaded: {} ({} notes, {} BPM)",
            path.display(),
            config.notes.len(),
            config.tempo.bpm()
        );
        Ok(config)
    }

    fn from_raw(raw: RawInstrumentConfig) -> Result<Self, ConfigError> {
        let tempo = TempoModel::from_bpm(raw.tempo_bpm.unwrap_or(DEFAULT_BPM))?;

        let time_signature = match &raw.time_signature {
            Some(ts) => TimeSignature::parse(ts)?,
            None => TimeSignature::default(),
        };

        let playback = raw.playback.unwrap_or_default();
        playback.validate()?;

        let mut notes = BTreeMap::new();
        for (name, entry) in raw.notes {
            let hand = Hand::parse(&entry.hand).ok_or_else(|| ConfigError::InvalidHand {
                note: name.clone(),
                hand: entry.hand.clone(),
            })?;
            notes.insert(
                name,
                NoteEntry {
                    hand,
                    episode: entry.episode,
                    recorded: entry.recorded,
                },
            );
        }

        Ok(Self {
            instrument_name: raw.instrument_name.unwrap_or_else(|| "instrument".to_string()),
            description: raw.description.unwrap_or_default(),
            time_signature,
            init_position_episode: raw.init_position_episode,
            final_position_episode: raw.final_position_episode,
            playback,
            tempo,
            notes,
        })
    }

    /// Builder-style note registration.
    pub fn with_note(
        mut self,
        name: impl Into<String>,
        hand: Hand,
        episode: impl Into<PathBuf>,
        recorded: bool,
    ) -> Self {
        self.notes.insert(
            name.into(),
            NoteEntry {
                hand,
                episode: episode.into(),
                recorded,
            },
        );
        self
    }

    pub fn with_init_position(mut self, episode: impl Into<PathBuf>) -> Self {
        self.init_position_episode = Some(episode.into());
        self
    }

    pub fn with_final_position(mut self, episode: impl Into<PathBuf>) -> Self {
        self.final_position_episode = Some(episode.into());
        self
    }

    pub fn tempo(&self) -> &TempoModel {
        &self.tempo
    }

    /// Replace the tempo; the duration table is rebuilt from scratch.
    pub fn set_tempo(&mut self, bpm: u32) -> Result<(), ConfigError> {
        self.tempo = TempoModel::from_bpm(bpm)?;
        log::info!("Tempo set to {} BPM", bpm);
        Ok(())
    }

    pub fn note(&self, name: &str) -> Option<&NoteEntry> {
        self.notes.get(name)
    }

    /// Notes in name order.
    pub fn notes(&self) -> impl Iterator<Item = (&str, &NoteEntry)> {
        self.notes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn notes_for_hand(&self, hand: Hand) -> Vec<&str> {
        self.notes
            .iter()
            .filter(|(_, entry)| entry.hand == hand)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Sorted, comma-separated note list for error messages.
    pub fn available_notes(&self) -> String {
        self.notes.keys().cloned().collect::<Vec<_>>().join(", ")
    }

    /// Gaps that would keep a song from playing end to end.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.notes.is_empty() {
            problems.push("No notes configured".to_string());
        }
        if self.init_position_episode.is_none() {
            problems.push("Initial position episode not set".to_string());
        }
        if self.final_position_episode.is_none() {
            problems.push("Final position episode not set".to_string());
        }
        problems
    }

    /// Multi-line human-readable summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Configuration: {}", self.instrument_name);
        if !self.description.is_empty() {
            let _ = writeln!(out, "Description: {}", self.description);
        }
        let _ = writeln!(out, "Tempo: {} BPM", self.tempo.bpm());
        let _ = writeln!(out, "Time Signature: {}", self.time_signature);

        let _ = writeln!(out, "\nNote Durations:");
        for (key, seconds) in self.tempo.entries() {
            let _ = writeln!(out, "  {}: {:.3}s", key, seconds);
        }

        let show = |p: &Option<PathBuf>| {
            p.as_ref()
                .map_or_else(|| "Not set".to_string(), |p| p.display().to_string())
        };
        let _ = writeln!(out, "\nPosition Episodes:");
        let _ = writeln!(out, "  Init: {}", show(&self.init_position_episode));
        let _ = writeln!(out, "  Final: {}", show(&self.final_position_episode));

        if self.notes.is_empty() {
            let _ = writeln!(out, "\nNo notes configured yet");
        } else {
            let _ = writeln!(out, "\nConfigured Notes ({} total):", self.notes.len());
            for (name, entry) in &self.notes {
                let status = if entry.recorded { "recorded" } else { "not recorded" };
                let _ = writeln!(
                    out,
                    "  {:<8} {:<6} {:<13} {}",
                    name,
                    entry.hand,
                    status,
                    entry.episode.display()
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
instrument-name: xylophone
description: Small wooden xylophone
tempo-bpm: 100
time-signature: 3/4
init-position-episode: positions/init.json
notes:
  C1: { hand: left, episode: notes/C1_left.json, recorded: true }
  E1: { hand: right, episode-path: notes/E1_right.json }
playback:
  note-transition-seconds: 0.5
"#;

    #[test]
    fn test_parse_yaml_config() {
        let config = InstrumentConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.instrument_name, "xylophone");
        assert_eq!(config.tempo().bpm(), 100);
        assert_eq!(config.time_signature, TimeSignature { beats: 3, beat_type: 4 });
        assert_eq!(
            config.init_position_episode,
            Some(PathBuf::from("positions/init.json"))
        );
        assert_eq!(config.final_position_episode, None);

        let c1 = config.note("C1").unwrap();
        assert_eq!(c1.hand, Hand::Left);
        assert!(c1.recorded);
        let e1 = config.note("E1").unwrap();
        assert_eq!(e1.episode, PathBuf::from("notes/E1_right.json"));
        assert!(!e1.recorded);

        assert_eq!(config.playback.note_transition_seconds, 0.5);
        assert_eq!(config.playback.tick_rate_hz, 500.0);
    }

    #[test]
    fn test_parse_json_config() {
        let config = InstrumentConfig::from_json_str(
            r#"{"instrument-name": "drum", "notes": {"K": {"hand": "right", "episode": "k.json", "recorded": true}}}"#,
        )
        .unwrap();
        assert_eq!(config.notes_for_hand(Hand::Right), vec!["K"]);
        assert_eq!(config.tempo().bpm(), 120);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            InstrumentConfig::from_yaml_str("tempo-bpm: 300"),
            Err(ConfigError::InvalidBpm(300))
        ));
        assert!(matches!(
            InstrumentConfig::from_yaml_str("time-signature: four"),
            Err(ConfigError::InvalidTimeSignature(_))
        ));
        assert!(matches!(
            InstrumentConfig::from_yaml_str("notes:\n  X: { hand: both, episode: x.json }"),
            Err(ConfigError::InvalidHand { .. })
        ));
        assert!(matches!(
            InstrumentConfig::from_yaml_str("playback:\n  min-speed: 3.0"),
            Err(ConfigError::InvalidSetting(_))
        ));
        assert!(matches!(
            InstrumentConfig::from_yaml_str("playback:\n  tick-rate-hz: 0"),
            Err(ConfigError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_set_tempo_rebuilds_table() {
        let mut config = InstrumentConfig::new("test");
        config.set_tempo(60).unwrap();
        assert_eq!(config.tempo().seconds("half"), Some(2.0));
        assert!(config.set_tempo(10).is_err());
        assert_eq!(config.tempo().bpm(), 60);
    }

    #[test]
    fn test_clamp_speed() {
        let settings = PlaybackSettings::default();
        assert_eq!(settings.clamp_speed(5.0), 2.0);
        assert_eq!(settings.clamp_speed(0.1), 0.25);
        assert_eq!(settings.clamp_speed(1.5), 1.5);
        assert_eq!(settings.clamp_speed(f64::NAN), 1.0);
        assert_eq!(settings.tick(), Duration::from_millis(2));
    }

    #[test]
    fn test_problems_and_summary() {
        let config = InstrumentConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.problems(), vec!["Final position episode not set".to_string()]);

        let summary = config.summary();
        assert!(summary.contains("Tempo: 100 BPM"));
        assert!(summary.contains("quarter: 0.600s"));
        assert!(summary.contains("Final: Not set"));
        assert!(summary.contains("not recorded"));
    }
}
