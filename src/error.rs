//! # Error Types
//!
//! This module defines all error types for jointplay.
//!
//! Compile-time errors carry the 1-based action number (the position of the
//! `->`-separated group in the sequence text) so a composer can find the
//! offending note-spec quickly.
//!
//! ## Error Types
//! - `SequenceError` - DSL compilation errors, one variant per validation rule
//! - `EpisodeError` - invalid episode data or episode file I/O
//! - `ConfigError` - invalid instrument configuration
//! - `PreflightError` - every problem found by the batch pre-flight check
//! - `PlaybackError` - runtime failures while driving the actuator
//! - `SongError` - anything that can stop a whole song
//!
//! ## Usage
//! ```rust
//! use jointplay::{compile, InstrumentConfig, MemoryEpisodeStore, SequenceError};
//!
//! let config = InstrumentConfig::from_yaml_str("instrument-name: empty\n").unwrap();
//! let store = MemoryEpisodeStore::new();
//!
//! match compile("C1:left:quarter", &config, &store) {
//!     Err(SequenceError::UnknownNote { action, note, .. }) => {
//!         assert_eq!(action, 1);
//!         assert_eq!(note, "C1");
//!     }
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while compiling a note sequence.
///
/// Compilation is all-or-nothing: the first error aborts the whole program.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequenceError {
    /// A note-spec did not have exactly three `:`-separated fields.
    ///
    /// # Example
    /// ```
    /// # use jointplay::SequenceError;
    /// let err = SequenceError::Format { action: 2, spec: "C1:left".to_string() };
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Format error in action 2: 'C1:left' (expected 'note:hand:duration', e.g. 'C1:left:quarter')"
    /// );
    /// ```
    #[error("Format error in action {action}: '{spec}' (expected 'note:hand:duration', e.g. 'C1:left:quarter')")]
    Format { action: usize, spec: String },

    #[error("Unknown note in action {action}: '{note}' (available: {available})")]
    UnknownNote {
        action: usize,
        note: String,
        available: String,
    },

    /// The note is configured but its episode is absent from the store or was never recorded.
    #[error("Missing episode in action {action} for note '{note}': {path}")]
    MissingEpisode {
        action: usize,
        note: String,
        path: PathBuf,
    },

    #[error("Invalid hand in action {action}: '{hand}' (must be 'left' or 'right')")]
    InvalidHand { action: usize, hand: String },

    #[error("Hand mismatch in action {action} for note '{note}': configured as '{configured}', but sequence uses '{requested}'")]
    HandMismatch {
        action: usize,
        note: String,
        configured: String,
        requested: String,
    },

    #[error("Unknown duration in action {action}: '{duration}' (available: {available})")]
    UnknownDuration {
        action: usize,
        duration: String,
        available: String,
    },

    /// Two non-rest notes in the same chord need the same hand.
    #[error("Hand collision in action {action}: '{first}' and '{second}' both use the {hand} hand")]
    HandCollision {
        action: usize,
        hand: String,
        first: String,
        second: String,
    },

    #[error("No notes found in sequence")]
    Empty,
}

/// Errors raised while building, trimming, loading or saving an episode.
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error("Episode has no frames")]
    Empty,

    #[error("Episode frame count mismatch: {timestamps} timestamps, {positions} position vectors")]
    FrameCountMismatch { timestamps: usize, positions: usize },

    #[error("Episode velocity count mismatch: {timestamps} timestamps, {velocities} velocity vectors")]
    VelocityCountMismatch { timestamps: usize, velocities: usize },

    #[error("Episode timestamps decrease at frame {frame}: {previous} -> {current}")]
    DecreasingTimestamp {
        frame: usize,
        previous: f64,
        current: f64,
    },

    #[error("Episode frame {frame} has {actual} joints, expected {expected}")]
    RaggedFrame {
        frame: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Episode frame {frame} contains a NaN or infinite value")]
    NonFinite { frame: usize },

    #[error("Joint index {index} is out of range for {joints} joints")]
    JointOutOfRange { index: usize, joints: usize },

    #[error("Joint index {index} appears more than once in the joint subset")]
    DuplicateJoint { index: usize },

    #[error("Unknown joint group: '{0}' (available: legs, waist, arms, left-arm, right-arm, all)")]
    UnknownJointGroup(String),

    #[error("Invalid trim: {0}")]
    InvalidTrim(String),

    #[error("Episode not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Episode serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while loading or editing an instrument configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BPM must be between 40 and 240, got {0}")]
    InvalidBpm(u32),

    #[error("Invalid time signature: {0}")]
    InvalidTimeSignature(String),

    #[error("Invalid hand for note '{note}': '{hand}' (must be 'left' or 'right')")]
    InvalidHand { note: String, hand: String },

    #[error("Invalid playback setting: {0}")]
    InvalidSetting(String),
}

/// A single problem found by the pre-flight check.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreflightIssue {
    #[error("action {action}: episode missing for note '{note}': {path}")]
    EpisodeMissing {
        action: usize,
        note: String,
        path: PathBuf,
    },

    #[error("action {action}: note '{note}' not recorded yet")]
    NotRecorded { action: usize, note: String },

    #[error("episode {path} could not be loaded: {reason}")]
    Unloadable { path: PathBuf, reason: String },

    #[error("{role} position episode missing: {path}")]
    PositionMissing { role: String, path: PathBuf },

    #[error("action {action}: notes '{first}' and '{second}' share joint {joint}")]
    OverlappingJoints {
        action: usize,
        first: String,
        second: String,
        joint: usize,
    },
}

/// Every problem found by the pre-flight check, reported together.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", render_issues(.issues))]
pub struct PreflightError {
    pub issues: Vec<PreflightIssue>,
}

fn render_issues(issues: &[PreflightIssue]) -> String {
    let mut out = format!("Pre-flight check failed with {} problem(s):", issues.len());
    for issue in issues {
        out.push_str(&format!("\n  {}", issue));
    }
    out
}

/// Runtime failures while driving the actuator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// No joint state was available at start; no motion was attempted.
    #[error("Actuator state unavailable: no motion attempted")]
    ActuatorUnavailable,

    #[error("Pose has {actual} joints but episode expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Actuator command failed: {0}")]
    Actuator(String),

    #[error("Another playback already holds control of this session")]
    SessionBusy,

    #[error("Playback task for note '{0}' panicked")]
    TaskPanicked(String),

    #[error("Episode was not loaded before playback: {0}")]
    EpisodeNotLoaded(PathBuf),
}

/// Anything that can stop a song before or during playback.
#[derive(Error, Debug)]
pub enum SongError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("Invalid song option: {0}")]
    InvalidOption(String),
}
