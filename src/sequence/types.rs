//! Compiled sequence type definitions

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Which physical executor plays a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    /// Parse `left` / `right` (exact, lowercase).
    pub fn parse(s: &str) -> Option<Hand> {
        match s {
            "left" => Some(Hand::Left),
            "right" => Some(Hand::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single note (or rest) with its nominal duration.
///
/// # Fields
/// - `note`: note identifier, or `rest`
/// - `hand`: the hand playing it; `None` for rests
/// - `duration`: duration key from the tempo table (`quarter`, `half`, ...)
/// - `duration_seconds`: the key resolved at the program's tempo
/// - `episode`: the note's recorded episode; `None` for rests
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteAction {
    pub note: String,
    pub hand: Option<Hand>,
    pub duration: String,
    pub duration_seconds: f64,
    pub episode: Option<PathBuf>,
}

impl NoteAction {
    pub fn is_rest(&self) -> bool {
        self.episode.is_none()
    }
}

impl fmt::Display for NoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hand = self.hand.map_or("none", |h| h.as_str());
        write!(f, "{}:{}:{}", self.note, hand, self.duration)
    }
}

/// Notes meant to start together, at most one per hand.
///
/// The chord's duration is the longest of its notes' durations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordAction {
    notes: Vec<NoteAction>,
    duration_seconds: f64,
}

impl ChordAction {
    /// Callers guarantee `notes` is non-empty.
    pub(crate) fn new(notes: Vec<NoteAction>) -> Self {
        let duration_seconds = notes
            .iter()
            .map(|n| n.duration_seconds)
            .fold(0.0, f64::max);
        Self {
            notes,
            duration_seconds,
        }
    }

    pub fn notes(&self) -> &[NoteAction] {
        &self.notes
    }

    /// Non-rest notes, the ones that actually move joints.
    pub fn playable(&self) -> impl Iterator<Item = &NoteAction> {
        self.notes.iter().filter(|n| !n.is_rest())
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn is_rest(&self) -> bool {
        self.notes.iter().all(NoteAction::is_rest)
    }

    pub fn has_mixed_durations(&self) -> bool {
        self.notes
            .iter()
            .any(|n| n.duration_seconds != self.duration_seconds)
    }

    /// Duration key of the longest note, for display.
    pub fn duration_label(&self) -> &str {
        self.notes
            .iter()
            .find(|n| n.duration_seconds == self.duration_seconds)
            .map_or("", |n| n.duration.as_str())
    }

    /// Human-readable description, e.g. `C1 (left, quarter)`,
    /// `rest (quarter)` or `chord [C1:left, E1:right] (quarter)`.
    pub fn describe(&self) -> String {
        if let [note] = self.notes.as_slice() {
            return match note.hand {
                Some(hand) if !note.is_rest() => {
                    format!("{} ({}, {})", note.note, hand, note.duration)
                }
                _ => format!("rest ({})", note.duration),
            };
        }
        let parts: Vec<String> = self
            .playable()
            .map(|n| format!("{}:{}", n.note, n.hand.map_or("none", |h| h.as_str())))
            .collect();
        format!("chord [{}] ({})", parts.join(", "), self.duration_label())
    }
}

impl fmt::Display for ChordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.notes.iter().map(|n| n.to_string()).collect();
        f.write_str(&parts.join(";"))
    }
}

/// Non-fatal findings from compilation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum CompileWarning {
    /// A chord mixes duration keys; the chord lasts as long as its longest note.
    MixedDurations {
        action: usize,
        shortest: f64,
        longest: f64,
    },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::MixedDurations {
                action,
                shortest,
                longest,
            } => write!(
                f,
                "action {} mixes note durations ({:.3}s to {:.3}s); waiting for the longest",
                action, shortest, longest
            ),
        }
    }
}

/// One line of a sequence preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRow {
    pub index: usize,
    pub action: String,
    pub duration: String,
    pub wait_seconds: f64,
}

/// The compiled, immutable form of one sequence text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceProgram {
    chords: Vec<ChordAction>,
    warnings: Vec<CompileWarning>,
}

impl SequenceProgram {
    pub(crate) fn new(chords: Vec<ChordAction>, warnings: Vec<CompileWarning>) -> Self {
        Self { chords, warnings }
    }

    pub fn chords(&self) -> &[ChordAction] {
        &self.chords
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    /// Nominal length of the song: the sum of chord durations, scaled.
    pub fn total_seconds(&self, tempo_multiplier: f64) -> f64 {
        self.chords
            .iter()
            .map(ChordAction::duration_seconds)
            .sum::<f64>()
            * tempo_multiplier
    }

    /// Distinct episode paths referenced by non-rest notes.
    pub fn episode_paths(&self) -> BTreeSet<&Path> {
        self.chords
            .iter()
            .flat_map(|c| c.playable())
            .filter_map(|n| n.episode.as_deref())
            .collect()
    }

    pub fn preview(&self, tempo_multiplier: f64) -> Vec<PreviewRow> {
        self.chords
            .iter()
            .enumerate()
            .map(|(i, chord)| PreviewRow {
                index: i + 1,
                action: chord.describe(),
                duration: chord.duration_label().to_string(),
                wait_seconds: chord.duration_seconds() * tempo_multiplier,
            })
            .collect()
    }

    /// Preview as a plain-text table with a total line.
    pub fn render_preview(&self, tempo_multiplier: f64) -> String {
        let rows = self.preview(tempo_multiplier);
        let width = rows.iter().map(|r| r.action.len()).max().unwrap_or(6).max(6);
        let mut out = format!(
            "{:>3}  {:<width$}  {:<14}  {:>8}\n",
            "#",
            "Action",
            "Duration",
            "Wait (s)",
            width = width
        );
        for row in &rows {
            out.push_str(&format!(
                "{:>3}  {:<width$}  {:<14}  {:>8.2}\n",
                row.index,
                row.action,
                row.duration,
                row.wait_seconds,
                width = width
            ));
        }
        out.push_str(&format!(
            "Total duration: {:.2}s\n",
            self.total_seconds(tempo_multiplier)
        ));
        out
    }
}
