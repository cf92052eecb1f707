//! Sequence text compiler
//!
//! Turns `C1:left:quarter -> rest:none:quarter -> C1:left:half;E1:right:half`
//! into a [`SequenceProgram`], resolving every note against the instrument
//! configuration and the tempo table.

use std::collections::HashMap;

use super::types::{ChordAction, CompileWarning, Hand, NoteAction, SequenceProgram};
use crate::config::InstrumentConfig;
use crate::episode::EpisodeStore;
use crate::error::SequenceError;

/// Separates chords that play one after another.
pub const SEQUENTIAL_SEPARATOR: &str = "->";
/// Separates notes that play together.
pub const SIMULTANEOUS_SEPARATOR: char = ';';
/// Note identifier for a pause.
pub const REST: &str = "rest";

/// Compiler for sequence text against one instrument.
pub struct SequenceParser<'a> {
    config: &'a InstrumentConfig,
    store: &'a dyn EpisodeStore,
}

impl<'a> SequenceParser<'a> {
    pub fn new(config: &'a InstrumentConfig, store: &'a dyn EpisodeStore) -> Self {
        Self { config, store }
    }

    /// Compile the whole text. The first error aborts compilation.
    pub fn parse(&self, text: &str) -> Result<SequenceProgram, SequenceError> {
        let mut chords = Vec::new();
        let mut warnings = Vec::new();

        for group in text.split(SEQUENTIAL_SEPARATOR) {
            let group = group.trim();
            if group.is_empty() {
                continue;
            }
            let action = chords.len() + 1;
            let Some(chord) = self.parse_group(group, action)? else {
                continue;
            };

            if chord.has_mixed_durations() {
                let shortest = chord
                    .notes()
                    .iter()
                    .map(|n| n.duration_seconds)
                    .fold(f64::INFINITY, f64::min);
                let warning = CompileWarning::MixedDurations {
                    action,
                    shortest,
                    longest: chord.duration_seconds(),
                };
                log::warn!("{}", warning);
                warnings.push(warning);
            }
            chords.push(chord);
        }

        if chords.is_empty() {
            return Err(SequenceError::Empty);
        }
        Ok(SequenceProgram::new(chords, warnings))
    }

    /// `None` when the group holds only separators.
    fn parse_group(
        &self,
        group: &str,
        action: usize,
    ) -> Result<Option<ChordAction>, SequenceError> {
        let mut notes = Vec::new();
        let mut hands: HashMap<Hand, String> = HashMap::new();

        for spec in group.split(SIMULTANEOUS_SEPARATOR) {
            let spec = spec.trim();
            if spec.is_empty() {
                continue;
            }
            let note = self.parse_note(spec, action)?;

            if let Some(hand) = note.hand.filter(|_| !note.is_rest()) {
                if let Some(first) = hands.get(&hand) {
                    return Err(SequenceError::HandCollision {
                        action,
                        hand: hand.to_string(),
                        first: first.clone(),
                        second: note.note.clone(),
                    });
                }
                hands.insert(hand, note.note.clone());
            }
            notes.push(note);
        }

        if notes.is_empty() {
            return Ok(None);
        }
        Ok(Some(ChordAction::new(notes)))
    }

    fn parse_note(&self, spec: &str, action: usize) -> Result<NoteAction, SequenceError> {
        let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
        let [note, hand, duration] = parts.as_slice() else {
            return Err(SequenceError::Format {
                action,
                spec: spec.to_string(),
            });
        };

        let (hand, episode) = if note.eq_ignore_ascii_case(REST) {
            (None, None)
        } else {
            let entry = self
                .config
                .note(note)
                .ok_or_else(|| SequenceError::UnknownNote {
                    action,
                    note: note.to_string(),
                    available: self.config.available_notes(),
                })?;

            if !entry.recorded || !self.store.contains(&entry.episode) {
                return Err(SequenceError::MissingEpisode {
                    action,
                    note: note.to_string(),
                    path: entry.episode.clone(),
                });
            }

            let requested = Hand::parse(hand).ok_or_else(|| SequenceError::InvalidHand {
                action,
                hand: hand.to_string(),
            })?;

            if requested != entry.hand {
                return Err(SequenceError::HandMismatch {
                    action,
                    note: note.to_string(),
                    configured: entry.hand.to_string(),
                    requested: requested.to_string(),
                });
            }
            (Some(requested), Some(entry.episode.clone()))
        };

        let tempo = self.config.tempo();
        let duration_seconds =
            tempo
                .seconds(duration)
                .ok_or_else(|| SequenceError::UnknownDuration {
                    action,
                    duration: duration.to_string(),
                    available: tempo.available_keys(),
                })?;

        Ok(NoteAction {
            note: if episode.is_none() {
                REST.to_string()
            } else {
                note.to_string()
            },
            hand,
            duration: duration.to_string(),
            duration_seconds,
            episode,
        })
    }
}

/// Compile `text` against `config`, checking episode presence in `store`.
///
/// # Example
/// ```rust
/// use jointplay::{compile, Episode, Hand, InstrumentConfig, JointSubset, MemoryEpisodeStore};
///
/// let episode = Episode::new(vec![0.0], vec![vec![0.0]], None, JointSubset::all(1)).unwrap();
/// let store = MemoryEpisodeStore::new().with("a.json", episode);
/// let config = InstrumentConfig::new("bells").with_note("A", Hand::Left, "a.json", true);
///
/// let program = compile("A:left:quarter -> rest:none:half", &config, &store).unwrap();
/// assert_eq!(program.len(), 2);
/// assert_eq!(program.total_seconds(1.0), 1.5);
/// ```
pub fn compile(
    text: &str,
    config: &InstrumentConfig,
    store: &dyn EpisodeStore,
) -> Result<SequenceProgram, SequenceError> {
    SequenceParser::new(config, store).parse(text)
}
