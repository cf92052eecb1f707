//! # Sequence Module
//!
//! Compiles note-sequence text into a [`SequenceProgram`] of chords.
//!
//! ## Grammar
//! ```text
//! sequence  := group ( "->" group )*
//! group     := note-spec ( ";" note-spec )*
//! note-spec := noteId ":" hand ":" durationKey
//! ```
//! - `->` separates chords played one after another
//! - `;` separates notes played together
//! - `rest` as the note id is a pause (hand conventionally `none`)
//! - whitespace around tokens is insignificant
//!
//! ## Validation
//! Each rule has its own [`SequenceError`](crate::SequenceError) variant:
//! 1. not exactly three fields → `Format`
//! 2. note id not configured → `UnknownNote`
//! 3. episode not recorded or not in the store → `MissingEpisode`
//! 4. hand not `left`/`right` → `InvalidHand`
//! 5. hand differs from the configured hand → `HandMismatch`
//! 6. duration key not in the tempo table → `UnknownDuration`
//! 7. two non-rest notes for the same hand in one group → `HandCollision`
//!
//! Compilation is all-or-nothing. A chord whose notes have different durations
//! compiles, with a [`CompileWarning`].
//!
//! ## Sub-modules
//! - `types` - Hand, NoteAction, ChordAction, SequenceProgram
//! - `parser` - the compiler
//! - `song_file` - multi-line song files
//!
//! ## Example
//! ```rust
//! use jointplay::{compile, Episode, Hand, InstrumentConfig, JointSubset, MemoryEpisodeStore};
//!
//! let episode = Episode::new(vec![0.0], vec![vec![0.0]], None, JointSubset::all(1)).unwrap();
//! let store = MemoryEpisodeStore::new()
//!     .with("c.json", episode.clone())
//!     .with("d.json", episode);
//! let config = InstrumentConfig::new("bells")
//!     .with_note("C", Hand::Left, "c.json", true)
//!     .with_note("D", Hand::Right, "d.json", true);
//!
//! let program = compile("C:left:quarter;D:right:half", &config, &store).unwrap();
//! assert_eq!(program.chords()[0].duration_seconds(), 1.0);
//! assert_eq!(program.chords()[0].describe(), "chord [C:left, D:right] (half)");
//! ```

mod parser;
mod song_file;
mod types;


pub use parser::{compile, SequenceParser, REST, SEQUENTIAL_SEPARATOR, SIMULTANEOUS_SEPARATOR};
pub use song_file::{join_song_lines, read_song_file};
pub use types::{ChordAction, CompileWarning, Hand, NoteAction, PreviewRow, SequenceProgram};
