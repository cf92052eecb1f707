//! Song files
//!
//! A song file is sequence text spread over lines, one phrase per line:
//! ```text
//! # Twinkle, first phrase
//! C1:left:quarter -> C1:left:quarter -> G1:right:quarter -> G1:right:quarter
//!
//! A1:right:quarter -> A1:right:quarter -> G1:right:half
//! ```
//! Lines starting with `#` and blank lines are ignored; the remaining lines are
//! joined with `->`.

use std::fs;
use std::io;
use std::path::Path;

use super::parser::SEQUENTIAL_SEPARATOR;

/// Join the phrases of a song file into one sequence.
pub fn join_song_lines(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join(&format!(" {} ", SEQUENTIAL_SEPARATOR))
}

pub fn read_song_file(path: &Path) -> io::Result<String> {
    let content = fs::read_to_string(path)?;
    log::info!("Loaded song from: {}", path.display());
    Ok(join_song_lines(&content))
}
