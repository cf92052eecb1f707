//! # Pre-flight Check
//!
//! Batch validation of a compiled program before anything moves.
//!
//! Unlike compilation, which stops at the first error, the pre-flight check
//! walks the whole program and reports every problem it finds in one
//! [`PreflightError`]:
//! - a note's episode is missing from the store or cannot be loaded
//! - a note is not marked as recorded
//! - the init/final position episode is missing or unloadable
//! - two notes of one chord would drive a shared joint
//!
//! On success the loaded episodes come back as an [`EpisodeCache`], shared
//! read-only (`Arc<Episode>`) between the chord tasks that replay them.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::InstrumentConfig;
use crate::episode::{Episode, EpisodeStore};
use crate::error::{PreflightError, PreflightIssue};
use crate::sequence::SequenceProgram;

/// Episodes loaded for one song, keyed by store path.
#[derive(Debug, Clone, Default)]
pub struct EpisodeCache {
    episodes: HashMap<PathBuf, Arc<Episode>>,
}

impl EpisodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, episode: Arc<Episode>) {
        self.episodes.insert(path.into(), episode);
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<Episode>> {
        self.episodes.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.episodes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

/// Pre-flight checker for one instrument and store.
pub struct Preflight<'a> {
    config: &'a InstrumentConfig,
    store: &'a dyn EpisodeStore,
}

impl<'a> Preflight<'a> {
    pub fn new(config: &'a InstrumentConfig, store: &'a dyn EpisodeStore) -> Self {
        Self { config, store }
    }

    /// Check `program`, plus the init and final position episodes when
    /// `with_init` / `with_final` are set and the configuration names them.
    pub fn check(
        &self,
        program: &SequenceProgram,
        with_init: bool,
        with_final: bool,
    ) -> Result<EpisodeCache, PreflightError> {
        let mut issues = Vec::new();
        let mut cache = EpisodeCache::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for (i, chord) in program.chords().iter().enumerate() {
            let action = i + 1;
            for note in chord.playable() {
                if !seen.insert(note.note.as_str()) {
                    continue;
                }
                let Some(path) = note.episode.as_deref() else {
                    continue;
                };

                if let Some(entry) = self.config.note(&note.note) {
                    if !entry.recorded {
                        issues.push(PreflightIssue::NotRecorded {
                            action,
                            note: note.note.clone(),
                        });
                    }
                }
                if !self.store.contains(path) {
                    issues.push(PreflightIssue::EpisodeMissing {
                        action,
                        note: note.note.clone(),
                        path: path.to_path_buf(),
                    });
                    continue;
                }
                self.load(path, &mut cache, &mut issues);
            }
        }

        for (i, chord) in program.chords().iter().enumerate() {
            let loaded: Vec<(&str, &Arc<Episode>)> = chord
                .playable()
                .filter_map(|n| {
                    let episode = cache.get(n.episode.as_deref()?)?;
                    Some((n.note.as_str(), episode))
                })
                .collect();
            for (a, (first, first_episode)) in loaded.iter().enumerate() {
                for (second, second_episode) in &loaded[a + 1..] {
                    if let Some(joint) = first_episode.joints().first_overlap(second_episode.joints()) {
                        issues.push(PreflightIssue::OverlappingJoints {
                            action: i + 1,
                            first: first.to_string(),
                            second: second.to_string(),
                            joint,
                        });
                    }
                }
            }
        }

        let positions = [
            ("init", with_init, &self.config.init_position_episode),
            ("final", with_final, &self.config.final_position_episode),
        ];
        for (role, wanted, path) in positions {
            let Some(path) = path.as_deref().filter(|_| wanted) else {
                continue;
            };
            if !self.store.contains(path) {
                issues.push(PreflightIssue::PositionMissing {
                    role: role.to_string(),
                    path: path.to_path_buf(),
                });
                continue;
            }
            self.load(path, &mut cache, &mut issues);
        }

        if issues.is_empty() {
            log::info!("Pre-flight check passed ({} episodes loaded)", cache.len());
            Ok(cache)
        } else {
            for issue in &issues {
                log::warn!("Pre-flight: {}", issue);
            }
            Err(PreflightError { issues })
        }
    }

    fn load(&self, path: &Path, cache: &mut EpisodeCache, issues: &mut Vec<PreflightIssue>) {
        if cache.contains(path) {
            return;
        }
        match self.store.load(path) {
            Ok(episode) => cache.insert(path, Arc::new(episode)),
            Err(e) => issues.push(PreflightIssue::Unloadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}
