//! Episode stores.
//!
//! The playback core only needs three things from persistence: does an episode
//! exist, load it, save it. File format and compression belong to the store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Episode, RawEpisode};
use crate::error::EpisodeError;

/// Where episodes live.
///
/// Stores are shared between the compiler (existence checks), the pre-flight
/// check and playback, so they must be usable from several threads.
pub trait EpisodeStore: Send + Sync {
    fn contains(&self, path: &Path) -> bool;

    fn load(&self, path: &Path) -> Result<Episode, EpisodeError>;

    /// Persist `episode` at `path`, returning the path it was written to.
    fn save(&self, episode: &Episode, path: &Path) -> Result<PathBuf, EpisodeError>;
}

/// Episodes as pretty-printed JSON files, resolved relative to a root directory.
#[derive(Debug, Clone)]
pub struct JsonEpisodeStore {
    root: PathBuf,
}

impl JsonEpisodeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl EpisodeStore for JsonEpisodeStore {
    fn contains(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn load(&self, path: &Path) -> Result<Episode, EpisodeError> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(EpisodeError::NotFound(full));
        }
        let content = fs::read_to_string(&full)?;
        let raw: RawEpisode = serde_json::from_str(&content)?;
        let episode = Episode::try_from(raw)?;
        log::debug!(
            "Loaded episode {} ({} frames, {:.2}s, {} joints)",
            full.display(),
            episode.len(),
            episode.duration(),
            episode.joints().len()
        );
        Ok(episode)
    }

    fn save(&self, episode: &Episode, path: &Path) -> Result<PathBuf, EpisodeError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&RawEpisode::from(episode))?;
        fs::write(&full, json)?;
        log::info!(
            "Episode saved: {} ({} frames, {:.2}s, {:.1}Hz)",
            full.display(),
            episode.len(),
            episode.duration(),
            episode.metadata().frequency
        );
        Ok(full)
    }
}

/// Episodes held in memory, keyed by path. Used by the simulator and tests.
#[derive(Debug, Default)]
pub struct MemoryEpisodeStore {
    episodes: RwLock<HashMap<PathBuf, Arc<Episode>>>,
}

impl MemoryEpisodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(self, path: impl Into<PathBuf>, episode: Episode) -> Self {
        self.insert(path, episode);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<PathBuf, Arc<Episode>>> {
        self.episodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PathBuf, Arc<Episode>>> {
        self.episodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, path: impl Into<PathBuf>, episode: Episode) {
        self.write().insert(path.into(), Arc::new(episode));
    }

    pub fn remove(&self, path: &Path) -> Option<Arc<Episode>> {
        self.write().remove(path)
    }
}

impl EpisodeStore for MemoryEpisodeStore {
    fn contains(&self, path: &Path) -> bool {
        self.read().contains_key(path)
    }

    fn load(&self, path: &Path) -> Result<Episode, EpisodeError> {
        self.read()
            .get(path)
            .map(|e| Episode::clone(e))
            .ok_or_else(|| EpisodeError::NotFound(path.to_path_buf()))
    }

    fn save(&self, episode: &Episode, path: &Path) -> Result<PathBuf, EpisodeError> {
        self.insert(path, episode.clone());
        Ok(path.to_path_buf())
    }
}
