//! # Episode Module
//!
//! Recorded joint trajectories and the stores that hold them.
//!
//! ## Purpose
//! An episode is an ordered sequence of timestamped frames. Each frame is a full
//! pose (one angle per joint of the actuator layout) with optional velocities.
//! Only the joints in the episode's [`JointSubset`] are ever commanded during
//! replay; the other entries ride along so the pose can be compared against the
//! actuator's full state.
//!
//! ## Invariants
//! Enforced by [`Episode::new`] and by every trim operation:
//! - at least one frame
//! - one position vector (and velocity vector, if present) per timestamp
//! - every vector has the same joint count, and all values are finite
//! - timestamps never decrease
//! - the first timestamp is 0 (timestamps are shifted on construction)
//! - the joint subset is duplicate-free and addresses existing joints
//!
//! Episodes are immutable once built. Playback shares them between threads as
//! `Arc<Episode>`.
//!
//! ## Sub-modules
//! - `store` - [`EpisodeStore`] trait, JSON file store, in-memory store
//!
//! ## Example
//! ```rust
//! use jointplay::{Episode, JointSubset};
//!
//! let episode = Episode::new(
//!     vec![1.0, 1.5, 2.0],
//!     vec![vec![0.0, 0.0], vec![0.5, 1.0], vec![1.0, 2.0]],
//!     None,
//!     JointSubset::new(vec![1]).unwrap(),
//! )
//! .unwrap();
//!
//! assert_eq!(episode.timestamps(), &[0.0, 0.5, 1.0]);
//! assert_eq!(episode.duration(), 1.0);
//! assert_eq!(episode.last_pose(), &[1.0, 2.0]);
//! ```

mod store;


pub use store::{EpisodeStore, JsonEpisodeStore, MemoryEpisodeStore};

use serde::{Deserialize, Serialize};

use crate::error::EpisodeError;
use crate::joints::JointSubset;

/// Descriptive data stored alongside the frames.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeMetadata {
    pub episode_id: String,
    pub description: Option<String>,
    /// Named group the episode was recorded for, when it was recorded by group.
    pub joint_group: Option<String>,
    /// Average sampling frequency in Hz (frames / duration, 0 for a single frame).
    pub frequency: f64,
    /// Seconds from the first to the last frame.
    pub duration: f64,
}

/// A recorded, immutable joint trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    timestamps: Vec<f64>,
    positions: Vec<Vec<f64>>,
    velocities: Option<Vec<Vec<f64>>>,
    joints: JointSubset,
    metadata: EpisodeMetadata,
}

impl Episode {
    /// Build an episode, validating its invariants and shifting timestamps so
    /// the first frame sits at time 0.
    pub fn new(
        timestamps: Vec<f64>,
        positions: Vec<Vec<f64>>,
        velocities: Option<Vec<Vec<f64>>>,
        joints: JointSubset,
    ) -> Result<Self, EpisodeError> {
        Self::build(timestamps, positions, velocities, joints, None, None, None)
    }

    fn build(
        mut timestamps: Vec<f64>,
        positions: Vec<Vec<f64>>,
        velocities: Option<Vec<Vec<f64>>>,
        joints: JointSubset,
        episode_id: Option<String>,
        description: Option<String>,
        joint_group: Option<String>,
    ) -> Result<Self, EpisodeError> {
        if timestamps.is_empty() {
            return Err(EpisodeError::Empty);
        }
        if positions.len() != timestamps.len() {
            return Err(EpisodeError::FrameCountMismatch {
                timestamps: timestamps.len(),
                positions: positions.len(),
            });
        }

        let joint_count = positions[0].len();
        validate_vectors(&positions, joint_count)?;

        if let Some(velocities) = &velocities {
            if velocities.len() != timestamps.len() {
                return Err(EpisodeError::VelocityCountMismatch {
                    timestamps: timestamps.len(),
                    velocities: velocities.len(),
                });
            }
            validate_vectors(velocities, joint_count)?;
        }

        if let Some(frame) = timestamps.iter().position(|t| !t.is_finite()) {
            return Err(EpisodeError::NonFinite { frame });
        }
        for (frame, pair) in timestamps.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(EpisodeError::DecreasingTimestamp {
                    frame: frame + 1,
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }

        joints.check_range(joint_count)?;

        let origin = timestamps[0];
        if origin != 0.0 {
            for t in timestamps.iter_mut() {
                *t -= origin;
            }
        }

        let duration = timestamps[timestamps.len() - 1];
        let frequency = if duration > 0.0 {
            timestamps.len() as f64 / duration
        } else {
            0.0
        };

        Ok(Self {
            timestamps,
            positions,
            velocities,
            joints,
            metadata: EpisodeMetadata {
                episode_id: episode_id.unwrap_or_else(|| "episode".to_string()),
                description,
                joint_group,
                frequency,
                duration,
            },
        })
    }

    pub fn with_id(mut self, episode_id: impl Into<String>) -> Self {
        self.metadata.episode_id = episode_id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn positions(&self) -> &[Vec<f64>] {
        &self.positions
    }

    pub fn velocities(&self) -> Option<&[Vec<f64>]> {
        self.velocities.as_deref()
    }

    pub fn joints(&self) -> &JointSubset {
        &self.joints
    }

    pub fn metadata(&self) -> &EpisodeMetadata {
        &self.metadata
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Always false; an episode has at least one frame.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Width of each pose vector.
    pub fn joint_count(&self) -> usize {
        self.positions[0].len()
    }

    pub fn duration(&self) -> f64 {
        self.metadata.duration
    }

    pub fn first_pose(&self) -> &[f64] {
        &self.positions[0]
    }

    /// The terminal pose, used as the target of init/final position moves.
    pub fn last_pose(&self) -> &[f64] {
        &self.positions[self.positions.len() - 1]
    }

    /// Drop `frames` frames from the start and renormalise timestamps.
    pub fn trim_start(&self, frames: usize) -> Result<Episode, EpisodeError> {
        self.check_trim_count(frames)?;
        self.slice(frames, self.len())
    }

    /// Drop `frames` frames from the end.
    pub fn trim_end(&self, frames: usize) -> Result<Episode, EpisodeError> {
        self.check_trim_count(frames)?;
        self.slice(0, self.len() - frames)
    }

    /// Keep the frames with `start <= t < end` (either bound optional) and
    /// renormalise timestamps.
    pub fn trim_time_range(
        &self,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<Episode, EpisodeError> {
        let start_idx = start.map_or(0, |s| self.timestamps.partition_point(|&t| t < s));
        let end_idx = end.map_or(self.len(), |e| self.timestamps.partition_point(|&t| t < e));
        if start_idx >= end_idx {
            return Err(EpisodeError::InvalidTrim(
                "start must be before end and keep at least one frame".to_string(),
            ));
        }
        self.slice(start_idx, end_idx)
    }

    fn check_trim_count(&self, frames: usize) -> Result<(), EpisodeError> {
        if frames == 0 {
            return Err(EpisodeError::InvalidTrim("frame count must be positive".to_string()));
        }
        if frames >= self.len() {
            return Err(EpisodeError::InvalidTrim(format!(
                "cannot trim {} frames from {} total frames",
                frames,
                self.len()
            )));
        }
        Ok(())
    }

    fn slice(&self, start: usize, end: usize) -> Result<Episode, EpisodeError> {
        Self::build(
            self.timestamps[start..end].to_vec(),
            self.positions[start..end].to_vec(),
            self.velocities.as_ref().map(|v| v[start..end].to_vec()),
            self.joints.clone(),
            Some(self.metadata.episode_id.clone()),
            self.metadata.description.clone(),
            self.metadata.joint_group.clone(),
        )
    }
}

fn validate_vectors(vectors: &[Vec<f64>], joint_count: usize) -> Result<(), EpisodeError> {
    for (frame, vector) in vectors.iter().enumerate() {
        if vector.len() != joint_count {
            return Err(EpisodeError::RaggedFrame {
                frame,
                expected: joint_count,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(EpisodeError::NonFinite { frame });
        }
    }
    Ok(())
}

/// On-disk episode layout.
///
/// `frequency` and `duration` are written for readers of the file but are
/// recomputed from the frames on load.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct RawEpisode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_indices: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub timestamps: Vec<f64>,
    pub joint_positions: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_velocities: Option<Vec<Vec<f64>>>,
}

impl TryFrom<RawEpisode> for Episode {
    type Error = EpisodeError;

    fn try_from(raw: RawEpisode) -> Result<Self, Self::Error> {
        // Explicit indices win; otherwise fall back to the named group, then to every joint.
        let joints = match (raw.joint_indices, &raw.joint_group) {
            (Some(indices), _) => JointSubset::new(indices)?,
            (None, Some(group)) => JointSubset::group(group)?,
            (None, None) => JointSubset::all(raw.joint_positions.first().map_or(0, Vec::len)),
        };
        Self::build(
            raw.timestamps,
            raw.joint_positions,
            raw.joint_velocities,
            joints,
            raw.episode_id,
            raw.description,
            raw.joint_group,
        )
    }
}

impl From<&Episode> for RawEpisode {
    fn from(episode: &Episode) -> Self {
        Self {
            episode_id: Some(episode.metadata.episode_id.clone()),
            description: episode.metadata.description.clone(),
            joint_group: episode.metadata.joint_group.clone(),
            joint_indices: Some(episode.joints.indices().to_vec()),
            frequency: Some(episode.metadata.frequency),
            duration: Some(episode.metadata.duration),
            timestamps: episode.timestamps.clone(),
            joint_positions: episode.positions.clone(),
            joint_velocities: episode.velocities.clone(),
        }
    }
}
