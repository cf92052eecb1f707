//! # Joint Subsets
//!
//! Every episode and note controls a fixed, ordered set of actuator indices.
//! Two subsets used at the same time inside one chord must be disjoint; that is
//! what lets several playback tasks write through one command sink without
//! stepping on each other.
//!
//! ## Joint Layout
//! The default layout has 29 joints:
//! ```text
//!  0-5   left leg     (hip pitch/roll/yaw, knee, ankle pitch/roll)
//!  6-11  right leg
//! 12-14  waist        (yaw, roll, pitch)
//! 15-21  left arm     (shoulder pitch/roll/yaw, elbow, wrist roll/pitch/yaw)
//! 22-28  right arm
//! ```
//!
//! Named groups: `legs`, `waist`, `arms`, `left-arm`, `right-arm`, `all`.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EpisodeError;

/// Number of joints in the default actuator layout.
pub const JOINT_COUNT: usize = 29;

/// Human-readable joint names, indexed by joint number.
pub const JOINT_NAMES: [&str; JOINT_COUNT] = [
    "left_hip_pitch",
    "left_hip_roll",
    "left_hip_yaw",
    "left_knee",
    "left_ankle_pitch",
    "left_ankle_roll",
    "right_hip_pitch",
    "right_hip_roll",
    "right_hip_yaw",
    "right_knee",
    "right_ankle_pitch",
    "right_ankle_roll",
    "waist_yaw",
    "waist_roll",
    "waist_pitch",
    "left_shoulder_pitch",
    "left_shoulder_roll",
    "left_shoulder_yaw",
    "left_elbow",
    "left_wrist_roll",
    "left_wrist_pitch",
    "left_wrist_yaw",
    "right_shoulder_pitch",
    "right_shoulder_roll",
    "right_shoulder_yaw",
    "right_elbow",
    "right_wrist_roll",
    "right_wrist_pitch",
    "right_wrist_yaw",
];

/// An ordered, duplicate-free list of joint indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct JointSubset(Vec<usize>);

impl JointSubset {
    /// Build a subset, rejecting duplicate indices.
    pub fn new(indices: Vec<usize>) -> Result<Self, EpisodeError> {
        let mut seen = HashSet::with_capacity(indices.len());
        for &index in &indices {
            if !seen.insert(index) {
                return Err(EpisodeError::DuplicateJoint { index });
            }
        }
        Ok(Self(indices))
    }

    /// Every joint of a `joints`-wide pose.
    pub fn all(joints: usize) -> Self {
        Self((0..joints).collect())
    }

    /// Look up a named group of the default layout.
    ///
    /// ```
    /// use jointplay::JointSubset;
    ///
    /// let left = JointSubset::group("left-arm").unwrap();
    /// assert_eq!(left.indices(), &[15, 16, 17, 18, 19, 20, 21]);
    /// assert!(left.is_disjoint(&JointSubset::group("right-arm").unwrap()));
    /// ```
    pub fn group(name: &str) -> Result<Self, EpisodeError> {
        let range = match name.trim().to_lowercase().replace('_', "-").as_str() {
            "legs" => 0..12,
            "waist" => 12..15,
            "arms" => 15..29,
            "left-arm" => 15..22,
            "right-arm" => 22..29,
            "all" => 0..JOINT_COUNT,
            _ => return Err(EpisodeError::UnknownJointGroup(name.to_string())),
        };
        Ok(Self(range.collect()))
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    /// First joint index present in both subsets, in `self`'s order.
    pub fn first_overlap(&self, other: &JointSubset) -> Option<usize> {
        self.0.iter().copied().find(|i| other.contains(*i))
    }

    pub fn is_disjoint(&self, other: &JointSubset) -> bool {
        self.first_overlap(other).is_none()
    }

    /// Check every index addresses a joint of a `joints`-wide pose.
    pub fn check_range(&self, joints: usize) -> Result<(), EpisodeError> {
        match self.0.iter().find(|&&i| i >= joints) {
            Some(&index) => Err(EpisodeError::JointOutOfRange { index, joints }),
            None => Ok(()),
        }
    }
}

impl TryFrom<Vec<usize>> for JointSubset {
    type Error = EpisodeError;

    fn try_from(indices: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(indices)
    }
}

impl From<JointSubset> for Vec<usize> {
    fn from(subset: JointSubset) -> Self {
        subset.0
    }
}

impl fmt::Display for JointSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
