//! Time-indexed pose lookup over an episode

use crate::episode::Episode;

/// Result of sampling an episode at a playback time.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Pose(Vec<f64>),
    /// The time lies past the last frame; playback is over.
    Finished,
}

/// Linear interpolation between the frames bracketing a playback time.
///
/// ```
/// use jointplay::{Episode, JointSubset, Sample, TrajectorySampler};
///
/// let episode = Episode::new(
///     vec![0.0, 1.0],
///     vec![vec![0.0, 10.0], vec![2.0, 20.0]],
///     None,
///     JointSubset::all(2),
/// )
/// .unwrap();
/// let sampler = TrajectorySampler::new(&episode);
///
/// assert_eq!(sampler.sample(0.5), Sample::Pose(vec![1.0, 15.0]));
/// assert_eq!(sampler.sample(1.5), Sample::Finished);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TrajectorySampler<'a> {
    episode: &'a Episode,
}

impl<'a> TrajectorySampler<'a> {
    pub fn new(episode: &'a Episode) -> Self {
        Self { episode }
    }

    pub fn sample(&self, time: f64) -> Sample {
        let timestamps = self.episode.timestamps();
        let positions = self.episode.positions();
        let last = timestamps[timestamps.len() - 1];

        // NaN falls through to the first frame as well
        if !(time > timestamps[0]) {
            return Sample::Pose(positions[0].clone());
        }
        if time > last {
            return Sample::Finished;
        }

        // first index with timestamp >= time; always in 1..len here
        let idx = timestamps.partition_point(|&t| t < time);
        if timestamps[idx] == time {
            return Sample::Pose(positions[idx].clone());
        }

        let (t0, t1) = (timestamps[idx - 1], timestamps[idx]);
        let alpha = if t1 > t0 { (time - t0) / (t1 - t0) } else { 0.0 };
        let pose = positions[idx - 1]
            .iter()
            .zip(&positions[idx])
            .map(|(p0, p1)| p0 + alpha * (p1 - p0))
            .collect();
        Sample::Pose(pose)
    }

    /// Playback length in episode time.
    pub fn duration(&self) -> f64 {
        self.episode.duration()
    }
}
