//! Eased moves between two static poses

use std::f64::consts::PI;

/// Cosine ease: 0 at the start, 1 at the end, zero slope at both ends.
pub fn smooth_ratio(elapsed: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 1.0;
    }
    let ratio = (elapsed / duration).clamp(0.0, 1.0);
    (1.0 - (ratio * PI).cos()) / 2.0
}

/// Pose `elapsed` seconds into an eased move from `start` to `target`.
///
/// The endpoints are returned verbatim, so the final command of a move is
/// exactly `target`.
pub fn pose_at(elapsed: f64, duration: f64, start: &[f64], target: &[f64]) -> Vec<f64> {
    if elapsed >= duration {
        return target.to_vec();
    }
    if !(elapsed > 0.0) {
        return start.to_vec();
    }
    let smooth = smooth_ratio(elapsed, duration);
    start
        .iter()
        .zip(target)
        .map(|(s, g)| s + smooth * (g - s))
        .collect()
}

/// A planned move between two poses.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlanner {
    start: Vec<f64>,
    target: Vec<f64>,
    duration: f64,
}

impl TransitionPlanner {
    pub fn new(start: Vec<f64>, target: Vec<f64>, duration: f64) -> Self {
        Self {
            start,
            target,
            duration: duration.max(0.0),
        }
    }

    pub fn pose_at(&self, elapsed: f64) -> Vec<f64> {
        pose_at(elapsed, self.duration, &self.start, &self.target)
    }

    pub fn is_complete(&self, elapsed: f64) -> bool {
        elapsed >= self.duration
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}
