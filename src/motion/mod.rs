//! # Motion Module
//!
//! Faithful replay of recorded episodes on an actuator.
//!
//! ## Purpose
//! Everything that turns an [`Episode`](crate::Episode) into a stream of pose
//! commands:
//! 1. **Sampling** - the interpolated pose at any playback time
//! 2. **Transitions** - cosine-eased moves between two static poses
//! 3. **Control loop** - a fixed-rate state machine with pause, resume and cancel
//!
//! ## Sub-modules
//! - `sampler` - [`TrajectorySampler`], binary search plus linear interpolation
//! - `transition` - [`pose_at`] and [`TransitionPlanner`]
//! - `controller` - [`PlaybackController`], [`PlaybackTimeline`], run reports
//! - `actuator` - the [`Actuator`] command sink and [`SimulatedActuator`]
//! - `clock` - [`Clock`] with the wall clock and a [`ManualClock`] for tests
//!
//! ## Timing
//! The control loop ticks at `tick-rate-hz` (500 Hz by default) no matter how
//! fast the episode was recorded; interpolation fills in the poses between
//! frames. Each tick computes
//!
//! ```text
//! playback_time = (now - start - accumulated_pause) * speed
//! ```
//!
//! so a pause shifts the rest of the recording instead of skipping it.
//!
//! ## Example
//! ```rust
//! use jointplay::{pose_at, Episode, JointSubset, Sample, TrajectorySampler};
//!
//! let start = [0.0, 0.0];
//! let target = [1.0, -1.0];
//! assert_eq!(pose_at(0.0, 2.0, &start, &target), start.to_vec());
//! let halfway = pose_at(1.0, 2.0, &start, &target);
//! assert!((halfway[0] - 0.5).abs() < 1e-12);
//! assert_eq!(pose_at(2.0, 2.0, &start, &target), target.to_vec());
//!
//! let episode = Episode::new(
//!     vec![0.0, 0.5, 1.0],
//!     vec![vec![0.0], vec![4.0], vec![2.0]],
//!     None,
//!     JointSubset::all(1),
//! )
//! .unwrap();
//! let sampler = TrajectorySampler::new(&episode);
//! assert_eq!(sampler.sample(0.5), Sample::Pose(vec![4.0]));
//! assert_eq!(sampler.sample(0.75), Sample::Pose(vec![3.0]));
//! ```

mod actuator;
mod clock;
mod controller;
mod sampler;
mod transition;


pub use actuator::{Actuator, JointState, SerializedActuator, SimulatedActuator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    Outcome, Phase, PlaybackController, PlaybackOptions, PlaybackTimeline, RunReport,
};
pub use sampler::{Sample, TrajectorySampler};
pub use transition::{pose_at, smooth_ratio, TransitionPlanner};
