//! Per-run playback state machine
//!
//! `Idle -> Transitioning -> Playing <-> Paused -> Completed`, with `Cancelled`
//! reachable from every non-terminal phase.

use std::time::Duration;

use super::actuator::Actuator;
use super::sampler::{Sample, TrajectorySampler};
use super::transition::pose_at;
use crate::episode::Episode;
use crate::error::PlaybackError;
use crate::joints::JointSubset;
use crate::session::ControlLease;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Transitioning,
    Playing,
    Paused,
    Completed,
    Cancelled,
}

/// How a run ended. A cancel is a normal ending, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The last command was the episode's final frame (or the target pose).
    Completed,
    /// Stopped early; the last command may be anywhere along the path.
    Cancelled,
}

/// Elapsed-time accounting with pause support.
///
/// Pausing freezes the clock; resuming adds the paused interval to the
/// accumulated pause so playback time continues where it stopped.
///
/// ```
/// use std::time::Duration;
/// use jointplay::PlaybackTimeline;
///
/// let secs = Duration::from_secs;
/// let mut timeline = PlaybackTimeline::new(secs(10), 1.0);
/// timeline.pause(secs(12));
/// assert_eq!(timeline.playback_time(secs(15)), 2.0);
/// timeline.resume(secs(17));
/// assert_eq!(timeline.playback_time(secs(18)), 3.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackTimeline {
    start: Duration,
    accumulated_pause: Duration,
    paused_at: Option<Duration>,
    speed: f64,
}

impl PlaybackTimeline {
    pub fn new(start: Duration, speed: f64) -> Self {
        Self {
            start,
            accumulated_pause: Duration::ZERO,
            paused_at: None,
            speed,
        }
    }

    pub fn pause(&mut self, now: Duration) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: Duration) {
        if let Some(at) = self.paused_at.take() {
            self.accumulated_pause += now.saturating_sub(at);
        }
    }

    /// Apply a pause flag; returns true when the state changed.
    pub fn set_paused(&mut self, paused: bool, now: Duration) -> bool {
        match (paused, self.is_paused()) {
            (true, false) => {
                self.pause(now);
                true
            }
            (false, true) => {
                self.resume(now);
                true
            }
            _ => false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Total paused time up to `now`, including a pause still in progress.
    pub fn paused_time(&self, now: Duration) -> Duration {
        let current = self
            .paused_at
            .map_or(Duration::ZERO, |at| now.saturating_sub(at));
        self.accumulated_pause + current
    }

    /// `(now - start - accumulated_pause) * speed`, frozen while paused.
    pub fn playback_time(&self, now: Duration) -> f64 {
        let now = self.paused_at.unwrap_or(now);
        now.saturating_sub(self.start)
            .saturating_sub(self.accumulated_pause)
            .as_secs_f64()
            * self.speed
    }
}

/// Per-run knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackOptions {
    /// Episode time per wall-clock second; clamped to the settings' band.
    pub speed: f64,
    /// Length of the eased move to the starting pose.
    pub transition_seconds: f64,
    /// Start playing from wherever the actuator is.
    pub skip_transition: bool,
}

impl PlaybackOptions {
    pub fn new(speed: f64, transition_seconds: f64) -> Self {
        Self {
            speed,
            transition_seconds,
            skip_transition: false,
        }
    }

    pub fn skip_transition(mut self, skip: bool) -> Self {
        self.skip_transition = skip;
        self
    }
}

/// What one run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: Outcome,
    /// Commands sent, including the post-cancel hold.
    pub commands: u64,
    pub last_pose: Option<Vec<f64>>,
    /// Episode time reached, 0 for pose moves.
    pub playback_seconds: f64,
    pub paused_seconds: f64,
}

#[derive(Debug, Clone, Copy)]
enum Plan<'a> {
    Episode(&'a Episode),
    Pose {
        target: &'a [f64],
        joints: &'a JointSubset,
    },
}

impl<'a> Plan<'a> {
    fn joints(&self) -> &'a JointSubset {
        match *self {
            Plan::Episode(episode) => episode.joints(),
            Plan::Pose { joints, .. } => joints,
        }
    }

    fn width(&self) -> usize {
        match *self {
            Plan::Episode(episode) => episode.joint_count(),
            Plan::Pose { target, .. } => target.len(),
        }
    }

    fn start_pose(&self) -> &'a [f64] {
        match *self {
            Plan::Episode(episode) => episode.first_pose(),
            Plan::Pose { target, .. } => target,
        }
    }
}

enum Step {
    Send(Vec<f64>),
    /// Send this pose, then stop.
    Finish(Vec<f64>),
}

/// Drives one episode (or one eased pose move) at the control tick rate.
///
/// ```
/// use std::sync::Arc;
/// use jointplay::{
///     Episode, JointSubset, ManualClock, Outcome, PlaybackController, PlaybackOptions,
///     PlaybackSettings, Session, SimulatedActuator,
/// };
///
/// let actuator = Arc::new(SimulatedActuator::zeroed(2));
/// let (session, _handle) = Session::new(
///     actuator.clone(),
///     Arc::new(ManualClock::new()),
///     PlaybackSettings::default(),
/// )
/// .unwrap();
/// let episode = Episode::new(
///     vec![0.0, 0.5],
///     vec![vec![1.0, 0.0], vec![2.0, 0.0]],
///     None,
///     JointSubset::new(vec![0]).unwrap(),
/// )
/// .unwrap();
///
/// let lease = session.claim().unwrap();
/// let report = PlaybackController::new(&lease, &episode, PlaybackOptions::new(1.0, 1.0))
///     .run()
///     .unwrap();
///
/// assert_eq!(report.outcome, Outcome::Completed);
/// assert_eq!(actuator.positions(), vec![2.0, 0.0]);
/// ```
pub struct PlaybackController<'a> {
    lease: &'a ControlLease<'a>,
    sink: &'a dyn Actuator,
    plan: Plan<'a>,
    options: PlaybackOptions,
    phase: Phase,
    last_sent: Option<Vec<f64>>,
    commands: u64,
    playback_seconds: f64,
    paused: Duration,
}

impl<'a> PlaybackController<'a> {
    /// Replay `episode`: an eased move to its first frame, then the recording.
    pub fn new(lease: &'a ControlLease<'a>, episode: &'a Episode, options: PlaybackOptions) -> Self {
        Self::with_plan(lease, Plan::Episode(episode), options)
    }

    /// An eased move of `joints` to `target`, with no recorded trajectory.
    pub fn to_pose(
        lease: &'a ControlLease<'a>,
        target: &'a [f64],
        joints: &'a JointSubset,
        options: PlaybackOptions,
    ) -> Self {
        Self::with_plan(lease, Plan::Pose { target, joints }, options)
    }

    fn with_plan(lease: &'a ControlLease<'a>, plan: Plan<'a>, options: PlaybackOptions) -> Self {
        Self {
            lease,
            sink: lease.actuator(),
            plan,
            options,
            phase: Phase::Idle,
            last_sent: None,
            commands: 0,
            playback_seconds: 0.0,
            paused: Duration::ZERO,
        }
    }

    /// Route commands through `sink` instead of the session's actuator.
    pub fn with_sink(mut self, sink: &'a dyn Actuator) -> Self {
        self.sink = sink;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run to completion or cancellation.
    ///
    /// Fails before any motion when the actuator has no state or its width
    /// differs from the plan's.
    pub fn run(&mut self) -> Result<RunReport, PlaybackError> {
        let state = self
            .sink
            .get_pose()
            .ok_or(PlaybackError::ActuatorUnavailable)?;
        let width = self.plan.width();
        if state.positions.len() != width {
            return Err(PlaybackError::DimensionMismatch {
                expected: width,
                actual: state.positions.len(),
            });
        }

        if self.options.skip_transition {
            log::info!("Skipping transition, starting from current pose");
        } else {
            let target = self.plan.start_pose();
            let duration = self.options.transition_seconds;
            log::debug!("Transitioning to start pose over {:.2}s", duration);
            self.phase = Phase::Transitioning;
            let outcome = self.drive(1.0, |elapsed| {
                if elapsed >= duration {
                    Step::Finish(target.to_vec())
                } else {
                    Step::Send(pose_at(elapsed, duration, &state.positions, target))
                }
            })?;
            if outcome == Outcome::Cancelled {
                return Ok(self.cancel());
            }
        }

        if let Plan::Episode(episode) = self.plan {
            let speed = self.lease.settings().clamp_speed(self.options.speed);
            let sampler = TrajectorySampler::new(episode);
            self.phase = Phase::Playing;
            let outcome = self.drive(speed, |time| match sampler.sample(time) {
                Sample::Pose(pose) => Step::Send(pose),
                Sample::Finished => Step::Finish(episode.last_pose().to_vec()),
            })?;
            if outcome == Outcome::Cancelled {
                return Ok(self.cancel());
            }
            log::debug!("Playback complete ({} commands)", self.commands);
        }

        self.phase = Phase::Completed;
        Ok(self.report(Outcome::Completed))
    }

    /// Tick until `step` finishes or a cancel arrives. While paused nothing is
    /// sent and `step`'s clock stands still.
    fn drive(
        &mut self,
        speed: f64,
        mut step: impl FnMut(f64) -> Step,
    ) -> Result<Outcome, PlaybackError> {
        let clock = self.lease.clock();
        let tick = self.lease.settings().tick();
        let active = self.phase;
        let mut timeline = PlaybackTimeline::new(clock.now(), speed);

        loop {
            let control = self.lease.poll();
            let now = clock.now();
            if control.cancelled {
                self.paused += timeline.paused_time(now);
                return Ok(Outcome::Cancelled);
            }
            if timeline.set_paused(control.paused, now) {
                self.phase = if control.paused { Phase::Paused } else { active };
            }
            if timeline.is_paused() {
                clock.sleep(tick);
                continue;
            }

            let time = timeline.playback_time(now);
            if active == Phase::Playing {
                self.playback_seconds = time;
            }
            match step(time) {
                Step::Send(pose) => self.send(pose)?,
                Step::Finish(pose) => {
                    self.send(pose)?;
                    self.paused += timeline.paused_time(now);
                    return Ok(Outcome::Completed);
                }
            }
            clock.sleep(tick);
        }
    }

    fn send(&mut self, pose: Vec<f64>) -> Result<(), PlaybackError> {
        self.sink.send_command(&pose, self.plan.joints())?;
        self.commands += 1;
        self.last_sent = Some(pose);
        Ok(())
    }

    /// Re-send the last pose for the hold window so the actuator does not see
    /// its command stream stop mid-motion.
    fn cancel(&mut self) -> RunReport {
        self.phase = Phase::Cancelled;
        let clock = self.lease.clock();
        let settings = self.lease.settings();
        if let Some(pose) = self.last_sent.clone() {
            log::warn!(
                "Playback cancelled, holding last pose for {} ticks",
                settings.cancel_hold_ticks
            );
            for _ in 0..settings.cancel_hold_ticks {
                if let Err(e) = self.sink.send_command(&pose, self.plan.joints()) {
                    log::warn!("Hold command failed: {}", e);
                    break;
                }
                self.commands += 1;
                clock.sleep(settings.tick());
            }
        } else {
            log::warn!("Playback cancelled before any command was sent");
        }
        self.report(Outcome::Cancelled)
    }

    fn report(&self, outcome: Outcome) -> RunReport {
        RunReport {
            outcome,
            commands: self.commands,
            last_pose: self.last_sent.clone(),
            playback_seconds: self.playback_seconds,
            paused_seconds: self.paused.as_secs_f64(),
        }
    }
}
