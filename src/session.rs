//! # Session
//!
//! Explicit playback context: the actuator, the clock, the playback settings
//! and the control channel, passed to every controller, chord and song run.
//!
//! ## Control authority
//! Only one run may drive a session's actuator at a time. [`Session::claim`]
//! hands out a [`ControlLease`]; a second claim while the first is alive fails
//! with [`PlaybackError::SessionBusy`]. Concurrent chord tasks share one lease
//! by reference.
//!
//! ## Signals
//! Pause, resume and cancel arrive over a `crossbeam-channel` queue from any
//! number of [`ControlHandle`]s. The core never blocks on the queue: each tick
//! drains it with `try_recv` into shared flags, so every task of a chord sees
//! the same pause or cancel within one tick.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use jointplay::{ManualClock, PlaybackSettings, Session, SimulatedActuator};
//!
//! let (session, handle) = Session::new(
//!     Arc::new(SimulatedActuator::zeroed(2)),
//!     Arc::new(ManualClock::new()),
//!     PlaybackSettings::default(),
//! )
//! .unwrap();
//!
//! let lease = session.claim().unwrap();
//! assert!(session.claim().is_err());
//!
//! handle.cancel();
//! assert!(lease.poll().cancelled);
//! drop(lease);
//!
//! // a fresh claim starts with clear flags
//! assert!(!session.claim().unwrap().poll().cancelled);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::PlaybackSettings;
use crate::error::{ConfigError, PlaybackError};
use crate::motion::{Actuator, Clock, Outcome, PlaybackTimeline};

/// A discrete control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Pause,
    Resume,
    TogglePause,
    Cancel,
}

/// Sending side of a session's control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    sender: Sender<ControlSignal>,
}

impl ControlHandle {
    /// Returns false once the session is gone.
    pub fn send(&self, signal: ControlSignal) -> bool {
        self.sender.send(signal).is_ok()
    }

    pub fn pause(&self) -> bool {
        self.send(ControlSignal::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(ControlSignal::Resume)
    }

    pub fn toggle_pause(&self) -> bool {
        self.send(ControlSignal::TogglePause)
    }

    pub fn cancel(&self) -> bool {
        self.send(ControlSignal::Cancel)
    }
}

/// Pause/cancel flags after draining the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub paused: bool,
    pub cancelled: bool,
}

/// One actuator, one clock, one control channel.
pub struct Session {
    actuator: Arc<dyn Actuator>,
    clock: Arc<dyn Clock>,
    settings: PlaybackSettings,
    sender: Sender<ControlSignal>,
    receiver: Receiver<ControlSignal>,
    paused: AtomicBool,
    cancelled: AtomicBool,
    claimed: AtomicBool,
}

impl Session {
    /// Fails when `settings` would make the control loop misbehave, e.g. a
    /// zero tick rate or an empty speed band.
    pub fn new(
        actuator: Arc<dyn Actuator>,
        clock: Arc<dyn Clock>,
        settings: PlaybackSettings,
    ) -> Result<(Self, ControlHandle), ConfigError> {
        settings.validate()?;
        let (sender, receiver) = unbounded();
        let handle = ControlHandle {
            sender: sender.clone(),
        };
        let session = Self {
            actuator,
            clock,
            settings,
            sender,
            receiver,
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
        };
        Ok((session, handle))
    }

    /// Another sender for the same channel.
    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn actuator(&self) -> &dyn Actuator {
        self.actuator.as_ref()
    }

    /// Take control of the actuator. Signals queued before the claim are
    /// discarded and the pause/cancel flags start cleared.
    pub fn claim(&self) -> Result<ControlLease<'_>, PlaybackError> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PlaybackError::SessionBusy);
        }
        while self.receiver.try_recv().is_ok() {}
        self.paused.store(false, Ordering::SeqCst);
        self.cancelled.store(false, Ordering::SeqCst);
        log::debug!("Session claimed");
        Ok(ControlLease { session: self })
    }

    fn drain(&self) -> ControlState {
        while let Ok(signal) = self.receiver.try_recv() {
            match signal {
                ControlSignal::Pause => {
                    if !self.paused.swap(true, Ordering::SeqCst) {
                        log::info!("Paused");
                    }
                }
                ControlSignal::Resume => {
                    if self.paused.swap(false, Ordering::SeqCst) {
                        log::info!("Resumed");
                    }
                }
                ControlSignal::TogglePause => {
                    let was_paused = self.paused.fetch_xor(true, Ordering::SeqCst);
                    log::info!("{}", if was_paused { "Resumed" } else { "Paused" });
                }
                ControlSignal::Cancel => {
                    if !self.cancelled.swap(true, Ordering::SeqCst) {
                        log::info!("Cancel requested");
                    }
                }
            }
        }
        ControlState {
            paused: self.paused.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
        }
    }
}

/// Exclusive control of a session for the duration of one run.
pub struct ControlLease<'s> {
    session: &'s Session,
}

impl<'s> ControlLease<'s> {
    pub fn actuator(&self) -> &'s dyn Actuator {
        self.session.actuator.as_ref()
    }

    pub fn clock(&self) -> &'s dyn Clock {
        self.session.clock.as_ref()
    }

    pub fn settings(&self) -> &'s PlaybackSettings {
        &self.session.settings
    }

    /// Drain pending signals and report the current flags. Never blocks.
    pub fn poll(&self) -> ControlState {
        self.session.drain()
    }

    pub fn is_cancelled(&self) -> bool {
        self.poll().cancelled
    }

    /// Sleep for `duration` of unpaused time, one tick at a time.
    ///
    /// Time spent paused does not count; a cancel ends the wait early.
    pub fn wait(&self, duration: Duration) -> Outcome {
        let clock = self.clock();
        let tick = self.settings().tick();
        let target = duration.as_secs_f64();
        let mut timeline = PlaybackTimeline::new(clock.now(), 1.0);

        loop {
            let state = self.poll();
            if state.cancelled {
                return Outcome::Cancelled;
            }
            let now = clock.now();
            timeline.set_paused(state.paused, now);
            let remaining = target - timeline.playback_time(now);
            // sub-microsecond remainders would round to zero-length sleeps
            if remaining < 1e-6 {
                return Outcome::Completed;
            }
            if timeline.is_paused() {
                clock.sleep(tick);
            } else {
                clock.sleep(tick.min(Duration::from_secs_f64(remaining)));
            }
        }
    }
}

impl Drop for ControlLease<'_> {
    fn drop(&mut self) {
        self.session.claimed.store(false, Ordering::SeqCst);
        log::debug!("Session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{ManualClock, SimulatedActuator};

    fn session() -> (Session, ControlHandle, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let (session, handle) = Session::new(
            Arc::new(SimulatedActuator::zeroed(3)),
            clock.clone(),
            PlaybackSettings::default(),
        )
        .unwrap();
        (session, handle, clock)
    }

    #[test]
    fn test_single_lease() {
        let (session, _handle, _clock) = session();
        let lease = session.claim().unwrap();
        assert_eq!(session.claim().err(), Some(PlaybackError::SessionBusy));
        drop(lease);
        assert!(session.claim().is_ok());
    }

    #[test]
    fn test_stale_signals_discarded_on_claim() {
        let (session, handle, _clock) = session();
        handle.cancel();
        handle.pause();
        let lease = session.claim().unwrap();
        assert_eq!(lease.poll(), ControlState::default());
    }

    #[test]
    fn test_toggle_and_resume() {
        let (session, handle, _clock) = session();
        let lease = session.claim().unwrap();

        handle.toggle_pause();
        assert!(lease.poll().paused);
        handle.toggle_pause();
        assert!(!lease.poll().paused);
        handle.pause();
        handle.pause();
        assert!(lease.poll().paused);
        handle.resume();
        assert!(!lease.poll().paused);
    }

    #[test]
    fn test_wait_elapses_duration() {
        let (session, _handle, clock) = session();
        let lease = session.claim().unwrap();
        let before = clock.now();
        assert_eq!(lease.wait(Duration::from_millis(500)), Outcome::Completed);
        let waited = (clock.now() - before).as_secs_f64();
        assert!((waited - 0.5).abs() < 1e-6, "waited {}", waited);
    }

    #[test]
    fn test_wait_cancelled() {
        let (session, handle, clock) = session();
        let lease = session.claim().unwrap();
        handle.cancel();
        let before = clock.now();
        assert_eq!(lease.wait(Duration::from_secs(10)), Outcome::Cancelled);
        assert_eq!(clock.now(), before);
    }

    #[test]
    fn test_handle_after_session_dropped() {
        let (session, handle, _clock) = session();
        drop(session);
        assert!(!handle.cancel());
    }

    fn rejected(settings: PlaybackSettings) -> bool {
        let result = Session::new(
            Arc::new(SimulatedActuator::zeroed(3)),
            Arc::new(ManualClock::new()),
            settings,
        );
        matches!(result, Err(ConfigError::InvalidSetting(_)))
    }

    #[test]
    fn test_zero_tick_rate_rejected() {
        let settings = PlaybackSettings {
            tick_rate_hz: 0.0,
            ..PlaybackSettings::default()
        };
        assert!(rejected(settings));
        let settings = PlaybackSettings {
            tick_rate_hz: f64::INFINITY,
            ..PlaybackSettings::default()
        };
        assert!(rejected(settings));
    }

    #[test]
    fn test_inverted_speed_band_rejected() {
        let settings = PlaybackSettings {
            min_speed: 3.0,
            ..PlaybackSettings::default()
        };
        assert!(rejected(settings));
    }

    #[test]
    fn test_negative_settle_rejected() {
        let settings = PlaybackSettings {
            settle_seconds: -0.5,
            ..PlaybackSettings::default()
        };
        assert!(rejected(settings));
    }

    #[test]
    fn test_huge_settle_saturates() {
        let settings = PlaybackSettings {
            settle_seconds: 1e300,
            ..PlaybackSettings::default()
        };
        assert!(!rejected(settings.clone()));
        assert_eq!(settings.settle(), Duration::MAX);
    }
}
