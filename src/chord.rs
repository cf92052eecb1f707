//! # Chord Scheduler
//!
//! Plays one [`ChordAction`]: every non-rest note replays its episode on its
//! own thread, confined to the episode's joint subset, and the scheduler waits
//! for all of them before returning.
//!
//! ## Concurrency
//! Tasks run inside `std::thread::scope` and share the session lease, the
//! episode cache and the command sink by reference. Subsets are disjoint by
//! construction (hand collisions fail compilation, joint overlaps fail the
//! pre-flight check), so tasks never write the same joint. When the actuator
//! cannot take concurrent partial writes, every command goes through one
//! [`SerializedActuator`].
//!
//! ## Failure isolation
//! A task that fails or panics is reported in its [`NoteReport`]; its siblings
//! keep playing and the song continues.
//!
//! Inter-chord timing is the caller's job: the scheduler returns as soon as
//! the last task ends, whether that is before or after the chord's nominal
//! duration.

use std::thread;

use crate::error::PlaybackError;
use crate::motion::{
    Actuator, Outcome, PlaybackController, PlaybackOptions, RunReport, SerializedActuator,
};
use crate::preflight::EpisodeCache;
use crate::sequence::{ChordAction, Hand, NoteAction};
use crate::session::ControlLease;

/// How one note of a chord went.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteReport {
    pub note: String,
    pub hand: Option<Hand>,
    pub result: Result<RunReport, PlaybackError>,
}

/// Per-note results of one chord, in chord order. Rests are not listed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChordReport {
    pub notes: Vec<NoteReport>,
}

impl ChordReport {
    /// Cancelled when any note was cancelled.
    pub fn outcome(&self) -> Outcome {
        let cancelled = self
            .notes
            .iter()
            .any(|n| matches!(&n.result, Ok(run) if run.outcome == Outcome::Cancelled));
        if cancelled {
            Outcome::Cancelled
        } else {
            Outcome::Completed
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &NoteReport> {
        self.notes.iter().filter(|n| n.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.notes.iter().all(|n| n.result.is_ok())
    }
}

/// Runs chords against one lease and one set of loaded episodes.
pub struct ChordScheduler<'a> {
    lease: &'a ControlLease<'a>,
    episodes: &'a EpisodeCache,
}

impl<'a> ChordScheduler<'a> {
    pub fn new(lease: &'a ControlLease<'a>, episodes: &'a EpisodeCache) -> Self {
        Self { lease, episodes }
    }

    /// Play every non-rest note of `chord` at `speed` and wait for all of them.
    pub fn play(&self, chord: &ChordAction, speed: f64) -> ChordReport {
        let notes: Vec<&NoteAction> = chord.playable().collect();
        if notes.is_empty() {
            return ChordReport::default();
        }

        let actuator = self.lease.actuator();
        let serialized;
        let sink: &dyn Actuator = if actuator.supports_concurrent_writes() {
            actuator
        } else {
            serialized = SerializedActuator::new(actuator);
            &serialized
        };
        let options = PlaybackOptions::new(speed, self.lease.settings().note_transition_seconds);

        let reports: Vec<NoteReport> = thread::scope(|scope| {
            let tasks: Vec<_> = notes
                .iter()
                .map(|&note| {
                    let options = options.clone();
                    let task = scope.spawn(move || self.play_note(note, sink, options));
                    (note, task)
                })
                .collect();

            tasks
                .into_iter()
                .map(|(note, task)| {
                    let result = task
                        .join()
                        .unwrap_or_else(|_| Err(PlaybackError::TaskPanicked(note.note.clone())));
                    if let Err(e) = &result {
                        log::error!("Note {} failed: {}", note.note, e);
                    }
                    NoteReport {
                        note: note.note.clone(),
                        hand: note.hand,
                        result,
                    }
                })
                .collect()
        });

        ChordReport { notes: reports }
    }

    fn play_note(
        &self,
        note: &NoteAction,
        sink: &dyn Actuator,
        options: PlaybackOptions,
    ) -> Result<RunReport, PlaybackError> {
        let path = note
            .episode
            .as_deref()
            .ok_or_else(|| PlaybackError::EpisodeNotLoaded(note.note.clone().into()))?;
        let episode = self
            .episodes
            .get(path)
            .ok_or_else(|| PlaybackError::EpisodeNotLoaded(path.to_path_buf()))?;
        log::debug!("Playing {} from {}", note.note, path.display());
        PlaybackController::new(self.lease, episode, options)
            .with_sink(sink)
            .run()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex, OnceLock, PoisonError};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::config::{InstrumentConfig, PlaybackSettings};
    use crate::episode::{Episode, MemoryEpisodeStore};
    use crate::joints::JointSubset;
    use crate::motion::{Clock, ManualClock, SimulatedActuator, SystemClock};
    use crate::preflight::Preflight;
    use crate::sequence::{compile, SequenceProgram};
    use crate::session::{ControlHandle, ControlSignal, Session};

    /// Moves `joints` from 0 to `value` over half a second.
    fn note_episode(joints: Vec<usize>, value: f64) -> Episode {
        Episode::new(
            vec![0.0, 0.5],
            vec![vec![0.0; 4], vec![value; 4]],
            None,
            JointSubset::new(joints).unwrap(),
        )
        .unwrap()
    }

    fn fixture(text: &str) -> (SequenceProgram, EpisodeCache) {
        let config = InstrumentConfig::new("test")
            .with_note("L", Hand::Left, "l.json", true)
            .with_note("R", Hand::Right, "r.json", true);
        let store = MemoryEpisodeStore::new()
            .with("l.json", note_episode(vec![0, 1], 1.0))
            .with("r.json", note_episode(vec![2, 3], 2.0));
        let program = compile(text, &config, &store).unwrap();
        let cache = Preflight::new(&config, &store)
            .check(&program, false, false)
            .unwrap();
        (program, cache)
    }

    fn session(actuator: Arc<SimulatedActuator>) -> Session {
        let (session, _handle) = Session::new(
            actuator,
            Arc::new(ManualClock::new()),
            PlaybackSettings::default(),
        )
        .unwrap();
        session
    }

    #[test]
    fn test_plays_all_notes_on_disjoint_joints() {
        let (program, cache) = fixture("L:left:quarter;R:right:quarter");
        let actuator = Arc::new(SimulatedActuator::zeroed(4));
        let session = session(actuator.clone());
        let lease = session.claim().unwrap();

        let report = ChordScheduler::new(&lease, &cache).play(&program.chords()[0], 1.0);

        assert_eq!(report.notes.len(), 2);
        assert!(report.is_success());
        assert_eq!(report.outcome(), Outcome::Completed);
        assert_eq!(report.notes[0].note, "L");
        assert_eq!(report.notes[1].hand, Some(Hand::Right));
        assert_eq!(actuator.positions(), vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_rest_chord_spawns_nothing() {
        let (program, cache) = fixture("rest:none:quarter -> L:left:quarter");
        let actuator = Arc::new(SimulatedActuator::zeroed(4));
        let session = session(actuator.clone());
        let lease = session.claim().unwrap();

        let report = ChordScheduler::new(&lease, &cache).play(&program.chords()[0], 1.0);
        assert!(report.notes.is_empty());
        assert_eq!(actuator.command_count(), 0);
    }

    #[test]
    fn test_failed_note_does_not_stop_sibling() {
        let (program, cache) = fixture("L:left:quarter;R:right:quarter");
        let actuator = Arc::new(SimulatedActuator::zeroed(4));
        actuator.reject_joint(0);
        let session = session(actuator.clone());
        let lease = session.claim().unwrap();

        let report = ChordScheduler::new(&lease, &cache).play(&program.chords()[0], 1.0);

        assert!(!report.is_success());
        let failed: Vec<&str> = report.failures().map(|n| n.note.as_str()).collect();
        assert_eq!(failed, vec!["L"]);
        assert!(matches!(report.notes[0].result, Err(PlaybackError::Actuator(_))));
        assert!(report.notes[1].result.is_ok());
        assert_eq!(actuator.positions(), vec![0.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_exclusive_sink_is_serialized() {
        let (program, cache) = fixture("L:left:quarter;R:right:quarter");
        let actuator = Arc::new(SimulatedActuator::zeroed(4).exclusive());
        let session = session(actuator.clone());
        let lease = session.claim().unwrap();

        let report = ChordScheduler::new(&lease, &cache).play(&program.chords()[0], 1.0);

        assert!(report.is_success());
        assert_eq!(actuator.peak_writers(), 1);
        assert_eq!(actuator.positions(), vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_episode_missing_from_cache() {
        let (program, _cache) = fixture("L:left:quarter");
        let actuator = Arc::new(SimulatedActuator::zeroed(4));
        let session = session(actuator);
        let lease = session.claim().unwrap();
        let empty = EpisodeCache::new();

        let report = ChordScheduler::new(&lease, &empty).play(&program.chords()[0], 1.0);
        assert_eq!(
            report.notes[0].result,
            Err(PlaybackError::EpisodeNotLoaded(Path::new("l.json").to_path_buf()))
        );
    }

    #[test]
    fn test_cancel_reaches_every_task() {
        let (program, cache) = fixture("L:left:quarter;R:right:quarter");
        let actuator = Arc::new(SimulatedActuator::zeroed(4));
        let session = session(actuator.clone());
        let lease = session.claim().unwrap();
        session.handle().cancel();

        let report = ChordScheduler::new(&lease, &cache).play(&program.chords()[0], 1.0);

        assert_eq!(report.outcome(), Outcome::Cancelled);
        assert!(report
            .notes
            .iter()
            .all(|n| matches!(&n.result, Ok(run) if run.outcome == Outcome::Cancelled)));
        assert_eq!(actuator.command_count(), 0);
    }

    #[test]
    fn test_notes_of_a_chord_overlap_in_time() {
        let (program, cache) = fixture("L:left:quarter;R:right:quarter");
        let actuator = Arc::new(SimulatedActuator::zeroed(4));
        let settings = PlaybackSettings {
            note_transition_seconds: 0.2,
            ..PlaybackSettings::default()
        };
        let (session, _handle) =
            Session::new(actuator.clone(), Arc::new(SystemClock::new()), settings).unwrap();
        let lease = session.claim().unwrap();

        let started = Instant::now();
        let report = ChordScheduler::new(&lease, &cache).play(&program.chords()[0], 1.0);
        let elapsed = started.elapsed().as_secs_f64();

        // each note is 0.2s of transition plus 0.5s of replay; one after the
        // other they would need at least 1.4s
        assert!(report.is_success());
        assert!(elapsed >= 0.7 && elapsed < 1.35, "elapsed {}", elapsed);

        let (left_first, left_last) = actuator.command_window(0).unwrap();
        let (right_first, right_last) = actuator.command_window(2).unwrap();
        assert!(left_first < right_last && right_first < left_last);
    }

    /// Simulated clock that sends scripted signals once time reaches them.
    struct SignalAt {
        clock: ManualClock,
        script: Mutex<Vec<(Duration, ControlSignal)>>,
        handle: OnceLock<ControlHandle>,
    }

    impl Clock for SignalAt {
        fn now(&self) -> Duration {
            self.clock.now()
        }

        fn sleep(&self, duration: Duration) {
            self.clock.sleep(duration);
            let now = self.clock.now();
            let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
            while script.first().is_some_and(|(at, _)| *at <= now) {
                let (_, signal) = script.remove(0);
                if let Some(handle) = self.handle.get() {
                    handle.send(signal);
                }
            }
        }
    }

    #[test]
    fn test_pause_holds_every_note_of_a_chord() {
        let (program, cache) = fixture("L:left:quarter;R:right:quarter");
        let actuator = Arc::new(SimulatedActuator::zeroed(4));
        let clock = Arc::new(SignalAt {
            clock: ManualClock::new(),
            script: Mutex::new(vec![
                (Duration::from_secs_f64(0.2), ControlSignal::Pause),
                (Duration::from_secs_f64(1.2), ControlSignal::Resume),
            ]),
            handle: OnceLock::new(),
        });
        let (session, handle) = Session::new(
            actuator.clone(),
            clock.clone(),
            PlaybackSettings::default(),
        )
        .unwrap();
        let _ = clock.handle.set(handle);
        let lease = session.claim().unwrap();

        let report = ChordScheduler::new(&lease, &cache).play(&program.chords()[0], 1.0);

        assert_eq!(report.outcome(), Outcome::Completed);
        for note in &report.notes {
            let run = note.result.as_ref().unwrap();
            assert!(
                (run.paused_seconds - 1.0).abs() < 0.02,
                "{} paused {}",
                note.note,
                run.paused_seconds
            );
        }
        assert_eq!(actuator.positions(), vec![1.0, 1.0, 2.0, 2.0]);
    }
}
