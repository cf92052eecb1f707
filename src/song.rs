//! # Song Player
//!
//! Top-level orchestration of a whole performance:
//! 1. compile the sequence text
//! 2. pre-flight check every episode the song needs
//! 3. ease to the terminal pose of the init-position episode
//! 4. play each chord, waiting `chord duration * tempo multiplier` between chords
//! 5. ease to the terminal pose of the final-position episode
//!
//! ## Speeds
//! Three independent knobs:
//! - `transition_speed` - init/final moves (scales `position-transition-seconds`)
//! - `note_speed` - episode replay inside chords
//! - `tempo_multiplier` - the rhythm only; motor speed is unaffected
//!
//! ## Cancellation
//! A cancel stops the song where it is: the current chord's tasks hold their
//! last pose, no further chords start, and the final move is skipped. The
//! report's outcome is then [`Outcome::Cancelled`]. Pauses stretch both motion
//! and the waits between chords.

use std::path::PathBuf;
use std::time::Duration;

use crate::chord::{ChordReport, ChordScheduler};
use crate::config::InstrumentConfig;
use crate::episode::{Episode, EpisodeStore};
use crate::error::{PlaybackError, SongError};
use crate::motion::{Outcome, PlaybackController, PlaybackOptions, RunReport};
use crate::preflight::{EpisodeCache, Preflight};
use crate::sequence::{compile, CompileWarning, SequenceProgram};
use crate::session::{ControlLease, Session};

/// Knobs for one song.
#[derive(Debug, Clone, PartialEq)]
pub struct SongOptions {
    pub transition_speed: f64,
    pub note_speed: f64,
    pub tempo_multiplier: f64,
    pub skip_init: bool,
    pub skip_final: bool,
}

impl Default for SongOptions {
    fn default() -> Self {
        Self {
            transition_speed: 1.0,
            note_speed: 1.0,
            tempo_multiplier: 1.0,
            skip_init: false,
            skip_final: false,
        }
    }
}

impl SongOptions {
    pub fn validate(&self) -> Result<(), SongError> {
        let knobs = [
            ("transition speed", self.transition_speed),
            ("note speed", self.note_speed),
            ("tempo multiplier", self.tempo_multiplier),
        ];
        for (name, value) in knobs {
            if !(value > 0.0 && value.is_finite()) {
                return Err(SongError::InvalidOption(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// A compiled, checked song ready to play.
#[derive(Debug, Clone)]
pub struct PreparedSong {
    pub program: SequenceProgram,
    pub episodes: EpisodeCache,
}

/// What a song run did.
#[derive(Debug, Clone, PartialEq)]
pub struct SongReport {
    pub outcome: Outcome,
    pub warnings: Vec<CompileWarning>,
    pub init: Option<RunReport>,
    /// One entry per chord started, in order.
    pub chords: Vec<ChordReport>,
    pub final_move: Option<RunReport>,
}

impl SongReport {
    fn new(warnings: Vec<CompileWarning>) -> Self {
        Self {
            outcome: Outcome::Completed,
            warnings,
            init: None,
            chords: Vec::new(),
            final_move: None,
        }
    }

    /// Notes that failed across the whole song.
    pub fn failed_notes(&self) -> usize {
        self.chords.iter().map(|c| c.failures().count()).sum()
    }
}

/// Plays songs for one instrument on one session.
pub struct SongPlayer<'a> {
    session: &'a Session,
    config: &'a InstrumentConfig,
    store: &'a dyn EpisodeStore,
}

impl<'a> SongPlayer<'a> {
    pub fn new(
        session: &'a Session,
        config: &'a InstrumentConfig,
        store: &'a dyn EpisodeStore,
    ) -> Self {
        Self {
            session,
            config,
            store,
        }
    }

    /// Compile and pre-flight `text` without moving anything.
    pub fn prepare(&self, text: &str, options: &SongOptions) -> Result<PreparedSong, SongError> {
        options.validate()?;
        let program = compile(text, self.config, self.store)?;
        log::info!("Parsed {} actions from sequence", program.len());
        let episodes = Preflight::new(self.config, self.store).check(
            &program,
            !options.skip_init,
            !options.skip_final,
        )?;
        Ok(PreparedSong { program, episodes })
    }

    /// Compile, check, then render the preview table.
    pub fn dry_run(&self, text: &str, options: &SongOptions) -> Result<String, SongError> {
        let song = self.prepare(text, options)?;
        Ok(song.program.render_preview(options.tempo_multiplier))
    }

    /// Compile, check and play `text`.
    pub fn play(&self, text: &str, options: &SongOptions) -> Result<SongReport, SongError> {
        let song = self.prepare(text, options)?;
        self.perform(&song, options)
    }

    /// Play an already prepared song.
    pub fn perform(&self, song: &PreparedSong, options: &SongOptions) -> Result<SongReport, SongError> {
        let lease = self.session.claim()?;
        let settle = lease.settings().settle();
        let mut report = SongReport::new(song.program.warnings().to_vec());

        log::info!(
            "Playing {} ({} BPM x{}, note speed {}x)",
            self.config.instrument_name,
            self.config.tempo().bpm(),
            options.tempo_multiplier,
            options.note_speed
        );

        if !options.skip_init {
            if let Some(episode) = self.position(song, &self.config.init_position_episode)? {
                log::info!("Moving to initial position");
                let run = move_to_terminal_pose(&lease, episode, options.transition_speed)?;
                let outcome = run.outcome;
                report.init = Some(run);
                if outcome == Outcome::Cancelled || lease.wait(settle) == Outcome::Cancelled {
                    return Ok(cancelled(report, 0, song.program.len()));
                }
            }
        }

        let scheduler = ChordScheduler::new(&lease, &song.episodes);
        let chords = song.program.chords();
        for (i, chord) in chords.iter().enumerate() {
            if lease.is_cancelled() {
                return Ok(cancelled(report, i, chords.len()));
            }
            log::debug!("Action {}/{}", i + 1, chords.len());

            let chord_report = scheduler.play(chord, options.note_speed);
            let wait = chord.duration_seconds() * options.tempo_multiplier;
            log::info!("Played: {} ({:.2}s)", chord.describe(), wait);
            let outcome = chord_report.outcome();
            report.chords.push(chord_report);
            if outcome == Outcome::Cancelled {
                return Ok(cancelled(report, i + 1, chords.len()));
            }

            if i + 1 < chords.len() && lease.wait(Duration::from_secs_f64(wait)) == Outcome::Cancelled {
                return Ok(cancelled(report, i + 1, chords.len()));
            }
        }

        if !options.skip_final {
            if let Some(episode) = self.position(song, &self.config.final_position_episode)? {
                if lease.wait(settle) == Outcome::Cancelled {
                    return Ok(cancelled(report, chords.len(), chords.len()));
                }
                log::info!("Returning to final position");
                let run = move_to_terminal_pose(&lease, episode, options.transition_speed)?;
                if run.outcome == Outcome::Cancelled {
                    report.outcome = Outcome::Cancelled;
                }
                report.final_move = Some(run);
            }
        }

        match report.failed_notes() {
            0 => log::info!("Playback complete"),
            n => log::warn!("Playback complete with {} failed note(s)", n),
        }
        Ok(report)
    }

    fn position<'s>(
        &self,
        song: &'s PreparedSong,
        path: &Option<PathBuf>,
    ) -> Result<Option<&'s Episode>, PlaybackError> {
        match path {
            None => Ok(None),
            Some(path) => song
                .episodes
                .get(path)
                .map(|e| Some(e.as_ref()))
                .ok_or_else(|| PlaybackError::EpisodeNotLoaded(path.clone())),
        }
    }
}

/// Ease the episode's joints to its last frame; the recording itself is not
/// replayed.
fn move_to_terminal_pose(
    lease: &ControlLease<'_>,
    episode: &Episode,
    transition_speed: f64,
) -> Result<RunReport, PlaybackError> {
    let settings = lease.settings();
    let speed = settings.clamp_speed(transition_speed);
    let duration = settings.position_transition_seconds / speed;
    PlaybackController::to_pose(
        lease,
        episode.last_pose(),
        episode.joints(),
        PlaybackOptions::new(1.0, duration),
    )
    .run()
}

fn cancelled(mut report: SongReport, played: usize, total: usize) -> SongReport {
    log::warn!("Song cancelled after {} of {} actions", played, total);
    report.outcome = Outcome::Cancelled;
    report
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::episode::MemoryEpisodeStore;
    use crate::joints::JointSubset;
    use crate::motion::{Clock, ManualClock, SimulatedActuator};
    use crate::sequence::Hand;

    fn fixture() -> (InstrumentConfig, MemoryEpisodeStore) {
        let stroke = Episode::new(
            vec![0.0, 0.5],
            vec![vec![0.0, 0.0], vec![1.0, 0.0]],
            None,
            JointSubset::new(vec![0]).unwrap(),
        )
        .unwrap();
        let rest_pose = Episode::new(
            vec![0.0],
            vec![vec![0.0, -1.0]],
            None,
            JointSubset::new(vec![0, 1]).unwrap(),
        )
        .unwrap();
        let config = InstrumentConfig::new("test")
            .with_note("A", Hand::Left, "a.json", true)
            .with_init_position("rest.json")
            .with_final_position("rest.json");
        let store = MemoryEpisodeStore::new()
            .with("a.json", stroke)
            .with("rest.json", rest_pose);
        (config, store)
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = SongOptions {
            tempo_multiplier: 0.0,
            ..SongOptions::default()
        };
        assert!(matches!(options.validate(), Err(SongError::InvalidOption(_))));
        let options = SongOptions {
            note_speed: f64::NAN,
            ..SongOptions::default()
        };
        assert!(options.validate().is_err());
        assert!(SongOptions::default().validate().is_ok());
    }

    #[test]
    fn test_waits_between_chords_but_not_after_last() {
        let (config, store) = fixture();
        let clock = Arc::new(ManualClock::new());
        let (session, _handle) = Session::new(
            Arc::new(SimulatedActuator::zeroed(2)),
            clock.clone(),
            config.playback.clone(),
        )
        .unwrap();
        let options = SongOptions {
            skip_init: true,
            skip_final: true,
            tempo_multiplier: 2.0,
            ..SongOptions::default()
        };

        let report = SongPlayer::new(&session, &config, &store)
            .play("A:left:quarter -> A:left:quarter", &options)
            .unwrap();

        // two notes of 1.0s transition + 0.5s replay, one 1.0s wait
        let elapsed = clock.now().as_secs_f64();
        assert_eq!(report.chords.len(), 2);
        assert!(elapsed > 4.0 && elapsed < 4.05, "elapsed {}", elapsed);
    }

    #[test]
    fn test_position_moves_use_terminal_pose_and_speed() {
        let (config, store) = fixture();
        let actuator = Arc::new(SimulatedActuator::zeroed(2));
        let clock = Arc::new(ManualClock::new());
        let (session, _handle) =
            Session::new(actuator.clone(), clock.clone(), config.playback.clone()).unwrap();
        let options = SongOptions {
            transition_speed: 2.0,
            ..SongOptions::default()
        };

        let report = SongPlayer::new(&session, &config, &store)
            .play("rest:none:quarter", &options)
            .unwrap();

        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.init.unwrap().last_pose, Some(vec![0.0, -1.0]));
        assert_eq!(actuator.positions(), vec![0.0, -1.0]);
        // 1.5s init + 0.5s settle + 0.5s settle + 1.5s final; no wait after the only chord
        let elapsed = clock.now().as_secs_f64();
        assert!((elapsed - 4.0).abs() < 1e-6, "elapsed {}", elapsed);
    }

    #[test]
    fn test_second_song_on_busy_session() {
        let (config, store) = fixture();
        let (session, _handle) = Session::new(
            Arc::new(SimulatedActuator::zeroed(2)),
            Arc::new(ManualClock::new()),
            config.playback.clone(),
        )
        .unwrap();
        let _lease = session.claim().unwrap();

        let err = SongPlayer::new(&session, &config, &store)
            .play("A:left:quarter", &SongOptions::default())
            .unwrap_err();
        assert!(matches!(err, SongError::Playback(PlaybackError::SessionBusy)));
    }
}
