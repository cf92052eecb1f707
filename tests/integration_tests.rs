//! Integration tests for jointplay
//!
//! Drives whole songs and stand-alone replays against file-backed episode
//! stores, a simulated actuator and a simulated clock.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use jointplay::{
    read_song_file, replay, Clock, ConfigError, ControlHandle, Episode, EpisodeStore,
    InstrumentConfig, JointSubset, JsonEpisodeStore, ManualClock, Outcome, PlaybackError,
    PlaybackSettings, PreflightIssue, SequenceError, Session, SimulatedActuator, SongError,
    SongOptions, SongPlayer,
};
use tempfile::TempDir;

const CONFIG: &str = r#"
instrument-name: test-bells
tempo-bpm: 120
init-position-episode: positions/init.json
final-position-episode: positions/final.json
notes:
  A: { hand: left, episode: notes/a.json, recorded: true }
  B: { hand: right, episode: notes/b.json, recorded: true }
  C: { hand: right, episode: notes/c.json, recorded: true }
"#;

/// Moves `joints` of a 4-joint pose from `from` to `to` over half a second.
fn stroke(joints: Vec<usize>, from: f64, to: f64) -> Episode {
    Episode::new(
        vec![0.0, 0.25, 0.5],
        vec![vec![from; 4], vec![(from + to) / 2.0; 4], vec![to; 4]],
        None,
        JointSubset::new(joints).unwrap(),
    )
    .unwrap()
}

/// A configuration file plus its episodes in a temporary directory.
fn instrument() -> (TempDir, InstrumentConfig, JsonEpisodeStore) {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("bells.yaml");
    fs::write(&config_path, CONFIG).unwrap();

    let store = JsonEpisodeStore::new(dir.path());
    let episodes = [
        ("notes/a.json", stroke(vec![0, 1], 0.0, 1.0)),
        ("notes/b.json", stroke(vec![2, 3], 0.0, 2.0)),
        ("notes/c.json", stroke(vec![1, 2], 0.0, 3.0)),
        ("positions/init.json", stroke(vec![0, 1, 2, 3], 0.5, 0.5)),
        ("positions/final.json", stroke(vec![0, 1, 2, 3], 0.2, -0.25)),
    ];
    for (path, episode) in &episodes {
        store.save(episode, Path::new(path)).unwrap();
    }

    let config = InstrumentConfig::load(&config_path).unwrap();
    (dir, config, store)
}

#[test]
fn test_full_song_ends_at_final_position() {
    let (_dir, config, store) = instrument();
    let actuator = Arc::new(SimulatedActuator::zeroed(4));
    let clock = Arc::new(ManualClock::new());
    let (session, _handle) =
        Session::new(actuator.clone(), clock.clone(), config.playback.clone()).unwrap();

    let report = SongPlayer::new(&session, &config, &store)
        .play(
            "A:left:quarter;B:right:quarter -> rest:none:quarter -> A:left:half",
            &SongOptions::default(),
        )
        .unwrap();

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.chords.len(), 3);
    assert!(report.chords[1].notes.is_empty());
    assert_eq!(report.failed_notes(), 0);
    assert_eq!(report.init.as_ref().unwrap().outcome, Outcome::Completed);
    assert_eq!(
        report.final_move.as_ref().unwrap().last_pose,
        Some(vec![-0.25; 4])
    );
    assert_eq!(actuator.positions(), vec![-0.25; 4]);

    // init move 3.0s + settle 0.5s + waits after chords 1 and 2 (0.5s each)
    // + settle 0.5s + final move 3.0s, before any note playback time
    assert!(clock.now() >= Duration::from_secs_f64(8.0));
}

#[test]
fn test_skip_init_and_final() {
    let (_dir, config, store) = instrument();
    let actuator = Arc::new(SimulatedActuator::zeroed(4));
    let (session, _handle) = Session::new(
        actuator.clone(),
        Arc::new(ManualClock::new()),
        config.playback.clone(),
    )
    .unwrap();
    let options = SongOptions {
        skip_init: true,
        skip_final: true,
        ..SongOptions::default()
    };

    let report = SongPlayer::new(&session, &config, &store)
        .play("B:right:quarter", &options)
        .unwrap();

    assert!(report.init.is_none());
    assert!(report.final_move.is_none());
    assert_eq!(actuator.positions(), vec![0.0, 0.0, 2.0, 2.0]);
}

#[test]
fn test_dry_run_never_moves() {
    let (_dir, mut config, store) = instrument();
    config.set_tempo(60).unwrap();
    let actuator = Arc::new(SimulatedActuator::zeroed(4));
    let (session, _handle) = Session::new(
        actuator.clone(),
        Arc::new(ManualClock::new()),
        config.playback.clone(),
    )
    .unwrap();
    let options = SongOptions {
        tempo_multiplier: 2.0,
        ..SongOptions::default()
    };

    let preview = SongPlayer::new(&session, &config, &store)
        .dry_run("A:left:quarter -> rest:none:half", &options)
        .unwrap();

    // (1.0s + 2.0s) at 60 BPM, doubled
    assert!(preview.contains("A (left, quarter)"));
    assert!(preview.contains("rest (half)"));
    assert!(preview.contains("Total duration: 6.00s"));
    assert_eq!(actuator.command_count(), 0);
}

#[test]
fn test_compile_error_stops_before_motion() {
    let (_dir, config, store) = instrument();
    let actuator = Arc::new(SimulatedActuator::zeroed(4));
    let (session, _handle) = Session::new(
        actuator.clone(),
        Arc::new(ManualClock::new()),
        config.playback.clone(),
    )
    .unwrap();

    let err = SongPlayer::new(&session, &config, &store)
        .play("A:left:quarter -> B:left:quarter", &SongOptions::default())
        .unwrap_err();

    assert!(matches!(
        err,
        SongError::Sequence(SequenceError::HandMismatch { action: 2, .. })
    ));
    assert_eq!(actuator.command_count(), 0);
}

#[test]
fn test_preflight_reports_all_problems_before_motion() {
    let (dir, config, store) = instrument();
    fs::remove_file(dir.path().join("positions/final.json")).unwrap();
    let actuator = Arc::new(SimulatedActuator::zeroed(4));
    let (session, _handle) = Session::new(
        actuator.clone(),
        Arc::new(ManualClock::new()),
        config.playback.clone(),
    )
    .unwrap();

    let err = SongPlayer::new(&session, &config, &store)
        .play("A:left:quarter;C:right:quarter", &SongOptions::default())
        .unwrap_err();

    let SongError::Preflight(preflight) = err else {
        panic!("expected a pre-flight error, got {:?}", err);
    };
    assert_eq!(
        preflight.issues,
        vec![
            PreflightIssue::OverlappingJoints {
                action: 1,
                first: "A".to_string(),
                second: "C".to_string(),
                joint: 1,
            },
            PreflightIssue::PositionMissing {
                role: "final".to_string(),
                path: PathBuf::from("positions/final.json"),
            },
        ]
    );
    assert_eq!(actuator.command_count(), 0);
}

/// Simulated clock that sends a cancel once simulated time reaches `at`.
struct CancelAt {
    clock: ManualClock,
    at: Duration,
    handle: OnceLock<ControlHandle>,
}

impl Clock for CancelAt {
    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration);
        if self.clock.now() >= self.at {
            if let Some(handle) = self.handle.get() {
                handle.cancel();
            }
        }
    }
}

#[test]
fn test_cancel_mid_song_skips_the_rest() {
    let (_dir, config, store) = instrument();
    let actuator = Arc::new(SimulatedActuator::zeroed(4));
    // init move and settle end at 3.5s; the first note runs until about 5.0s
    let clock = Arc::new(CancelAt {
        clock: ManualClock::new(),
        at: Duration::from_secs_f64(4.0),
        handle: OnceLock::new(),
    });
    let (session, handle) =
        Session::new(actuator.clone(), clock.clone(), config.playback.clone()).unwrap();
    let _ = clock.handle.set(handle);

    let report = SongPlayer::new(&session, &config, &store)
        .play(
            "A:left:quarter -> B:right:quarter -> A:left:quarter",
            &SongOptions::default(),
        )
        .unwrap();

    assert_eq!(report.outcome, Outcome::Cancelled);
    assert_eq!(report.init.as_ref().unwrap().outcome, Outcome::Completed);
    assert_eq!(report.chords.len(), 1);
    assert_eq!(report.chords[0].outcome(), Outcome::Cancelled);
    assert!(report.final_move.is_none());
    // B never started, so its joints still hold the init pose
    assert_eq!(&actuator.positions()[2..], &[0.5, 0.5]);
}

#[test]
fn test_song_file_plays() {
    let (dir, config, store) = instrument();
    let song_path = dir.path().join("song.txt");
    fs::write(
        &song_path,
        "# warm-up\nA:left:quarter\n\n# answer\nB:right:quarter -> A:left:quarter\n",
    )
    .unwrap();
    let text = read_song_file(&song_path).unwrap();
    assert_eq!(text, "A:left:quarter -> B:right:quarter -> A:left:quarter");

    let (session, _handle) = Session::new(
        Arc::new(SimulatedActuator::zeroed(4)),
        Arc::new(ManualClock::new()),
        config.playback.clone(),
    )
    .unwrap();
    let report = SongPlayer::new(&session, &config, &store)
        .play(&text, &SongOptions::default())
        .unwrap();
    assert_eq!(report.chords.len(), 3);
    assert_eq!(report.outcome, Outcome::Completed);
}

#[test]
fn test_replay_episode_from_file() {
    let (_dir, config, store) = instrument();
    let episode = store.load(Path::new("notes/b.json")).unwrap();
    let actuator = Arc::new(SimulatedActuator::zeroed(4));
    let (session, _handle) = Session::new(
        actuator.clone(),
        Arc::new(ManualClock::new()),
        config.playback.clone(),
    )
    .unwrap();

    let report = replay(&session, &episode, 1.0, false).unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.last_pose, Some(vec![2.0; 4]));
    assert_eq!(actuator.positions(), vec![0.0, 0.0, 2.0, 2.0]);

    let _lease = session.claim().unwrap();
    assert_eq!(
        replay(&session, &episode, 1.0, true),
        Err(PlaybackError::SessionBusy)
    );
}

#[test]
fn test_offline_actuator_fails_every_note_but_song_continues() {
    let (_dir, config, store) = instrument();
    let actuator = Arc::new(SimulatedActuator::zeroed(4));
    actuator.reject_joint(0);
    let (session, _handle) = Session::new(
        actuator.clone(),
        Arc::new(ManualClock::new()),
        config.playback.clone(),
    )
    .unwrap();
    let options = SongOptions {
        skip_init: true,
        skip_final: true,
        ..SongOptions::default()
    };

    let report = SongPlayer::new(&session, &config, &store)
        .play("A:left:quarter;B:right:quarter -> A:left:quarter", &options)
        .unwrap();

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.chords.len(), 2);
    assert_eq!(report.failed_notes(), 2);
    assert!(report.chords[0].notes[1].result.is_ok());
}

#[test]
fn test_unusable_playback_settings_refused_up_front() {
    let broken = [
        PlaybackSettings {
            tick_rate_hz: 0.0,
            ..PlaybackSettings::default()
        },
        PlaybackSettings {
            min_speed: 3.0,
            ..PlaybackSettings::default()
        },
        PlaybackSettings {
            settle_seconds: -1.0,
            ..PlaybackSettings::default()
        },
    ];
    for settings in broken {
        let result = Session::new(
            Arc::new(SimulatedActuator::zeroed(4)),
            Arc::new(ManualClock::new()),
            settings.clone(),
        );
        assert!(
            matches!(result, Err(ConfigError::InvalidSetting(_))),
            "accepted {:?}",
            settings
        );
    }
}
