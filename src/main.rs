use std::env;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;

use jointplay::{
    read_song_file, ControlHandle, EpisodeStore, InstrumentConfig,
    JsonEpisodeStore, Outcome, PlaybackSettings, Session, SimulatedActuator, SongOptions,
    SongPlayer, SongReport, SystemClock, JOINT_COUNT,
};

const USAGE: &str = "\
Usage: jointplay play <config.yaml> (--sequence TEXT | --song-file PATH) [options]
       jointplay replay <episode.json> [--speed X] [--skip-transition]

Play options:
  --speed X              init/final move speed, 0 < X <= 2 (default 1.0)
  --note-speed X         note replay speed, 0 < X <= 5 (default 1.0)
  --tempo-multiplier X   rhythm multiplier, 0 < X <= 3 (default 1.0)
  --override-bpm N       replace the configured tempo
  --skip-init            do not move to the initial position
  --skip-final           do not return to the final position
  --dry-run              compile, check and print the preview only
  --show-config          print the configuration summary and exit

While playing: 'p' + Enter pauses or resumes, 'q' + Enter cancels.";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    match args[1].as_str() {
        "play" => play(&args[2..]),
        "replay" => replay(&args[2..]),
        _ => usage(),
    }
}

fn usage() -> ! {
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

/// Value following a flag, or exit.
fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v.as_str(),
        None => fail(format!("Missing value for {}", flag)),
    }
}

/// A float in `(0, max]`, or exit.
fn bounded(raw: &str, flag: &str, max: f64) -> f64 {
    match raw.parse::<f64>() {
        Ok(v) if v > 0.0 && v <= max => v,
        _ => fail(format!("{} must be a number in (0, {}], got '{}'", flag, max, raw)),
    }
}

/// Forward `p` (pause/resume) and `q` (cancel) lines from stdin.
fn spawn_keyboard(handle: ControlHandle) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let sent = match line.trim() {
                "p" => handle.toggle_pause(),
                "q" => handle.cancel(),
                _ => true,
            };
            if !sent {
                break;
            }
        }
    });
}

fn play(args: &[String]) {
    let config_path = PathBuf::from(&args[0]);
    let mut sequence: Option<String> = None;
    let mut song_file: Option<PathBuf> = None;
    let mut options = SongOptions::default();
    let mut override_bpm: Option<u32> = None;
    let mut dry_run = false;
    let mut show_config = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sequence" => sequence = Some(value(args, &mut i, "--sequence").to_string()),
            "--song-file" => song_file = Some(PathBuf::from(value(args, &mut i, "--song-file"))),
            "--speed" => options.transition_speed = bounded(value(args, &mut i, "--speed"), "--speed", 2.0),
            "--note-speed" => {
                options.note_speed = bounded(value(args, &mut i, "--note-speed"), "--note-speed", 5.0)
            }
            "--tempo-multiplier" => {
                options.tempo_multiplier = bounded(
                    value(args, &mut i, "--tempo-multiplier"),
                    "--tempo-multiplier",
                    3.0,
                )
            }
            "--override-bpm" => {
                let raw = value(args, &mut i, "--override-bpm");
                match raw.parse::<u32>() {
                    Ok(bpm) => override_bpm = Some(bpm),
                    Err(_) => fail(format!("--override-bpm must be a whole number, got '{}'", raw)),
                }
            }
            "--skip-init" => options.skip_init = true,
            "--skip-final" => options.skip_final = true,
            "--dry-run" => dry_run = true,
            "--show-config" => show_config = true,
            other => fail(format!("Unknown option '{}'\n\n{}", other, USAGE)),
        }
        i += 1;
    }

    let mut config = match InstrumentConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => fail(format!("Error loading configuration '{}': {}", config_path.display(), e)),
    };
    if let Some(bpm) = override_bpm {
        if let Err(e) = config.set_tempo(bpm) {
            fail(format!("Error overriding tempo: {}", e));
        }
    }

    if show_config {
        print!("{}", config.summary());
        for problem in config.problems() {
            println!("Warning: {}", problem);
        }
        return;
    }

    let text = match (sequence, song_file) {
        (Some(text), None) => text,
        (None, Some(path)) => match read_song_file(&path) {
            Ok(text) => text,
            Err(e) => fail(format!("Error reading song file '{}': {}", path.display(), e)),
        },
        _ => fail(format!("Exactly one of --sequence or --song-file is required\n\n{}", USAGE)),
    };

    let root = config_path.parent().unwrap_or(Path::new("."));
    let store = JsonEpisodeStore::new(root);
    let actuator = Arc::new(SimulatedActuator::zeroed(JOINT_COUNT));
    let (session, handle) = match Session::new(
        actuator,
        Arc::new(SystemClock::new()),
        config.playback.clone(),
    ) {
        Ok(pair) => pair,
        Err(e) => fail(format!("Invalid playback settings: {}", e)),
    };
    let player = SongPlayer::new(&session, &config, &store);

    if dry_run {
        match player.dry_run(&text, &options) {
            Ok(preview) => print!("{}", preview),
            Err(e) => fail(format!("Dry run failed: {}", e)),
        }
        return;
    }

    let song = match player.prepare(&text, &options) {
        Ok(song) => song,
        Err(e) => fail(e),
    };
    print!("{}", song.program.render_preview(options.tempo_multiplier));

    spawn_keyboard(handle);
    match player.perform(&song, &options) {
        Ok(report) => print_report(&report),
        Err(e) => fail(format!("Playback error: {}", e)),
    }
}

fn print_report(report: &SongReport) {
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }
    for (i, chord) in report.chords.iter().enumerate() {
        for note in chord.failures() {
            if let Err(e) = &note.result {
                println!("Action {}: note {} failed: {}", i + 1, note.note, e);
            }
        }
    }
    match report.outcome {
        Outcome::Completed => println!(
            "Played {} action(s), {} failed note(s)",
            report.chords.len(),
            report.failed_notes()
        ),
        Outcome::Cancelled => println!("Cancelled after {} action(s)", report.chords.len()),
    }
}

fn replay(args: &[String]) {
    let path = PathBuf::from(&args[0]);
    let mut speed = 1.0;
    let mut skip_transition = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--speed" => speed = bounded(value(args, &mut i, "--speed"), "--speed", 2.0),
            "--skip-transition" => skip_transition = true,
            other => fail(format!("Unknown option '{}'\n\n{}", other, USAGE)),
        }
        i += 1;
    }

    let store = JsonEpisodeStore::new(".");
    let episode = match store.load(&path) {
        Ok(episode) => episode,
        Err(e) => fail(format!("Error loading episode '{}': {}", path.display(), e)),
    };

    let actuator = Arc::new(SimulatedActuator::zeroed(episode.joint_count()));
    let (session, handle) = match Session::new(
        actuator,
        Arc::new(SystemClock::new()),
        PlaybackSettings::default(),
    ) {
        Ok(pair) => pair,
        Err(e) => fail(format!("Invalid playback settings: {}", e)),
    };
    spawn_keyboard(handle);

    match jointplay::replay(&session, &episode, speed, skip_transition) {
        Ok(report) => println!(
            "{:?}: {} command(s), {:.2}s of episode time, {:.2}s paused",
            report.outcome, report.commands, report.playback_seconds, report.paused_seconds
        ),
        Err(e) => fail(format!("Replay error: {}", e)),
    }
}
