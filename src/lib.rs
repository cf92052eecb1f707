pub mod chord;
pub mod config;
pub mod episode;
pub mod error;
pub mod joints;
pub mod motion;
pub mod preflight;
pub mod sequence;
pub mod session;
pub mod song;
pub mod tempo;

pub use chord::{ChordReport, ChordScheduler, NoteReport};
pub use config::{InstrumentConfig, NoteEntry, PlaybackSettings};
pub use episode::{Episode, EpisodeMetadata, EpisodeStore, JsonEpisodeStore, MemoryEpisodeStore};
pub use error::*;
pub use joints::{JointSubset, JOINT_COUNT, JOINT_NAMES};
pub use motion::{
    pose_at, smooth_ratio, Actuator, Clock, JointState, ManualClock, Outcome, Phase,
    PlaybackController, PlaybackOptions, PlaybackTimeline, RunReport, Sample, SerializedActuator,
    SimulatedActuator, SystemClock, TrajectorySampler, TransitionPlanner,
};
pub use preflight::{EpisodeCache, Preflight};
pub use sequence::{
    compile, join_song_lines, read_song_file, ChordAction, CompileWarning, Hand, NoteAction,
    PreviewRow, SequenceParser, SequenceProgram,
};
pub use session::{ControlHandle, ControlLease, ControlSignal, ControlState, Session};
pub use song::{PreparedSong, SongOptions, SongPlayer, SongReport};
pub use tempo::{TempoModel, TimeSignature};

/// Replay a single episode on `session`.
/// This is the stand-alone entry point; songs go through [`SongPlayer`].
pub fn replay(
    session: &Session,
    episode: &Episode,
    speed: f64,
    skip_transition: bool,
) -> Result<RunReport, PlaybackError> {
    let lease = session.claim()?;
    let options = PlaybackOptions::new(speed, lease.settings().transition_seconds)
        .skip_transition(skip_transition);
    log::info!(
        "Replaying {} ({} frames, {:.2}s at {}x)",
        episode.metadata().episode_id,
        episode.len(),
        episode.duration(),
        speed
    );
    PlaybackController::new(&lease, episode, options).run()
}
