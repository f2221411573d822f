use crate::audio::HandleId;
use crate::catalog::{Soundscape, Track};
use std::fmt;
use tokio::sync::oneshot;

/// Identifies one logical playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Lifecycle of the engine's playback session.
///
/// `Idle -> Loading -> Playing <-> Paused`, and any active state goes through
/// `Stopped` back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
}

/// What the current session is playing.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionTarget {
    Track(Track),
    Soundscape(Soundscape),
}

impl SessionTarget {
    pub fn id(&self) -> &str {
        match self {
            SessionTarget::Track(t) => &t.id,
            SessionTarget::Soundscape(s) => &s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SessionTarget::Track(t) => &t.name,
            SessionTarget::Soundscape(s) => &s.name,
        }
    }

    pub fn is_mix(&self) -> bool {
        matches!(self, SessionTarget::Soundscape(_))
    }
}

/// Commands that can be sent to the engine task.
#[derive(Debug)]
pub enum EngineCommand {
    PlayTrack { track_id: String, looping: bool, respond: oneshot::Sender<bool> },
    PlaySoundscape { soundscape_id: String, looping: bool, respond: oneshot::Sender<bool> },
    PlayWithTimer { track_id: String, minutes: f64, respond: oneshot::Sender<bool> },
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    SetVolume { volume: f32, respond: oneshot::Sender<f32> },
    GetSnapshot(oneshot::Sender<PlaybackSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Point-in-time copy of the engine's playback state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: SessionState,
    pub current: Option<SessionTarget>,
    pub handles: Vec<HandleId>,
    pub volume: f32,
    pub is_playing: bool,
    pub looping: bool,
    pub last_error: Option<String>,
}

/// Updates broadcast by the engine about its state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged { from: SessionState, to: SessionState },
    /// Every handle of a session started.
    Loaded { target_id: String, handles: usize },
    /// A non-looping session reached its natural end.
    Finished { target_id: String },
    /// A failure was recorded as the last error.
    Error(String),
    VolumeChanged(f32),
    /// A timed session hit its deadline and was stopped.
    TimerElapsed { target_id: String },
}
