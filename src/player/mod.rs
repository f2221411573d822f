//! Playback engine: a single task owning the session, driven by commands.

use crate::audio::{AudioBackend, BackendStatus, StatusSink};
use crate::cache::AudioCache;
use crate::catalog::Catalog;
use crate::config::Settings;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

mod command_handler;
mod manager;
mod run_loop;
mod session;
mod state;

pub use manager::AudioManager;
pub use session::PlaybackSession;
pub use state::{EngineCommand, EngineEvent, PlaybackSnapshot, SessionId, SessionState, SessionTarget};

const LOG_TARGET: &str = "soundscape_engine::player";

/// Owns all playback state. Run it with [`AudioEngine::spawn`] and talk to it
/// through the [`AudioManager`] returned by [`AudioEngine::new`].
pub struct AudioEngine {
    // --- Collaborators ---
    catalog: Arc<Catalog>,
    cache: Arc<AudioCache>,
    backend: Arc<dyn AudioBackend>,
    mix_gain: f32,

    // --- State ---
    state: SessionState,
    volume: f32,
    session: Option<PlaybackSession>,
    last_error: Option<String>,
    next_session_id: u64,

    // --- Communication ---
    command_rx: mpsc::Receiver<EngineCommand>,
    event_tx: broadcast::Sender<EngineEvent>,
    status_tx: StatusSink,
    status_rx: mpsc::UnboundedReceiver<BackendStatus>,
    timer_tx: mpsc::UnboundedSender<SessionId>,
    timer_rx: mpsc::UnboundedReceiver<SessionId>,
}

impl AudioEngine {
    /// Creates an engine and the facade used to control it.
    pub fn new(settings: &Settings, catalog: Arc<Catalog>, cache: Arc<AudioCache>, backend: Arc<dyn AudioBackend>) -> (Self, AudioManager) {
        let (command_tx, command_rx) = mpsc::channel(settings.command_buffer_size.max(1));
        let (event_tx, _) = broadcast::channel(settings.event_capacity.max(1));
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let engine = AudioEngine {
            catalog: catalog.clone(),
            cache,
            backend,
            mix_gain: settings.mix_gain,
            state: SessionState::Idle,
            volume: settings.initial_volume.clamp(0.0, 1.0),
            session: None,
            last_error: None,
            next_session_id: 1,
            command_rx,
            event_tx: event_tx.clone(),
            status_tx,
            status_rx,
            timer_tx,
            timer_rx,
        };
        let manager = AudioManager::new(command_tx, event_tx, catalog);
        (engine, manager)
    }

    /// Moves the engine onto its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut engine = self;
            engine.run().await;
        })
    }

    /// Processes commands until shutdown or until every facade is dropped.
    #[instrument(skip(self))]
    pub async fn run(&mut self) {
        run_loop::run_engine_loop(self).await;
    }

    fn broadcast(&self, event: EngineEvent) {
        trace!(target: LOG_TARGET, "Broadcasting event: {:?}", event);
        if self.event_tx.send(event).is_err() {
            debug!(target: LOG_TARGET, "No active listeners for engine event.");
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        let from = std::mem::replace(&mut self.state, next);
        debug!(target: LOG_TARGET, "State {:?} -> {:?}", from, next);
        self.broadcast(EngineEvent::StateChanged { from, to: next });
    }

    fn allocate_session_id(&mut self) -> SessionId {
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        id
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            current: self.session.as_ref().map(|s| s.target().clone()),
            handles: self.session.as_ref().map(|s| s.handle_ids()).unwrap_or_default(),
            volume: self.volume,
            is_playing: self.state == SessionState::Playing,
            looping: self.session.as_ref().is_some_and(|s| s.is_looping()),
            last_error: self.last_error.clone(),
        }
    }
}
