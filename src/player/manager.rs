use super::state::{EngineCommand, EngineEvent, PlaybackSnapshot, SessionState, SessionTarget};
use super::{AudioEngine, LOG_TARGET};
use crate::audio::{AudioBackend, ProceduralGenerator};
use crate::cache::AudioCache;
use crate::catalog::{Catalog, Category, Soundscape, Track};
use crate::config::{ConfigError, Settings};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

const ENGINE_GONE: &str = "Audio engine is not running";

/// Cloneable handle to a running [`AudioEngine`].
///
/// None of the playback methods fail: play requests report success as a
/// `bool`, and the reason for a failure is available from
/// [`AudioManager::last_error`].
#[derive(Clone)]
pub struct AudioManager {
    command_tx: mpsc::Sender<EngineCommand>,
    event_tx: broadcast::Sender<EngineEvent>,
    catalog: Arc<Catalog>,
}

impl AudioManager {
    pub(super) fn new(command_tx: mpsc::Sender<EngineCommand>, event_tx: broadcast::Sender<EngineEvent>, catalog: Arc<Catalog>) -> Self {
        AudioManager { command_tx, event_tx, catalog }
    }

    /// Builds the catalog, generator and cache described by `settings` and
    /// spawns an engine on the current runtime.
    pub fn start(settings: &Settings, backend: Arc<dyn AudioBackend>) -> Result<Self, ConfigError> {
        settings.validate()?;
        let catalog = match &settings.catalog_path {
            Some(path) => Catalog::load(path)?,
            None => Catalog::builtin(),
        };
        let generator = match settings.generator_seed {
            Some(seed) => ProceduralGenerator::with_seed(seed),
            None => ProceduralGenerator::new(),
        };
        let cache = AudioCache::new(&settings.cache_dir, Arc::new(generator))
            .with_render_params(settings.sample_rate, settings.loop_seconds);

        let (engine, manager) = AudioEngine::new(settings, Arc::new(catalog), Arc::new(cache), backend);
        engine.spawn();
        info!(target: LOG_TARGET, cache_dir = %settings.cache_dir.display(), "Audio engine started.");
        Ok(manager)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(build(tx)).await.is_err() {
            warn!(target: LOG_TARGET, "{}.", ENGINE_GONE);
            return None;
        }
        rx.await.ok()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn available_tracks(&self, category: Option<Category>, premium: Option<bool>) -> Vec<Track> {
        self.catalog.filter_tracks(category, premium)
    }

    pub fn available_soundscapes(&self, category: Option<Category>, premium: Option<bool>) -> Vec<Soundscape> {
        self.catalog.filter_soundscapes(category, premium)
    }

    /// Maps a friendly alias to its track id; unknown names pass through.
    pub fn resolve_alias(&self, name: &str) -> String {
        self.catalog.resolve_alias(name).to_string()
    }

    /// Stops whatever is playing and starts `track_id` (or an alias of it).
    pub async fn play_track(&self, track_id: &str, looping: bool) -> bool {
        let track_id = track_id.to_string();
        self.request(|respond| EngineCommand::PlayTrack { track_id, looping, respond }).await.unwrap_or(false)
    }

    /// Stops whatever is playing and starts every track of the soundscape together.
    pub async fn play_soundscape(&self, soundscape_id: &str, looping: bool) -> bool {
        let soundscape_id = soundscape_id.to_string();
        self.request(|respond| EngineCommand::PlaySoundscape { soundscape_id, looping, respond })
            .await
            .unwrap_or(false)
    }

    /// Loops `track_id` and stops it after `minutes`.
    pub async fn play_with_timer(&self, track_id: &str, minutes: f64) -> bool {
        let track_id = track_id.to_string();
        self.request(|respond| EngineCommand::PlayWithTimer { track_id, minutes, respond }).await.unwrap_or(false)
    }

    pub async fn pause(&self) {
        self.request(EngineCommand::Pause).await;
    }

    pub async fn resume(&self) {
        self.request(EngineCommand::Resume).await;
    }

    pub async fn stop(&self) {
        self.request(EngineCommand::Stop).await;
    }

    /// Sets the global volume, clamped to `[0, 1]`.
    pub async fn set_volume(&self, volume: f32) {
        self.request(|respond| EngineCommand::SetVolume { volume, respond }).await;
    }

    pub async fn snapshot(&self) -> Option<PlaybackSnapshot> {
        self.request(EngineCommand::GetSnapshot).await
    }

    pub async fn volume(&self) -> f32 {
        self.snapshot().await.map_or(0.0, |s| s.volume)
    }

    pub async fn state(&self) -> SessionState {
        self.snapshot().await.map_or(SessionState::Idle, |s| s.state)
    }

    pub async fn is_playing(&self) -> bool {
        self.snapshot().await.is_some_and(|s| s.is_playing)
    }

    pub async fn current_track(&self) -> Option<SessionTarget> {
        self.snapshot().await.and_then(|s| s.current)
    }

    pub async fn last_error(&self) -> Option<String> {
        match self.snapshot().await {
            Some(snapshot) => snapshot.last_error,
            None => Some(ENGINE_GONE.to_string()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Stops playback and ends the engine task. Other clones stop working.
    pub async fn shutdown(&self) {
        self.request(EngineCommand::Shutdown).await;
    }
}
