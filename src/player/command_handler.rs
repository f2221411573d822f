use super::session::PlaybackSession;
use super::state::{EngineEvent, SessionId, SessionState, SessionTarget};
use super::{AudioEngine, LOG_TARGET};
use crate::audio::{AudioBackend, BackendStatus, EngineError, LoadOptions, SoundHandle, StatusSink};
use crate::cache::AudioCache;
use crate::catalog::Track;
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, error, info, instrument, trace, warn};

/// Records a failure as the engine's last error and broadcasts it.
fn record_error(engine: &mut AudioEngine, err: EngineError) {
    let message = err.to_string();
    error!(target: LOG_TARGET, "{}", message);
    engine.last_error = Some(message.clone());
    engine.broadcast(EngineEvent::Error(message));
}

/// Resolves a track through the cache and hands it to the backend.
async fn load_track(
    cache: &AudioCache,
    backend: &dyn AudioBackend,
    track: &Track,
    options: LoadOptions,
    status: StatusSink,
) -> Result<Box<dyn SoundHandle>, EngineError> {
    let path = cache.get_local_file(track).await?;
    debug!(target: LOG_TARGET, track_id = %track.id, "Loading {}", path.display());
    backend.load(&path, options, status).await
}

/// Releases the current session, if any, and returns to Idle.
pub async fn stop_session(engine: &mut AudioEngine) {
    match engine.session.take() {
        Some(session) => {
            info!(target: LOG_TARGET, session = %session.id(), target_id = %session.target().id(), "Stopping playback.");
            engine.set_state(SessionState::Stopped);
            session.release().await;
            engine.set_state(SessionState::Idle);
        }
        None => engine.set_state(SessionState::Idle),
    }
}

#[instrument(skip(engine))]
pub async fn handle_play_track(engine: &mut AudioEngine, track_id: &str, looping: bool) -> bool {
    engine.last_error = None;
    stop_session(engine).await;

    let resolved = engine.catalog.resolve_alias(track_id).to_string();
    if resolved != track_id {
        debug!(target: LOG_TARGET, "Alias '{}' resolved to '{}'", track_id, resolved);
    }
    let Some(track) = engine.catalog.track(&resolved).cloned() else {
        record_error(engine, EngineError::NotFound(format!("Track '{}'", track_id)));
        return false;
    };

    info!(target: LOG_TARGET, track_id = %track.id, looping, "Starting track '{}'.", track.name);
    engine.set_state(SessionState::Loading);

    let options = LoadOptions { volume: engine.volume, looping, autoplay: true };
    let cache = engine.cache.clone();
    let backend = engine.backend.clone();
    match load_track(&cache, backend.as_ref(), &track, options, engine.status_tx.clone()).await {
        Ok(handle) => {
            let id = engine.allocate_session_id();
            let target_id = track.id.clone();
            engine.session = Some(PlaybackSession::new(id, SessionTarget::Track(track), vec![handle], 1.0, looping));
            engine.set_state(SessionState::Playing);
            engine.broadcast(EngineEvent::Loaded { target_id, handles: 1 });
            true
        }
        Err(e) => {
            record_error(engine, e);
            engine.set_state(SessionState::Idle);
            false
        }
    }
}

#[instrument(skip(engine))]
pub async fn handle_play_soundscape(engine: &mut AudioEngine, soundscape_id: &str, looping: bool) -> bool {
    engine.last_error = None;
    stop_session(engine).await;

    let Some(soundscape) = engine.catalog.soundscape(soundscape_id).cloned() else {
        record_error(engine, EngineError::NotFound(format!("Soundscape '{}'", soundscape_id)));
        return false;
    };

    info!(target: LOG_TARGET, soundscape_id, tracks = soundscape.tracks.len(), "Starting soundscape '{}'.", soundscape.name);
    engine.set_state(SessionState::Loading);

    let gain = engine.mix_gain;
    let options = LoadOptions { volume: engine.volume * gain, looping, autoplay: true };
    let (catalog, cache, backend) = (engine.catalog.clone(), engine.cache.clone(), engine.backend.clone());
    let (cache, backend): (&AudioCache, &dyn AudioBackend) = (&cache, backend.as_ref());
    let loads = soundscape.tracks.iter().map(|track_id| {
        let track = catalog.track(track_id).cloned();
        let status = engine.status_tx.clone();
        async move {
            match track {
                Some(track) => load_track(cache, backend, &track, options, status).await,
                None => Err(EngineError::NotFound(format!("Track '{}'", track_id))),
            }
        }
    });
    let results = join_all(loads).await;

    let mut handles = Vec::with_capacity(results.len());
    for (track_id, result) in soundscape.tracks.iter().zip(results) {
        match result {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                warn!(target: LOG_TARGET, soundscape_id, track_id = %track_id, "Skipping track: {}", e);
                record_error(engine, e);
            }
        }
    }

    if handles.is_empty() {
        if engine.last_error.is_none() {
            record_error(engine, EngineError::InvalidState(format!("Soundscape '{}' has no tracks", soundscape_id)));
        }
        engine.set_state(SessionState::Idle);
        return false;
    }

    let count = handles.len();
    let id = engine.allocate_session_id();
    let target_id = soundscape.id.clone();
    engine.session = Some(PlaybackSession::new(id, SessionTarget::Soundscape(soundscape), handles, gain, looping));
    engine.set_state(SessionState::Playing);
    engine.broadcast(EngineEvent::Loaded { target_id, handles: count });
    true
}

/// Converts a timer length in minutes into a sleep duration.
fn timer_deadline(minutes: f64) -> Result<Duration, EngineError> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(EngineError::InvalidState(format!("Timer must be a positive number of minutes, got {}", minutes)));
    }
    Duration::try_from_secs_f64(minutes * 60.0)
        .map_err(|_| EngineError::InvalidState(format!("Timer of {} minutes is too long", minutes)))
}

#[instrument(skip(engine))]
pub async fn handle_play_with_timer(engine: &mut AudioEngine, track_id: &str, minutes: f64) -> bool {
    let deadline = match timer_deadline(minutes) {
        Ok(deadline) => deadline,
        Err(e) => {
            engine.last_error = None;
            record_error(engine, e);
            return false;
        }
    };

    if !handle_play_track(engine, track_id, true).await {
        return false;
    }

    let timer_tx = engine.timer_tx.clone();
    let Some(session) = engine.session.as_mut() else {
        return false;
    };
    let session_id = session.id();
    info!(target: LOG_TARGET, session = %session_id, "Stopping in {:.1} minutes.", minutes);
    session.set_timer(tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        let _ = timer_tx.send(session_id);
    }));
    true
}

pub async fn handle_timer_elapsed(engine: &mut AudioEngine, session_id: SessionId) {
    let current = engine.session.as_ref().map(|s| (s.id(), s.target().id().to_string()));
    match current {
        Some((id, target_id)) if id == session_id => {
            info!(target: LOG_TARGET, session = %session_id, "Timer elapsed.");
            stop_session(engine).await;
            engine.broadcast(EngineEvent::TimerElapsed { target_id });
        }
        _ => trace!(target: LOG_TARGET, session = %session_id, "Ignoring timer of a finished session."),
    }
}

#[instrument(skip(engine))]
pub async fn handle_pause(engine: &mut AudioEngine) {
    if engine.state != SessionState::Playing {
        debug!(target: LOG_TARGET, "Pause ignored in state {:?}.", engine.state);
        return;
    }
    let Some(session) = engine.session.as_mut() else {
        return;
    };
    let result = session.pause().await;
    engine.set_state(SessionState::Paused);
    if let Err(e) = result {
        record_error(engine, e);
    }
}

#[instrument(skip(engine))]
pub async fn handle_resume(engine: &mut AudioEngine) {
    if engine.state != SessionState::Paused {
        debug!(target: LOG_TARGET, "Resume ignored in state {:?}.", engine.state);
        return;
    }
    let Some(session) = engine.session.as_mut() else {
        return;
    };
    let result = session.resume().await;
    engine.set_state(SessionState::Playing);
    if let Err(e) = result {
        record_error(engine, e);
    }
}

#[instrument(skip(engine))]
pub async fn handle_stop(engine: &mut AudioEngine) {
    stop_session(engine).await;
}

/// Clamps and stores the global volume, then applies it to the session.
#[instrument(skip(engine))]
pub async fn handle_set_volume(engine: &mut AudioEngine, volume: f32) -> f32 {
    let clamped = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
    engine.volume = clamped;
    let result = match engine.session.as_mut() {
        Some(session) => session.apply_volume(clamped).await,
        None => Ok(()),
    };
    if let Err(e) = result {
        record_error(engine, e);
    }
    engine.broadcast(EngineEvent::VolumeChanged(clamped));
    clamped
}

/// Reacts to completion or failure reported by the backend.
pub async fn handle_backend_status(engine: &mut AudioEngine, status: BackendStatus) {
    let handle = status.handle();
    let Some(session) = engine.session.as_mut() else {
        trace!(target: LOG_TARGET, %handle, "Status for a released sound ignored.");
        return;
    };
    if !session.owns(handle) {
        trace!(target: LOG_TARGET, %handle, "Status for a stale sound ignored.");
        return;
    }

    match status {
        BackendStatus::Finished(_) => {
            debug!(target: LOG_TARGET, %handle, "Sound finished.");
            session.release_handle(handle).await;
            if session.is_empty() {
                let target_id = session.target().id().to_string();
                info!(target: LOG_TARGET, target_id = %target_id, "Playback finished.");
                stop_session(engine).await;
                engine.broadcast(EngineEvent::Finished { target_id });
            }
        }
        BackendStatus::Failed(_, message) => {
            session.release_handle(handle).await;
            let emptied = session.is_empty();
            record_error(engine, EngineError::Playback(format!("{}: {}", handle, message)));
            if emptied {
                stop_session(engine).await;
            }
        }
    }
}
