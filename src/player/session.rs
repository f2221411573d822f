use super::state::{SessionId, SessionTarget};
use super::LOG_TARGET;
use crate::audio::{EngineError, HandleId, SoundHandle};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The sounds started by one play request, plus its optional stop timer.
///
/// A single track owns one handle; a soundscape owns one handle per
/// playable track, each scaled by the mix gain.
pub struct PlaybackSession {
    id: SessionId,
    target: SessionTarget,
    handles: Vec<Box<dyn SoundHandle>>,
    gain: f32,
    looping: bool,
    timer: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    pub fn new(id: SessionId, target: SessionTarget, handles: Vec<Box<dyn SoundHandle>>, gain: f32, looping: bool) -> Self {
        PlaybackSession { id, target, handles, gain, looping, timer: None }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handle_ids(&self) -> Vec<HandleId> {
        self.handles.iter().map(|h| h.id()).collect()
    }

    pub fn owns(&self, handle: HandleId) -> bool {
        self.handles.iter().any(|h| h.id() == handle)
    }

    /// Arms the stop timer, replacing (and aborting) any previous one.
    pub fn set_timer(&mut self, timer: JoinHandle<()>) {
        if let Some(old) = self.timer.replace(timer) {
            old.abort();
        }
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Pauses every handle. All handles are attempted; the first error is returned.
    pub async fn pause(&mut self) -> Result<(), EngineError> {
        let mut first_error = None;
        for handle in self.handles.iter_mut() {
            if let Err(e) = handle.pause().await {
                warn!(target: LOG_TARGET, handle = %handle.id(), "Pause failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub async fn resume(&mut self) -> Result<(), EngineError> {
        let mut first_error = None;
        for handle in self.handles.iter_mut() {
            if let Err(e) = handle.resume().await {
                warn!(target: LOG_TARGET, handle = %handle.id(), "Resume failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Sets every handle to `volume` scaled by the session gain.
    pub async fn apply_volume(&mut self, volume: f32) -> Result<(), EngineError> {
        let effective = volume * self.gain;
        let mut first_error = None;
        for handle in self.handles.iter_mut() {
            if let Err(e) = handle.set_volume(effective).await {
                warn!(target: LOG_TARGET, handle = %handle.id(), "Volume change failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Unloads and forgets one handle. Returns false if the session does not own it.
    pub async fn release_handle(&mut self, handle: HandleId) -> bool {
        let Some(index) = self.handles.iter().position(|h| h.id() == handle) else {
            return false;
        };
        let mut sound = self.handles.remove(index);
        if let Err(e) = sound.unload().await {
            warn!(target: LOG_TARGET, %handle, "Unload failed: {}", e);
        }
        true
    }

    /// Cancels the timer and unloads every handle.
    pub async fn release(mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        for mut sound in self.handles.drain(..) {
            let handle = sound.id();
            if let Err(e) = sound.unload().await {
                warn!(target: LOG_TARGET, %handle, "Unload failed: {}", e);
            }
        }
        debug!(target: LOG_TARGET, session = %self.id, "Session released.");
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
