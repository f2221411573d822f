//! Headless backend that plays sounds against the tokio clock.
//!
//! Nothing reaches a sound card: each loaded file is validated, its duration is
//! taken from the WAV header and a timer task stands in for the output device.
//! Every control call is recorded, which makes the backend usable both on
//! machines without audio hardware and as an inspectable fake.

use crate::audio::backend::{AudioBackend, BackendStatus, HandleId, LoadOptions, SoundHandle, StatusSink};
use crate::audio::error::EngineError;
use crate::audio::wav::{WavHeader, HEADER_LEN};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

const LOG_TARGET: &str = "soundscape_engine::audio::virtual_backend";

/// A control call observed by the backend, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Load { handle: HandleId, path: PathBuf, volume: f32, looping: bool },
    Pause(HandleId),
    Resume(HandleId),
    SetVolume(HandleId, f32),
    Unload(HandleId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ClockControl {
    paused: bool,
    unloaded: bool,
}

struct Voice {
    path: PathBuf,
    volume: f32,
    paused: bool,
    status: StatusSink,
}

#[derive(Default)]
struct Registry {
    calls: Vec<BackendCall>,
    voices: HashMap<HandleId, Voice>,
    failing_patterns: Vec<String>,
}

#[derive(Default)]
pub struct VirtualBackend {
    registry: Arc<Mutex<Registry>>,
    next_id: AtomicU64,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `load` of a path containing `pattern` fail.
    pub fn fail_loads_matching(&self, pattern: &str) {
        lock(&self.registry).failing_patterns.push(pattern.to_string());
    }

    /// Reports a runtime failure for a loaded sound, as a decoder would.
    /// Returns false if the handle is not loaded.
    pub fn inject_failure(&self, handle: HandleId, message: &str) -> bool {
        let registry = lock(&self.registry);
        match registry.voices.get(&handle) {
            Some(voice) => voice.status.send(BackendStatus::Failed(handle, message.to_string())).is_ok(),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.registry).calls.clone()
    }

    pub fn load_count(&self) -> usize {
        lock(&self.registry).calls.iter().filter(|c| matches!(c, BackendCall::Load { .. })).count()
    }

    pub fn unload_count(&self) -> usize {
        lock(&self.registry).calls.iter().filter(|c| matches!(c, BackendCall::Unload(_))).count()
    }

    /// Handles that are loaded and not yet unloaded, lowest id first.
    pub fn active_handles(&self) -> Vec<HandleId> {
        let mut handles: Vec<HandleId> = lock(&self.registry).voices.keys().copied().collect();
        handles.sort();
        handles
    }

    pub fn path_of(&self, handle: HandleId) -> Option<PathBuf> {
        lock(&self.registry).voices.get(&handle).map(|v| v.path.clone())
    }

    pub fn volume_of(&self, handle: HandleId) -> Option<f32> {
        lock(&self.registry).voices.get(&handle).map(|v| v.volume)
    }

    pub fn is_paused(&self, handle: HandleId) -> Option<bool> {
        lock(&self.registry).voices.get(&handle).map(|v| v.paused)
    }
}

#[async_trait]
impl AudioBackend for VirtualBackend {
    async fn load(&self, path: &Path, options: LoadOptions, status: StatusSink) -> Result<Box<dyn SoundHandle>, EngineError> {
        let path_str = path.to_string_lossy().into_owned();
        if lock(&self.registry).failing_patterns.iter().any(|p| path_str.contains(p.as_str())) {
            warn!(target: LOG_TARGET, "Refusing to load {} (configured failure).", path_str);
            return Err(EngineError::Playback(format!("Failed to load {}: decoder rejected the file", path_str)));
        }

        let header = read_header(path).await?;
        let duration = Duration::from_secs_f64(header.duration_secs());
        let id = HandleId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        {
            let mut registry = lock(&self.registry);
            registry.calls.push(BackendCall::Load {
                handle: id,
                path: path.to_path_buf(),
                volume: options.volume,
                looping: options.looping,
            });
            registry.voices.insert(
                id,
                Voice {
                    path: path.to_path_buf(),
                    volume: options.volume,
                    paused: !options.autoplay,
                    status: status.clone(),
                },
            );
        }

        let (control_tx, control_rx) = watch::channel(ClockControl {
            paused: !options.autoplay,
            unloaded: false,
        });
        let clock = tokio::spawn(run_clock(id, duration, options.looping, control_rx, status));
        info!(target: LOG_TARGET, handle = %id, "Loaded {} ({:.2}s, looping={}).", path_str, duration.as_secs_f64(), options.looping);

        Ok(Box::new(VirtualSound {
            id,
            control: control_tx,
            registry: self.registry.clone(),
            clock,
            unloaded: false,
        }))
    }
}

struct VirtualSound {
    id: HandleId,
    control: watch::Sender<ClockControl>,
    registry: Arc<Mutex<Registry>>,
    clock: JoinHandle<()>,
    unloaded: bool,
}

impl VirtualSound {
    fn ensure_loaded(&self) -> Result<(), EngineError> {
        if self.unloaded {
            return Err(EngineError::InvalidState(format!("{} is already unloaded", self.id)));
        }
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        self.control.send_modify(|c| c.paused = paused);
        let mut registry = lock(&self.registry);
        registry.calls.push(if paused { BackendCall::Pause(self.id) } else { BackendCall::Resume(self.id) });
        if let Some(voice) = registry.voices.get_mut(&self.id) {
            voice.paused = paused;
        }
    }
}

#[async_trait]
impl SoundHandle for VirtualSound {
    fn id(&self) -> HandleId {
        self.id
    }

    async fn pause(&mut self) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        self.set_paused(true);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        self.set_paused(false);
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        let mut registry = lock(&self.registry);
        registry.calls.push(BackendCall::SetVolume(self.id, volume));
        if let Some(voice) = registry.voices.get_mut(&self.id) {
            voice.volume = volume;
        }
        Ok(())
    }

    async fn unload(&mut self) -> Result<(), EngineError> {
        if self.unloaded {
            return Ok(());
        }
        self.unloaded = true;
        self.control.send_modify(|c| c.unloaded = true);
        {
            let mut registry = lock(&self.registry);
            registry.calls.push(BackendCall::Unload(self.id));
            registry.voices.remove(&self.id);
        }
        debug!(target: LOG_TARGET, handle = %self.id, "Unloaded.");
        Ok(())
    }
}

impl Drop for VirtualSound {
    fn drop(&mut self) {
        if !self.unloaded {
            trace!(target: LOG_TARGET, handle = %self.id, "Dropped without unload; releasing voice.");
            lock(&self.registry).voices.remove(&self.id);
        }
        self.clock.abort();
    }
}

/// Waits out the sound's duration, freezing while paused, and reports the end.
async fn run_clock(
    id: HandleId,
    duration: Duration,
    looping: bool,
    mut control: watch::Receiver<ClockControl>,
    status: StatusSink,
) {
    let mut remaining = duration;
    loop {
        let state = *control.borrow_and_update();
        if state.unloaded {
            return;
        }
        if looping || state.paused {
            if control.changed().await.is_err() {
                return;
            }
            continue;
        }

        let started = Instant::now();
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {
                trace!(target: LOG_TARGET, handle = %id, "Reached end of sound.");
                let _ = status.send(BackendStatus::Finished(id));
                return;
            }
            changed = control.changed() => {
                if changed.is_err() {
                    return;
                }
                remaining = remaining.saturating_sub(started.elapsed());
            }
        }
    }
}

async fn read_header(path: &Path) -> Result<WavHeader, EngineError> {
    let load_error = |e: std::io::Error| EngineError::Playback(format!("Failed to load {}: {}", path.display(), e));
    let mut file = tokio::fs::File::open(path).await.map_err(load_error)?;
    let len = file.metadata().await.map_err(load_error)?.len();
    let mut buf = [0u8; HEADER_LEN];
    file.read_exact(&mut buf).await.map_err(load_error)?;

    let header = WavHeader::parse(&buf)?;
    if header.file_len() > len {
        return Err(EngineError::Playback(format!(
            "Failed to load {}: file is truncated ({} of {} bytes)",
            path.display(),
            len,
            header.file_len()
        )));
    }
    Ok(header)
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
