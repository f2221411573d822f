//! On-disk cache of rendered track audio
//!
//! Each track renders to `<cache_dir>/audio_gen/<track id>.wav` the first time it
//! is requested. Later requests reuse the file as long as its header is intact.

use crate::audio::wav::{self, WavHeader, HEADER_LEN};
use crate::audio::{base64, EngineError, SampleGenerator, DEFAULT_SAMPLE_RATE};
use crate::catalog::Track;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;


const LOG_TARGET: &str = "soundscape_engine::cache";

pub const CACHE_SUBDIR: &str = "audio_gen";

/// Length of the rendered loop body. Tracks advertise much longer nominal
/// durations and are looped by the player to fill them.
pub const DEFAULT_LOOP_SECONDS: f64 = 5.0;

pub struct AudioCache {
    root: PathBuf,
    generator: Arc<dyn SampleGenerator>,
    sample_rate: u32,
    loop_seconds: f64,
    // One async lock per track id, held across check-generate-write.
    generation_locks: Mutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl AudioCache {
    /// Creates a cache rooted at `cache_dir/audio_gen`.
    pub fn new(cache_dir: impl AsRef<Path>, generator: Arc<dyn SampleGenerator>) -> Self {
        AudioCache {
            root: cache_dir.as_ref().join(CACHE_SUBDIR),
            generator,
            sample_rate: DEFAULT_SAMPLE_RATE,
            loop_seconds: DEFAULT_LOOP_SECONDS,
            generation_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_render_params(mut self, sample_rate: u32, loop_seconds: f64) -> Self {
        self.sample_rate = sample_rate;
        self.loop_seconds = loop_seconds;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.root
    }

    /// Deterministic location of a track's rendered file.
    pub fn path_for(&self, track_id: &str) -> PathBuf {
        self.root.join(format!("{}.wav", track_id))
    }

    /// Creates `path` and its parents if missing.
    pub async fn ensure_directory(path: &Path) -> Result<(), EngineError> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    /// Returns the rendered file for `track`, generating it on first use.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn get_local_file(&self, track: &Track) -> Result<PathBuf, EngineError> {
        validate_track_id(&track.id)?;
        let path = self.path_for(&track.id);

        let lock = self.generation_lock(&track.id);
        let _guard = lock.lock().await;

        Self::ensure_directory(&self.root).await?;
        if is_intact(&path).await {
            debug!(target: LOG_TARGET, "Cache hit: {}", path.display());
            return Ok(path);
        }

        info!(target: LOG_TARGET, "Rendering {} ({}, {}s loop body)", track.id, track.waveform, self.loop_seconds);
        let generator = self.generator.clone();
        let kind = track.waveform;
        let (rate, seconds) = (self.sample_rate, self.loop_seconds);
        let text = tokio::task::spawn_blocking(move || -> Result<String, EngineError> {
            let samples = generator.generate(kind, seconds, rate)?;
            let bytes = wav::encode(&samples, rate)?;
            Ok(base64::encode(&bytes))
        })
        .await??;

        write_base64_file(&path, &text).await?;
        debug!(target: LOG_TARGET, "Cached {} ({} base64 chars)", path.display(), text.len());
        Ok(path)
    }

    /// Deletes every rendered file. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<usize, EngineError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "wav") {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        info!(target: LOG_TARGET, "Cleared {} cached files from {}", removed, self.root.display());
        Ok(removed)
    }

    fn generation_lock(&self, track_id: &str) -> Arc<TokioMutex<()>> {
        let mut locks = self.generation_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(track_id.to_string()).or_default().clone()
    }
}

fn validate_track_id(id: &str) -> Result<(), EngineError> {
    let usable = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0']);
    if usable {
        Ok(())
    } else {
        Err(EngineError::InvalidState(format!("Track id {:?} cannot be used as a cache file name", id)))
    }
}

/// True if `path` holds a complete WAV file whose header matches its length.
async fn is_intact(path: &Path) -> bool {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(_) => return false,
    };
    let len = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(_) => return false,
    };
    let mut header = [0u8; HEADER_LEN];
    if file.read_exact(&mut header).await.is_err() {
        warn!(target: LOG_TARGET, "Cached file {} is truncated; regenerating.", path.display());
        return false;
    }
    match WavHeader::parse(&header) {
        Ok(parsed) if parsed.file_len() == len => true,
        Ok(parsed) => {
            warn!(target: LOG_TARGET, "Cached file {} has {} bytes, header expects {}; regenerating.", path.display(), len, parsed.file_len());
            false
        }
        Err(e) => {
            warn!(target: LOG_TARGET, "Cached file {} is corrupt ({}); regenerating.", path.display(), e);
            false
        }
    }
}

/// Persists base64 `text` as the binary file it encodes.
///
/// The bytes go to a uniquely named sibling file first and are renamed into
/// place, so readers never see a partial file.
async fn write_base64_file(path: &Path, text: &str) -> Result<(), EngineError> {
    let bytes = base64::decode(text)?;
    let tmp = path.with_extension(format!("{}.part", Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
