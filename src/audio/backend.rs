use crate::audio::error::EngineError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use tokio::sync::mpsc;

/// Identifier the backend assigns to every loaded sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sound#{}", self.0)
    }
}

/// How a sound should start once loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    pub volume: f32,
    pub looping: bool,
    pub autoplay: bool,
}

/// Asynchronous notification from the backend about a loaded sound.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendStatus {
    /// A non-looping sound reached its end.
    Finished(HandleId),
    /// Decoding or output failed after the sound was loaded.
    Failed(HandleId, String),
}

impl BackendStatus {
    pub fn handle(&self) -> HandleId {
        match self {
            BackendStatus::Finished(h) | BackendStatus::Failed(h, _) => *h,
        }
    }
}

/// Where backends deliver `BackendStatus` updates.
pub type StatusSink = mpsc::UnboundedSender<BackendStatus>;

/// Trait defining an audio output backend.
///
/// Decoding and playback happen outside the engine; every control call is
/// async and the backend reports natural completion or late failures through
/// the `StatusSink` given at load time.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Loads the file at `path` and, if `options.autoplay` is set, starts it.
    async fn load(&self, path: &Path, options: LoadOptions, status: StatusSink) -> Result<Box<dyn SoundHandle>, EngineError>;
}

/// A sound loaded by an `AudioBackend`.
#[async_trait]
pub trait SoundHandle: Send + Sync {
    fn id(&self) -> HandleId;

    async fn pause(&mut self) -> Result<(), EngineError>;

    async fn resume(&mut self) -> Result<(), EngineError>;

    async fn set_volume(&mut self, volume: f32) -> Result<(), EngineError>;

    /// Stops output and releases the sound. The handle is unusable afterwards.
    async fn unload(&mut self) -> Result<(), EngineError>;
}
