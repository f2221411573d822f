use std::error::Error;
use std::io;

/// Error types produced anywhere inside the engine.
///
/// None of these cross the `AudioManager` boundary; the facade turns them into
/// a `false` return plus the message retrievable through `last_error()`.
#[derive(Debug)]
pub enum EngineError {
    /// Invalid waveform kind or synthesis failure.
    Generation(String),
    /// Cache directory or file could not be created, read or written.
    Io(io::Error),
    /// Backend load/decode/session failure.
    Playback(String),
    /// Unknown track or soundscape id.
    NotFound(String),
    InvalidState(String),
    TaskJoin(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Generation(e) => write!(f, "Generation error: {}", e),
            EngineError::Io(e) => write!(f, "I/O error: {}", e),
            EngineError::Playback(e) => write!(f, "Playback error: {}", e),
            EngineError::NotFound(e) => write!(f, "Not found: {}", e),
            EngineError::InvalidState(s) => write!(f, "Invalid state: {}", s),
            EngineError::TaskJoin(e) => write!(f, "Async task join error: {}", e),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::TaskJoin(e.to_string())
    }
}
