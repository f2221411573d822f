//! soundscape-engine: procedurally generated ambient audio with a cached,
//! single-session playback engine.

pub mod audio;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod player;

pub use audio::{AudioBackend, EngineError, ProceduralGenerator, VirtualBackend, WaveformKind};
pub use catalog::{Catalog, Category, Soundscape, Track};
pub use config::{ConfigError, Settings};
pub use player::{AudioEngine, AudioManager, EngineEvent, PlaybackSnapshot, SessionState, SessionTarget};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable selecting JSON log output when set to `json`.
pub const LOG_FORMAT_ENV: &str = "SOUNDSCAPE_LOG_FORMAT";

/// Installs a global tracing subscriber filtered by `RUST_LOG`
/// (default `soundscape_engine=info`).
///
/// Returns false if a subscriber was already installed.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("soundscape_engine=info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    result.is_ok()
}
