//! Sample synthesis, WAV/base64 codecs and playback backends

pub mod backend;
pub mod base64;
mod error;
pub mod generator;
pub mod virtual_backend;
pub mod wav;
#[cfg(feature = "alsa")]
pub mod alsa_backend;

pub use backend::{AudioBackend, BackendStatus, HandleId, LoadOptions, SoundHandle, StatusSink};
pub use error::EngineError;
pub use generator::{ProceduralGenerator, SampleGenerator, WaveformKind, DEFAULT_SAMPLE_RATE};
pub use virtual_backend::{BackendCall, VirtualBackend};
pub use wav::WavHeader;
#[cfg(feature = "alsa")]
pub use alsa_backend::AlsaBackend;
