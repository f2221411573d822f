//! Engine settings and configuration management

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Highest accepted render sample rate.
pub const MAX_SAMPLE_RATE: u32 = 384_000;
/// Longest accepted rendered loop body, in seconds.
pub const MAX_LOOP_SECONDS: f64 = 600.0;

/// Engine settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding the `audio_gen` render cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Global volume applied when the engine starts
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,
    /// Sample rate of rendered audio
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Length of the rendered loop body in seconds
    #[serde(default = "default_loop_seconds")]
    pub loop_seconds: f64,
    /// Gain applied to each track of a soundscape mix
    #[serde(default = "default_mix_gain")]
    pub mix_gain: f32,
    /// Seed for noise rendering; `None` renders fresh noise every time
    #[serde(default = "default_generator_seed")]
    pub generator_seed: Option<u64>,
    /// Optional JSON catalog replacing the built-in registry
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    /// ALSA device used by the `alsa` feature's backend
    #[serde(default = "default_alsa_device")]
    pub alsa_device: String,
    /// Capacity of the engine's command channel
    #[serde(default = "default_command_buffer_size")]
    pub command_buffer_size: usize,
    /// Capacity of the engine's event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("soundscape-engine")
}

fn default_initial_volume() -> f32 {
    0.7
}

fn default_sample_rate() -> u32 {
    crate::audio::DEFAULT_SAMPLE_RATE
}

fn default_loop_seconds() -> f64 {
    crate::cache::DEFAULT_LOOP_SECONDS
}

fn default_mix_gain() -> f32 {
    0.7
}

fn default_generator_seed() -> Option<u64> {
    Some(0x5EED_A0D1)
}

fn default_alsa_device() -> String {
    "default".to_string()
}

fn default_command_buffer_size() -> usize {
    32
}

fn default_event_capacity() -> usize {
    64
}

/// Error types for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    ParseError(String),
    ValidationError(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigError::ParseError(s) => write!(f, "Parse error: {}", s),
            ConfigError::ValidationError(s) => write!(f, "Validation error: {}", s),
        }
    }
}

impl Error for ConfigError {}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            cache_dir: default_cache_dir(),
            initial_volume: default_initial_volume(),
            sample_rate: default_sample_rate(),
            loop_seconds: default_loop_seconds(),
            mix_gain: default_mix_gain(),
            generator_seed: default_generator_seed(),
            catalog_path: None,
            alsa_device: default_alsa_device(),
            command_buffer_size: default_command_buffer_size(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("soundscape-engine").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError("Cache directory cannot be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(ConfigError::ValidationError(format!(
                "Initial volume must be within [0, 1], got {}",
                self.initial_volume
            )));
        }
        if !(0.0..=1.0).contains(&self.mix_gain) {
            return Err(ConfigError::ValidationError(format!("Mix gain must be within [0, 1], got {}", self.mix_gain)));
        }
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(ConfigError::ValidationError(format!(
                "Sample rate must be within 1..={} Hz, got {}",
                MAX_SAMPLE_RATE, self.sample_rate
            )));
        }
        if !self.loop_seconds.is_finite() || self.loop_seconds <= 0.0 || self.loop_seconds > MAX_LOOP_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "Loop length must be within (0, {}] seconds, got {}",
                MAX_LOOP_SECONDS, self.loop_seconds
            )));
        }
        if self.alsa_device.trim().is_empty() {
            return Err(ConfigError::ValidationError("ALSA device name cannot be empty".to_string()));
        }
        if self.command_buffer_size == 0 || self.event_capacity == 0 {
            return Err(ConfigError::ValidationError("Channel capacities must be non-zero".to_string()));
        }
        Ok(())
    }
}
