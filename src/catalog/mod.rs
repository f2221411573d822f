//! Track and soundscape registries plus the alias table

use crate::audio::WaveformKind;
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};


const LOG_TARGET: &str = "soundscape_engine::catalog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Nature,
    Ambient,
    Meditation,
    Focus,
    Sleep,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Nature => "nature",
            Category::Ambient => "ambient",
            Category::Meditation => "meditation",
            Category::Focus => "focus",
            Category::Sleep => "sleep",
        };
        f.write_str(name)
    }
}

/// A single procedurally rendered sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(alias = "generator")]
    pub waveform: WaveformKind,
    /// Advertised length in seconds; playback loops a shorter rendered body.
    pub duration: u32,
    pub category: Category,
    pub description: String,
    #[serde(default)]
    pub premium: bool,
}

/// Several tracks mixed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Soundscape {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tracks: Vec<String>,
    pub category: Category,
    #[serde(default)]
    pub premium: bool,
}

/// Immutable registry of everything the engine can play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    tracks: Vec<Track>,
    soundscapes: Vec<Soundscape>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate ids.
    ///
    /// Soundscapes that reference unknown tracks are accepted; those entries are
    /// skipped at play time.
    pub fn new(
        tracks: Vec<Track>,
        soundscapes: Vec<Soundscape>,
        aliases: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let catalog = Catalog { tracks, soundscapes, aliases };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The registry shipped with the engine.
    pub fn builtin() -> Self {
        Catalog {
            tracks: builtin_tracks(),
            soundscapes: builtin_soundscapes(),
            aliases: builtin_aliases(),
        }
    }

    /// Loads a JSON catalog with `tracks`, `soundscapes` and optional `aliases`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        debug!(target: LOG_TARGET, "Loaded catalog with {} tracks and {} soundscapes", catalog.tracks.len(), catalog.soundscapes.len());
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut track_ids = HashSet::new();
        for track in &self.tracks {
            if track.id.is_empty() {
                return Err(ConfigError::ValidationError("Track id cannot be empty".to_string()));
            }
            if !track_ids.insert(track.id.as_str()) {
                return Err(ConfigError::ValidationError(format!("Duplicate track id '{}'", track.id)));
            }
        }

        let mut soundscape_ids = HashSet::new();
        for soundscape in &self.soundscapes {
            if !soundscape_ids.insert(soundscape.id.as_str()) {
                return Err(ConfigError::ValidationError(format!("Duplicate soundscape id '{}'", soundscape.id)));
            }
            for missing in soundscape.tracks.iter().filter(|id| !track_ids.contains(id.as_str())) {
                warn!(target: LOG_TARGET, "Soundscape '{}' references unknown track '{}'; it will be skipped.", soundscape.id, missing);
            }
        }
        Ok(())
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn soundscape(&self, id: &str) -> Option<&Soundscape> {
        self.soundscapes.iter().find(|s| s.id == id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn soundscapes(&self) -> &[Soundscape] {
        &self.soundscapes
    }

    /// Tracks in `category` (if given) whose premium flag equals `premium` (if given).
    pub fn filter_tracks(&self, category: Option<Category>, premium: Option<bool>) -> Vec<Track> {
        self.tracks
            .iter()
            .filter(|t| category.map_or(true, |c| t.category == c))
            .filter(|t| premium.map_or(true, |p| t.premium == p))
            .cloned()
            .collect()
    }

    pub fn filter_soundscapes(&self, category: Option<Category>, premium: Option<bool>) -> Vec<Soundscape> {
        self.soundscapes
            .iter()
            .filter(|s| category.map_or(true, |c| s.category == c))
            .filter(|s| premium.map_or(true, |p| s.premium == p))
            .cloned()
            .collect()
    }

    /// Maps a friendly or legacy name to its canonical id; anything else passes through.
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn track(id: &str, name: &str, waveform: WaveformKind, duration: u32, category: Category, description: &str, premium: bool) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        waveform,
        duration,
        category,
        description: description.to_string(),
        premium,
    }
}

fn soundscape(id: &str, name: &str, description: &str, tracks: &[&str], category: Category) -> Soundscape {
    Soundscape {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        tracks: tracks.iter().map(|t| t.to_string()).collect(),
        category,
        premium: true,
    }
}

fn builtin_tracks() -> Vec<Track> {
    use Category::*;
    use WaveformKind::*;
    vec![
        track("rain_gentle", "Gentle Rain", White, 600, Nature, "Soft rainfall for relaxation and focus", false),
        track("ocean_waves", "Ocean Waves", Brown, 600, Nature, "Rhythmic ocean waves for deep relaxation", false),
        track("forest_birds", "Forest Birds", White, 600, Nature, "Peaceful bird songs in a forest setting", true),
        track("tibetan_bowls", "Tibetan Singing Bowls", Sine432, 900, Meditation, "Sacred bowls for deep meditation", true),
        track("white_noise", "White Noise", White, 600, Focus, "Pure white noise for concentration", false),
        track("brown_noise", "Brown Noise", Brown, 600, Focus, "Deep brown noise for focus and sleep", true),
        track("campfire", "Crackling Campfire", Brown, 600, Ambient, "Warm crackling fire sounds", true),
        track("thunderstorm", "Distant Thunder", Brown, 600, Nature, "Gentle thunderstorm for deep sleep", true),
    ]
}

fn builtin_soundscapes() -> Vec<Soundscape> {
    use Category::*;
    vec![
        soundscape("rainy_forest", "Rainy Forest", "Gentle rain with forest birds", &["rain_gentle", "forest_birds"], Nature),
        soundscape("ocean_meditation", "Ocean Meditation", "Ocean waves with Tibetan bowls", &["ocean_waves", "tibetan_bowls"], Meditation),
        soundscape("cozy_evening", "Cozy Evening", "Campfire with distant rain", &["campfire", "rain_gentle"], Ambient),
        soundscape("focus_zone", "Focus Zone", "Brown noise with subtle nature sounds", &["brown_noise", "forest_birds"], Focus),
    ]
}

fn builtin_aliases() -> HashMap<String, String> {
    [
        ("gentle_waves", "ocean_waves"),
        ("focus_tones", "white_noise"),
        ("sleep_sounds", "rain_gentle"),
        ("forest_sounds", "forest_birds"),
        ("gentle_bells", "tibetan_bowls"),
    ]
    .into_iter()
    .map(|(alias, id)| (alias.to_string(), id.to_string()))
    .collect()
}
