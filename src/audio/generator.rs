//! Procedural sample synthesis for the built-in waveform kinds.

use crate::audio::error::EngineError;
use crate::audio::wav::MAX_SAMPLES;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

const LOG_TARGET: &str = "soundscape_engine::audio::generator";

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

const WHITE_GAIN: f32 = 0.2;
const BROWN_STEP: f32 = 0.02;
const BROWN_GAIN: f32 = 0.4;
const TONE_HZ: f64 = 432.0;
const FADE_SECONDS: f64 = 0.1;

/// Waveform a track is rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformKind {
    White,
    Brown,
    Sine432,
}

impl WaveformKind {
    pub const ALL: [WaveformKind; 3] = [WaveformKind::White, WaveformKind::Brown, WaveformKind::Sine432];

    pub fn as_str(&self) -> &'static str {
        match self {
            WaveformKind::White => "white",
            WaveformKind::Brown => "brown",
            WaveformKind::Sine432 => "sine432",
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaveformKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" => Ok(WaveformKind::White),
            "brown" => Ok(WaveformKind::Brown),
            "sine432" => Ok(WaveformKind::Sine432),
            other => Err(EngineError::Generation(format!("Unknown waveform kind '{}'", other))),
        }
    }
}

/// Produces raw mono samples in [-1, 1].
///
/// The cache only depends on this trait, which lets tests count how often
/// synthesis actually runs.
pub trait SampleGenerator: Send + Sync {
    fn generate(&self, kind: WaveformKind, seconds: f64, sample_rate: u32) -> Result<Vec<f32>, EngineError>;
}

/// Number of samples produced for `seconds` of audio at `sample_rate`.
pub fn sample_count(seconds: f64, sample_rate: u32) -> Result<usize, EngineError> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(EngineError::Generation(format!("Duration must be positive, got {}", seconds)));
    }
    if sample_rate == 0 {
        return Err(EngineError::Generation("Sample rate must be non-zero".to_string()));
    }
    let count = (seconds * sample_rate as f64).round();
    if count > MAX_SAMPLES as f64 {
        return Err(EngineError::Generation(format!(
            "{}s at {} Hz exceeds the WAV size limit of {} samples",
            seconds, sample_rate, MAX_SAMPLES
        )));
    }
    Ok(count as usize)
}

/// Noise and tone synthesizer backed by `rand`.
///
/// With a seed every call starts from the same RNG state, so a given
/// (kind, seconds, rate) always renders the same samples.
#[derive(Debug, Clone, Default)]
pub struct ProceduralGenerator {
    seed: Option<u64>,
}

impl ProceduralGenerator {
    pub fn new() -> Self {
        Self { seed: None }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

impl SampleGenerator for ProceduralGenerator {
    #[instrument(skip(self), fields(seeded = self.seed.is_some()))]
    fn generate(&self, kind: WaveformKind, seconds: f64, sample_rate: u32) -> Result<Vec<f32>, EngineError> {
        let total = sample_count(seconds, sample_rate)?;
        debug!(target: LOG_TARGET, "Rendering {} samples of {} noise.", total, kind);

        let samples = match kind {
            WaveformKind::White => white(&mut self.rng(), total),
            WaveformKind::Brown => brown(&mut self.rng(), total),
            WaveformKind::Sine432 => sine432(total, seconds, sample_rate),
        };
        Ok(samples)
    }
}

fn white<R: Rng>(rng: &mut R, total: usize) -> Vec<f32> {
    (0..total).map(|_| rng.random_range(-1.0f32..=1.0) * WHITE_GAIN).collect()
}

// Clamped random walk: a cheap integrator that tilts the spectrum toward low frequencies.
fn brown<R: Rng>(rng: &mut R, total: usize) -> Vec<f32> {
    let mut state = 0.0f32;
    (0..total)
        .map(|_| {
            state = (state + BROWN_STEP * rng.random_range(-1.0f32..=1.0)).clamp(-1.0, 1.0);
            state * BROWN_GAIN
        })
        .collect()
}

fn sine432(total: usize, seconds: f64, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f64;
    (0..total)
        .map(|i| {
            let t = i as f64 / rate;
            let envelope = (t / FADE_SECONDS).min(1.0) * ((seconds - t) / FADE_SECONDS).min(1.0);
            let tone = (2.0 * PI * TONE_HZ * t).sin() * 0.2 + (2.0 * PI * TONE_HZ * 2.0 * t).sin() * 0.1;
            (tone * envelope) as f32
        })
        .collect()
}
