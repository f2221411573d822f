//! ALSA output backend.
//!
//! Each loaded sound decodes its WAV file with symphonia and owns a PCM stream
//! on its own thread; the system mixer (dmix/pipewire) combines concurrent
//! streams. Volume is applied in software.

use crate::audio::backend::{AudioBackend, BackendStatus, HandleId, LoadOptions, SoundHandle, StatusSink};
use crate::audio::error::EngineError;
use crate::config::Settings;
use alsa::nix::errno::Errno;
use alsa::pcm::{Access, Format, HwParams, State as PcmState, PCM};
use alsa::{Direction, ValueOr};
use async_trait::async_trait;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, error, info, instrument, warn};

const LOG_TARGET: &str = "soundscape_engine::audio::alsa_backend";

const PERIOD_FRAMES: usize = 1024;
const PAUSE_POLL: Duration = Duration::from_millis(20);

impl From<alsa::Error> for EngineError {
    fn from(e: alsa::Error) -> Self {
        EngineError::Playback(format!("ALSA error: {}", e))
    }
}

impl From<SymphoniaError> for EngineError {
    fn from(e: SymphoniaError) -> Self {
        EngineError::Playback(format!("Decoding error: {}", e))
    }
}

/// Interleaved 16-bit samples ready for the PCM device.
struct DecodedAudio {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: usize,
}

/// Shared between the engine-facing handle and the output thread.
struct VoiceControl {
    paused: AtomicBool,
    stopped: AtomicBool,
    volume_bits: AtomicU32,
}

impl VoiceControl {
    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }
}

pub struct AlsaBackend {
    device_name: String,
    next_id: AtomicU64,
}

impl AlsaBackend {
    pub fn new(device_name: &str) -> Self {
        info!(target: LOG_TARGET, "Creating ALSA backend for device: {}", device_name);
        AlsaBackend {
            device_name: device_name.to_string(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Backend for the device named by `settings.alsa_device`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.alsa_device)
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

#[async_trait]
impl AudioBackend for AlsaBackend {
    #[instrument(skip(self, options, status), fields(device = %self.device_name))]
    async fn load(&self, path: &Path, options: LoadOptions, status: StatusSink) -> Result<Box<dyn SoundHandle>, EngineError> {
        let owned_path = path.to_path_buf();
        let audio = tokio::task::spawn_blocking(move || decode_file(&owned_path)).await??;
        let id = HandleId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        let control = Arc::new(VoiceControl {
            paused: AtomicBool::new(!options.autoplay),
            stopped: AtomicBool::new(false),
            volume_bits: AtomicU32::new(options.volume.to_bits()),
        });

        let device = self.device_name.clone();
        let thread_control = control.clone();
        let looping = options.looping;
        let thread = thread::Builder::new()
            .name(format!("alsa-{}", id))
            .spawn(move || {
                match play_voice(&device, &audio, looping, &thread_control) {
                    Ok(true) => {
                        let _ = status.send(BackendStatus::Finished(id));
                    }
                    Ok(false) => debug!(target: LOG_TARGET, handle = %id, "Voice stopped before the end."),
                    Err(e) => {
                        error!(target: LOG_TARGET, handle = %id, "Voice failed: {}", e);
                        let _ = status.send(BackendStatus::Failed(id, e.to_string()));
                    }
                }
            })?;

        info!(target: LOG_TARGET, handle = %id, "Started ALSA voice for {}", path.display());
        Ok(Box::new(AlsaSound {
            id,
            path: path.to_path_buf(),
            control,
            thread: Some(thread),
        }))
    }
}

struct AlsaSound {
    id: HandleId,
    path: PathBuf,
    control: Arc<VoiceControl>,
    thread: Option<thread::JoinHandle<()>>,
}

#[async_trait]
impl SoundHandle for AlsaSound {
    fn id(&self) -> HandleId {
        self.id
    }

    async fn pause(&mut self) -> Result<(), EngineError> {
        self.control.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), EngineError> {
        self.control.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> Result<(), EngineError> {
        self.control.volume_bits.store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        Ok(())
    }

    async fn unload(&mut self) -> Result<(), EngineError> {
        self.control.stopped.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await?;
            if joined.is_err() {
                warn!(target: LOG_TARGET, handle = %self.id, "Output thread for {} panicked.", self.path.display());
            }
        }
        Ok(())
    }
}

impl Drop for AlsaSound {
    fn drop(&mut self) {
        self.control.stopped.store(true, Ordering::SeqCst);
    }
}

fn decode_file(path: &Path) -> Result<DecodedAudio, EngineError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("wav");
    let probed = symphonia::default::get_probe().format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| EngineError::Playback(format!("No audio track in {}", path.display())))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| EngineError::Playback("Missing sample rate".to_string()))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = decoder.decode(&packet)?;
        let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    debug!(target: LOG_TARGET, "Decoded {} samples ({} Hz, {} ch) from {}", samples.len(), sample_rate, channels, path.display());
    Ok(DecodedAudio { samples, sample_rate, channels })
}

fn open_pcm(device_name: &str, audio: &DecodedAudio) -> Result<PCM, EngineError> {
    let device = CString::new(device_name)
        .map_err(|e| EngineError::Playback(format!("Invalid device name: {}", e)))?;
    let pcm = PCM::open(&device, Direction::Playback, false)?;
    {
        let hwp = HwParams::any(&pcm)?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::s16())?;
        hwp.set_channels(audio.channels as u32)?;
        hwp.set_rate_near(audio.sample_rate, ValueOr::Nearest)?;
        let actual_rate = hwp.get_rate()?;
        if actual_rate != audio.sample_rate {
            warn!(target: LOG_TARGET, "ALSA rate negotiation: requested={}, actual={}", audio.sample_rate, actual_rate);
        }
        pcm.hw_params(&hwp)?;

        let swp = pcm.sw_params_current()?;
        let buffer_size = hwp.get_buffer_size()?;
        let period_size = hwp.get_period_size()?;
        swp.set_start_threshold(buffer_size - period_size)?;
        pcm.sw_params(&swp)?;
    }
    Ok(pcm)
}

/// Streams `audio` until the end (Ok(true)) or until stopped (Ok(false)).
fn play_voice(device_name: &str, audio: &DecodedAudio, looping: bool, control: &VoiceControl) -> Result<bool, EngineError> {
    let pcm = open_pcm(device_name, audio)?;
    let io = pcm.io_i16()?;
    let chunk_len = PERIOD_FRAMES * audio.channels;
    let mut scratch = vec![0i16; chunk_len];
    let mut position = 0usize;
    let mut was_paused = false;

    loop {
        if control.stopped.load(Ordering::SeqCst) {
            let _ = pcm.drop();
            return Ok(false);
        }
        if control.paused.load(Ordering::SeqCst) {
            if !was_paused {
                let _ = pcm.drop();
                was_paused = true;
            }
            thread::sleep(PAUSE_POLL);
            continue;
        }
        if was_paused {
            pcm.prepare()?;
            was_paused = false;
        }

        if position >= audio.samples.len() {
            if looping && !audio.samples.is_empty() {
                position = 0;
            } else {
                if pcm.state() == PcmState::Running {
                    pcm.drain()?;
                }
                return Ok(true);
            }
        }

        let end = (position + chunk_len).min(audio.samples.len());
        let volume = control.volume();
        let chunk = &mut scratch[..end - position];
        for (out, &sample) in chunk.iter_mut().zip(&audio.samples[position..end]) {
            *out = (sample as f32 * volume) as i16;
        }

        match io.writei(chunk) {
            Ok(frames) => position += frames * audio.channels,
            Err(e) if e.errno() == Errno::EPIPE => {
                warn!(target: LOG_TARGET, "ALSA buffer underrun, recovering.");
                pcm.recover(libc::EPIPE, true)?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
