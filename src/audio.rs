use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, StreamConfig};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::constants::audio::{
    AMBIENT_THRESHOLD_FACTOR, CALIBRATION_MS, MIN_ENERGY_THRESHOLD, WHISPER_SAMPLE_RATE,
};

/// One microphone capture: 16-bit mono PCM at the Whisper sample rate.
/// Produced for exactly one pipeline cycle and consumed once.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn empty() -> Self {
        AudioBuffer {
            samples: Vec::new(),
            channels: 1,
            sample_rate: WHISPER_SAMPLE_RATE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// How a capture decides when to stop.
#[derive(Debug, Clone, Copy)]
pub enum CaptureMode {
    /// Record exactly this long regardless of speech boundaries.
    /// The production default: energy endpointing is unreliable on
    /// low-output microphones.
    Fixed(Duration),
    /// Wait for sound above the calibrated ambient threshold, then stop
    /// after `trailing_silence` of quiet or at the absolute `timeout`.
    UntilSilence {
        timeout: Duration,
        trailing_silence: Duration,
    },
}

/// Owns microphone access. The device itself is opened and released on
/// every capture so other applications can grab it between cycles.
pub struct AudioFrontend {
    device_index: Option<usize>,
    warmup_ms: u64,
    ambient_threshold: Option<f32>,
}

impl AudioFrontend {
    pub fn new(device_index: Option<usize>, warmup_ms: u64) -> Self {
        AudioFrontend {
            device_index,
            warmup_ms,
            ambient_threshold: None,
        }
    }

    /// Capture one buffer. Device failures are logged and reported as an
    /// empty buffer so one bad cycle never stops the loop.
    pub fn capture(&mut self, mode: CaptureMode) -> AudioBuffer {
        let result = match mode {
            CaptureMode::Fixed(duration) => self.capture_fixed(duration),
            CaptureMode::UntilSilence {
                timeout,
                trailing_silence,
            } => self.capture_until_silence(timeout, trailing_silence),
        };

        match result {
            Ok(buffer) => buffer,
            Err(e) => {
                eprintln!("🔴 Capture failed: {e:#}");
                AudioBuffer::empty()
            }
        }
    }

    /// Print the selected input device, best effort.
    pub fn describe(&self) {
        if let Ok((device, config)) = self.open_input() {
            println!(
                "🎤 Input device: {} ({} channels, {} Hz)",
                device.name().unwrap_or_else(|_| "<unknown>".to_string()),
                config.channels,
                config.sample_rate.0
            );
        }
    }

    fn capture_fixed(&self, duration: Duration) -> Result<AudioBuffer> {
        let (device, config) = self.open_input()?;
        let record_for = Duration::from_millis(self.warmup_ms) + duration;

        let (buffer, stream) = start_mono_stream(&device, &config)?;
        std::thread::sleep(record_for);
        drop(stream);

        let samples = std::mem::take(&mut *buffer.lock().unwrap());
        Ok(self.finalize(samples, config.sample_rate.0))
    }

    fn capture_until_silence(
        &mut self,
        timeout: Duration,
        trailing_silence: Duration,
    ) -> Result<AudioBuffer> {
        let threshold = match self.ambient_threshold {
            Some(t) => t,
            None => {
                // Calibrate once per session, before the user has spoken, so
                // the threshold reflects the room rather than their voice
                let t = self.calibrate_ambient()?;
                self.ambient_threshold = Some(t);
                t
            }
        };

        let (device, config) = self.open_input()?;
        let (buffer, stream) = start_mono_stream(&device, &config)?;

        let poll = Duration::from_millis(100);
        let started_at = Instant::now();
        let mut speech_started = false;
        let mut last_loud = Instant::now();
        let mut scanned = 0usize;

        loop {
            std::thread::sleep(poll);

            let loud = {
                let buf = buffer.lock().unwrap();
                let fresh = &buf[scanned.min(buf.len())..];
                let loud = !fresh.is_empty() && !is_silence(fresh, threshold);
                scanned = buf.len();
                loud
            };

            if loud {
                speech_started = true;
                last_loud = Instant::now();
            }

            if started_at.elapsed() >= timeout {
                break;
            }
            if speech_started && last_loud.elapsed() >= trailing_silence {
                break;
            }
        }
        drop(stream);

        if !speech_started {
            // Timed out waiting for speech: a transient non-event
            return Ok(AudioBuffer::empty());
        }

        let samples = std::mem::take(&mut *buffer.lock().unwrap());
        Ok(self.finalize(samples, config.sample_rate.0))
    }

    /// Drop the warm-up transient, resample to 16kHz, convert to i16.
    fn finalize(&self, mut samples: Vec<f32>, actual_rate: u32) -> AudioBuffer {
        let warmup_samples = (actual_rate as u64 * self.warmup_ms / 1000) as usize;
        if samples.len() > warmup_samples {
            samples.drain(0..warmup_samples);
        } else {
            samples.clear();
        }

        let samples = if actual_rate != WHISPER_SAMPLE_RATE {
            resample(&samples, actual_rate, WHISPER_SAMPLE_RATE)
        } else {
            samples
        };

        AudioBuffer {
            samples: pcm_to_i16(&samples),
            channels: 1,
            sample_rate: WHISPER_SAMPLE_RATE,
        }
    }

    fn calibrate_ambient(&self) -> Result<f32> {
        println!("🎚  Calibrating for ambient noise...");
        let (device, config) = self.open_input()?;
        let (buffer, stream) = start_mono_stream(&device, &config)?;
        std::thread::sleep(Duration::from_millis(CALIBRATION_MS));
        drop(stream);

        let samples = std::mem::take(&mut *buffer.lock().unwrap());
        let threshold = (rms(&samples) * AMBIENT_THRESHOLD_FACTOR).max(MIN_ENERGY_THRESHOLD);
        println!("🎚  Ambient energy threshold: {threshold:.4}");
        Ok(threshold)
    }

    fn open_input(&self) -> Result<(Device, StreamConfig)> {
        let host = cpal::default_host();

        let device = match self.device_index {
            Some(index) => host
                .input_devices()
                .context("Failed to query input devices")?
                .nth(index)
                .with_context(|| format!("No input device at index {index}"))?,
            None => host
                .default_input_device()
                .context("No input device available")?,
        };

        let default_config = device
            .default_input_config()
            .context("Failed to get default input config")?;
        let mut config: StreamConfig = default_config.into();

        // Prefer capturing at the Whisper rate when the device supports it,
        // otherwise resample after capture
        let supported_configs = device
            .supported_input_configs()
            .context("Failed to query supported input configs")?;
        for supported in supported_configs {
            if supported.min_sample_rate().0 <= WHISPER_SAMPLE_RATE
                && supported.max_sample_rate().0 >= WHISPER_SAMPLE_RATE
            {
                config.sample_rate = cpal::SampleRate(WHISPER_SAMPLE_RATE);
                break;
            }
        }

        Ok((device, config))
    }
}

/// List input device names for the `list-devices` subcommand.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for device in host
        .input_devices()
        .context("Failed to query input devices")?
    {
        names.push(device.name().unwrap_or_else(|_| "<unknown>".to_string()));
    }
    Ok(names)
}

/// Build an input stream that downmixes to mono f32 into a shared buffer.
fn start_mono_stream(
    device: &Device,
    config: &StreamConfig,
) -> Result<(Arc<Mutex<Vec<f32>>>, cpal::Stream)> {
    let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
    let cb_buffer = Arc::clone(&buffer);
    let channels = config.channels as usize;

    let err_fn = |err| eprintln!("🔴 Audio stream error: {err}");

    let stream = device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Handle a poisoned mutex gracefully in the audio callback
                let Ok(mut buf) = cb_buffer.lock() else {
                    eprintln!("⚠️  Audio buffer mutex poisoned, dropping audio data");
                    return;
                };

                if channels == 1 {
                    buf.extend_from_slice(data);
                } else {
                    // Average channels to get mono
                    for frame in data.chunks(channels) {
                        let mono: f32 = frame.iter().sum::<f32>() / channels as f32;
                        buf.push(mono);
                    }
                }
            },
            err_fn,
            None,
        )
        .context("Failed to build input stream (check microphone permissions)")?;

    stream.play().context("Failed to start audio stream")?;

    Ok((buffer, stream))
}

/// RMS energy of a sample window.
pub fn rms(audio: &[f32]) -> f32 {
    if audio.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = audio.iter().map(|&x| x * x).sum();
    (sum_squares / audio.len() as f32).sqrt()
}

/// Simple energy-based silence detection.
pub fn is_silence(audio: &[f32], threshold: f32) -> bool {
    rms(audio) < threshold
}

// Simple linear interpolation resampling
fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let src_floor = src_idx.floor() as usize;
        let src_ceil = (src_floor + 1).min(input.len() - 1);
        let frac = src_idx - src_floor as f64;

        let sample = input[src_floor] * (1.0 - frac) as f32 + input[src_ceil] * frac as f32;
        output.push(sample);
    }

    output
}

fn pcm_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&x| (x * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0; 160]), 0.0);
    }

    #[test]
    fn silence_detection_uses_threshold() {
        let quiet = vec![0.001f32; 1600];
        let loud = vec![0.5f32; 1600];
        assert!(is_silence(&quiet, 0.01));
        assert!(!is_silence(&loud, 0.01));
    }

    #[test]
    fn resample_halves_sample_count() {
        let input = vec![0.5f32; 32000];
        let output = resample(&input, 32000, 16000);
        assert_eq!(output.len(), 16000);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 16000, 16000), input);
    }

    #[test]
    fn pcm_conversion_clips_out_of_range() {
        let samples = pcm_to_i16(&[2.0, -2.0, 0.0]);
        assert_eq!(samples, vec![32767, -32768, 0]);
    }

    #[test]
    fn empty_buffer_reports_empty() {
        let buffer = AudioBuffer::empty();
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration_secs(), 0.0);
    }
}
