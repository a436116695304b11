use crate::audio::AudioBuffer;

/// A capture after DC-offset removal and gain correction, ready for the
/// transcription engine. Mean sample value is ~0 and peaks are clipped to
/// the i16 range.
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl NormalizedAudio {
    /// Samples in the [-1.0, 1.0] float form Whisper consumes.
    pub fn to_whisper_samples(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32 / 32768.0).collect()
    }
}

/// Remove DC bias and amplify the capture.
///
/// Low-quality analog front-ends leave a DC offset that masks genuine
/// spectral content at the levels the speech model expects, and low-output
/// mics capture speech well below usable amplitude. Both must be corrected
/// before transcription or the model drifts toward wrong-language or
/// garbage output.
pub fn normalize(buffer: &AudioBuffer, gain: f32) -> NormalizedAudio {
    if buffer.samples.is_empty() {
        return NormalizedAudio {
            samples: Vec::new(),
            channels: buffer.channels,
            sample_rate: buffer.sample_rate,
        };
    }

    let mean: f64 =
        buffer.samples.iter().map(|&s| s as f64).sum::<f64>() / buffer.samples.len() as f64;

    let samples = buffer
        .samples
        .iter()
        .map(|&s| {
            let corrected = (s as f64 - mean) * gain as f64;
            corrected.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
        })
        .collect();

    NormalizedAudio {
        samples,
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
    }
}
