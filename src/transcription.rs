use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::constants::audio::MIN_WHISPER_SAMPLES;
use crate::normalize::NormalizedAudio;

/// Text produced by one transcription pass, together with the model that
/// produced it. Lives only within one pipeline cycle.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub model: String,
}

/// Lazily loaded Whisper contexts keyed by model size.
///
/// Loading a model takes seconds, so each size is loaded at most once per
/// process and shared read-only afterward. The registry is passed through
/// construction rather than living as an ambient global.
pub struct ModelRegistry {
    models: Mutex<HashMap<String, Arc<WhisperContext>>>,
    models_dir: PathBuf,
    use_gpu: bool,
}

impl ModelRegistry {
    pub fn new(models_dir: PathBuf, use_gpu: bool) -> Self {
        ModelRegistry {
            models: Mutex::new(HashMap::new()),
            models_dir,
            use_gpu,
        }
    }

    /// Fetch a context, loading the model file on first use.
    pub fn get(&self, model_size: &str) -> Result<Arc<WhisperContext>> {
        let mut models = self.models.lock().unwrap();

        if let Some(ctx) = models.get(model_size) {
            return Ok(Arc::clone(ctx));
        }

        let model_path = self.model_path(model_size)?;
        println!("Loading speech model '{model_size}' from: {}", model_path.display());

        let ctx_params = WhisperContextParameters {
            use_gpu: self.use_gpu,
            ..Default::default()
        };

        let ctx = WhisperContext::new_with_params(&model_path.to_string_lossy(), ctx_params)
            .with_context(|| format!("Failed to load speech model '{model_size}'"))?;

        println!("Model '{model_size}' ready (GPU: {})", self.use_gpu);

        let ctx = Arc::new(ctx);
        models.insert(model_size.to_string(), Arc::clone(&ctx));
        Ok(ctx)
    }

    /// Load every listed size up front so state transitions never stall on
    /// a model load mid-session.
    pub fn preload(&self, model_sizes: &[&str]) -> Result<()> {
        for size in model_sizes {
            self.get(size)?;
        }
        Ok(())
    }

    fn model_path(&self, model_size: &str) -> Result<PathBuf> {
        let model_filename = format!("ggml-{model_size}.bin");
        let model_path = self.models_dir.join(&model_filename);

        if !model_path.exists() {
            anyhow::bail!(
                "Model file not found: {}\n\
                Run `voice-command download-model {}` or download it from:\n\
                https://huggingface.co/ggerganov/whisper.cpp/tree/main\n\
                and place it in: {}",
                model_filename,
                model_size,
                self.models_dir.display()
            );
        }

        Ok(model_path)
    }
}

/// Wraps the registry with the pipeline's fixed transcription parameters.
pub struct TranscriptionEngine {
    registry: Arc<ModelRegistry>,
    language: String,
}

impl TranscriptionEngine {
    pub fn new(registry: Arc<ModelRegistry>, language: String) -> Self {
        TranscriptionEngine { registry, language }
    }

    pub fn transcribe(&self, audio: &NormalizedAudio, model_size: &str) -> Result<Transcript> {
        let ctx = self.registry.get(model_size)?;

        let mut samples = audio.to_whisper_samples();
        // Whisper rounds very short buffers down to nothing
        if samples.len() < MIN_WHISPER_SAMPLES {
            samples.resize(MIN_WHISPER_SAMPLES, 0.0);
        }

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // Language is force-pinned: auto-detection mis-routes borderline
        // audio to the wrong language and compounds hallucinations
        params.set_language(Some(&self.language));
        params.set_translate(false);

        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        // Disable special tokens to avoid annotations like [BLANK_AUDIO]
        params.set_suppress_blank(true);
        params.set_suppress_non_speech_tokens(true);

        // Greedy decoding at temperature 0 with a strict probability
        // threshold keeps the model from inventing text on marginal audio
        params.set_temperature(0.0);
        params.set_temperature_inc(0.0);
        params.set_logprob_thold(0.0);

        let mut state = ctx
            .create_state()
            .context("Failed to create Whisper state")?;

        state
            .full(params, &samples)
            .context("Failed to run Whisper transcription")?;

        let num_segments = state
            .full_n_segments()
            .context("Failed to get number of segments")?;

        let mut result = String::new();
        for i in 0..num_segments {
            let segment = state
                .full_get_segment_text(i)
                .context("Failed to get segment text")?;
            result.push_str(&segment);
            result.push(' ');
        }

        Ok(Transcript {
            text: result.trim().to_string(),
            model: model_size.to_string(),
        })
    }
}
