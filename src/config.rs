use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AudioConfig {
    /// Input device index from `voice-command list-devices` (None = default mic)
    #[serde(default)]
    pub device_index: Option<usize>,
    #[serde(default = "default_gain")]
    pub gain: f32,
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,
    #[serde(default = "default_wake_window")]
    pub wake_window_secs: u64,
    #[serde(default = "default_command_window")]
    pub command_window_secs: u64,
    #[serde(default = "default_confirm_window")]
    pub confirm_window_secs: u64,
    /// Use energy-based endpointing for command capture instead of a fixed
    /// window. Off by default: low-output mics make endpointing cut early
    /// or run long, so fixed-duration capture is the production path.
    #[serde(default)]
    pub endpointing: bool,
    #[serde(default = "default_endpoint_timeout")]
    pub endpoint_timeout_secs: u64,
    #[serde(default = "default_trailing_silence")]
    pub trailing_silence_ms: u64,
}

fn default_gain() -> f32 {
    10.0 // low-output mics need substantial amplification before Whisper
}

fn default_warmup_ms() -> u64 {
    300 // let input AGC settle before keeping samples
}

fn default_wake_window() -> u64 {
    3 // short windows keep the always-on wake probe cheap
}

fn default_command_window() -> u64 {
    8
}

fn default_confirm_window() -> u64 {
    4
}

fn default_endpoint_timeout() -> u64 {
    10
}

fn default_trailing_silence() -> u64 {
    1500
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            device_index: None,
            gain: default_gain(),
            warmup_ms: default_warmup_ms(),
            wake_window_secs: default_wake_window(),
            command_window_secs: default_command_window(),
            confirm_window_secs: default_confirm_window(),
            endpointing: false,
            endpoint_timeout_secs: default_endpoint_timeout(),
            trailing_silence_ms: default_trailing_silence(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscriptionConfig {
    #[serde(default = "default_wake_model")]
    pub wake_model: String,
    #[serde(default = "default_command_model")]
    pub command_model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_use_gpu")]
    pub use_gpu: bool,
}

fn default_wake_model() -> String {
    "tiny".to_string() // ~3x faster than base, good enough for wake probing
}

fn default_command_model() -> String {
    "base".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_use_gpu() -> bool {
    true
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        TranscriptionConfig {
            wake_model: default_wake_model(),
            command_model: default_command_model(),
            language: default_language(),
            use_gpu: default_use_gpu(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_wake_phrases")]
    pub wake_phrases: Vec<String>,
    #[serde(default = "default_exit_phrases")]
    pub exit_phrases: Vec<String>,
    /// When false, every cycle is implicitly armed (no wake phrase needed)
    #[serde(default = "default_require_wake")]
    pub require_wake: bool,
}

fn default_wake_phrases() -> Vec<String> {
    vec![
        "hey computer".to_string(),
        "okay computer".to_string(),
        "hello computer".to_string(),
    ]
}

fn default_exit_phrases() -> Vec<String> {
    vec!["goodbye computer".to_string(), "stop listening".to_string()]
}

fn default_require_wake() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            wake_phrases: default_wake_phrases(),
            exit_phrases: default_exit_phrases(),
            require_wake: default_require_wake(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_confirm_destructive")]
    pub confirm_destructive: bool,
    /// Spoken responses are cut at this many characters; the history log
    /// always stores the full result
    #[serde(default = "default_spoken_limit")]
    pub spoken_limit: usize,
}

fn default_confirm_destructive() -> bool {
    true
}

fn default_spoken_limit() -> usize {
    200
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            confirm_destructive: default_confirm_destructive(),
            spoken_limit: default_spoken_limit(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            audio: AudioConfig::default(),
            transcription: TranscriptionConfig::default(),
            session: SessionConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".voice-command"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.yaml"))
    }

    pub fn models_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("models"))
    }

    pub fn history_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("history.json"))
    }

    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: Config = serde_yaml::from_str(&contents)
                .context("Failed to parse config file")?;

            config.validate()?;

            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            println!("Created default config at: {}", config_path.display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.audio.gain <= 0.0 || self.audio.gain > 100.0 {
            bail!("gain must be between 0 and 100");
        }
        if self.audio.wake_window_secs == 0 || self.audio.wake_window_secs > 30 {
            bail!("wake_window_secs must be between 1 and 30");
        }
        if self.audio.command_window_secs == 0 || self.audio.command_window_secs > 30 {
            bail!("command_window_secs must be between 1 and 30");
        }
        if self.audio.confirm_window_secs == 0 || self.audio.confirm_window_secs > 30 {
            bail!("confirm_window_secs must be between 1 and 30");
        }
        if self.audio.warmup_ms > 2000 {
            bail!("warmup_ms must be <= 2000");
        }
        if self.audio.trailing_silence_ms == 0 {
            bail!("trailing_silence_ms must be greater than 0");
        }

        if self.transcription.wake_model.is_empty() {
            bail!("wake_model cannot be empty");
        }
        if self.transcription.command_model.is_empty() {
            bail!("command_model cannot be empty");
        }
        if self.transcription.language.is_empty() || self.transcription.language == "auto" {
            // Auto-detection mis-routes degraded audio to the wrong language
            bail!("language must be a fixed language code, not auto");
        }

        if self.session.require_wake && self.session.wake_phrases.is_empty() {
            bail!("wake_phrases cannot be empty while require_wake is true");
        }
        if self.session.exit_phrases.is_empty() {
            bail!("exit_phrases cannot be empty");
        }

        if self.dispatch.spoken_limit == 0 {
            bail!("spoken_limit must be greater than 0");
        }

        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir()?;
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        let config_path = Self::config_path()?;
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs::write(&config_path, yaml)
            .context("Failed to write config file")?;

        Ok(())
    }
}
