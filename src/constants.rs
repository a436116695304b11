/// Application-wide constants for audio capture, transcription, and dispatch

pub mod audio {
    /// Everything is resampled to the rate Whisper expects
    pub const WHISPER_SAMPLE_RATE: u32 = 16000;

    /// Minimum audio samples required for Whisper transcription (1.5 seconds)
    pub const MIN_WHISPER_SAMPLES: usize = 24000; // 1.5s at 16kHz

    /// Ambient-noise calibration window before the first endpointed capture
    pub const CALIBRATION_MS: u64 = 300;

    /// Calibrated energy threshold = ambient RMS * this factor
    pub const AMBIENT_THRESHOLD_FACTOR: f32 = 1.8;

    /// Floor for the calibrated energy threshold so a dead-quiet room
    /// doesn't produce a threshold of effectively zero
    pub const MIN_ENERGY_THRESHOLD: f32 = 0.005;
}

pub mod session {
    /// Trailing text after a wake phrase shorter than this is ignored
    /// rather than treated as an inline command
    pub const MIN_INLINE_COMMAND_CHARS: usize = 4;
}

pub mod dispatch {
    /// Shell commands spawned by the shell handler are killed after this
    pub const SHELL_TIMEOUT_SECS: u64 = 30;
}

pub mod history {
    /// Most-recent entries kept in the persisted command log
    pub const MAX_ENTRIES: usize = 100;
}
