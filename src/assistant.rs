/// The per-cycle pipeline loop: capture, normalize, transcribe, filter,
/// advance the session, classify, dispatch.
///
/// Strictly synchronous: one capture at a time, each stage blocking until
/// done, every stage failure treated as a skipped cycle. The microphone is
/// acquired and released inside each capture; the loaded speech models are
/// the only resource that outlives a cycle.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{AudioFrontend, CaptureMode};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::hallucination;
use crate::intent;
use crate::normalize;
use crate::session::{SessionEvent, SessionMachine, SessionState};
use crate::transcription::TranscriptionEngine;

pub struct Assistant {
    frontend: AudioFrontend,
    engine: TranscriptionEngine,
    session: SessionMachine,
    dispatcher: Dispatcher,
    gain: f32,
    confirm_model: String,
    confirm_window: Duration,
    endpointing: bool,
    endpoint_timeout: Duration,
    trailing_silence: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Assistant {
    pub fn new(
        frontend: AudioFrontend,
        engine: TranscriptionEngine,
        session: SessionMachine,
        dispatcher: Dispatcher,
        config: &Config,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Assistant {
            frontend,
            engine,
            session,
            dispatcher,
            gain: config.audio.gain,
            confirm_model: config.transcription.command_model.clone(),
            confirm_window: Duration::from_secs(config.audio.confirm_window_secs),
            endpointing: config.audio.endpointing,
            endpoint_timeout: Duration::from_secs(config.audio.endpoint_timeout_secs),
            trailing_silence: Duration::from_millis(config.audio.trailing_silence_ms),
            shutdown,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        println!("🎧 Listening. Say a wake phrase to give a command, or Ctrl-C to quit.");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                println!("👋 Interrupted. Shutting down.");
                self.session.shutdown();
            }
            if self.session.state() == SessionState::Exited {
                break;
            }

            let profile = self.session.capture_profile().clone();

            // Wake probes always use the fixed window; command capture may
            // opt into endpointing
            let mode = if self.endpointing && self.session.is_command_cycle() {
                CaptureMode::UntilSilence {
                    timeout: self.endpoint_timeout,
                    trailing_silence: self.trailing_silence,
                }
            } else {
                CaptureMode::Fixed(Duration::from_secs(profile.window_secs))
            };

            let Some(text) = listen_filtered(
                &mut self.frontend,
                &self.engine,
                &profile.model,
                mode,
                self.gain,
            ) else {
                continue;
            };

            match self.session.observe(&text) {
                SessionEvent::Armed { wake_phrase } => {
                    println!("🔔 Wake phrase \"{wake_phrase}\" detected. Listening for your command...");
                }
                SessionEvent::Command(command_text) => self.handle_command(&command_text),
                SessionEvent::Exit => {
                    println!("👋 Goodbye.");
                }
                SessionEvent::Ignored => {}
            }
        }

        Ok(())
    }

    fn handle_command(&mut self, text: &str) {
        println!("🗣  You said: {text}");

        let command = intent::classify(text);

        // A classified exit ends the session without touching the dispatcher
        if command.action == "exit" {
            println!("👋 Goodbye.");
            self.session.shutdown();
            return;
        }

        // Split borrows: the confirmation closure needs the audio path
        // while the dispatcher runs
        let frontend = &mut self.frontend;
        let engine = &self.engine;
        let (confirm_model, confirm_window, gain) =
            (self.confirm_model.clone(), self.confirm_window, self.gain);

        let mut confirm = |description: &str| -> Option<String> {
            println!("❓ {description}. Say 'yes' to confirm or 'no' to cancel.");
            listen_filtered(
                frontend,
                engine,
                &confirm_model,
                CaptureMode::Fixed(confirm_window),
                gain,
            )
        };

        let response = self.dispatcher.dispatch(text, &command, &mut confirm);
        println!("💬 {}", self.dispatcher.spoken(&response));
    }
}

/// One listen pass: capture, normalize, transcribe, filter.
/// Returns None for empty captures, transcription errors, empty
/// transcripts, and hallucinations - the caller just skips the cycle.
fn listen_filtered(
    frontend: &mut AudioFrontend,
    engine: &TranscriptionEngine,
    model: &str,
    mode: CaptureMode,
    gain: f32,
) -> Option<String> {
    let buffer = frontend.capture(mode);
    if buffer.is_empty() {
        return None;
    }

    let normalized = normalize::normalize(&buffer, gain);

    let transcript = match engine.transcribe(&normalized, model) {
        Ok(transcript) => transcript,
        Err(e) => {
            eprintln!("🔴 Transcription failed: {e:#}");
            return None;
        }
    };

    if transcript.text.is_empty() || hallucination::is_noise(&transcript.text) {
        return None;
    }

    Some(transcript.text)
}
