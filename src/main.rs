mod assistant;
mod audio;
mod config;
mod constants;
mod dispatch;
mod hallucination;
mod handlers;
mod history;
mod intent;
mod model_download;
mod normalize;
mod session;
mod transcription;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assistant::Assistant;
use audio::AudioFrontend;
use config::Config;
use dispatch::Dispatcher;
use history::HistoryLog;
use model_download::ModelDownloader;
use session::{CaptureProfile, SessionMachine};
use transcription::{ModelRegistry, TranscriptionEngine};

#[derive(Parser)]
#[command(name = "voice-command")]
#[command(about = "Always-listening voice command front-end", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available audio input devices
    ListDevices,
    /// Download a Whisper model (e.g. tiny, base, small). If not specified,
    /// downloads the models from settings.yaml
    DownloadModel { model: Option<String> },
    /// Classify a text utterance without audio, for rule debugging
    Classify { text: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::ListDevices) => list_devices_command(),
        Some(Commands::DownloadModel { model }) => download_model_command(model.as_deref()),
        Some(Commands::Classify { text }) => classify_command(&text),
        None => run_assistant(),
    }
}

fn list_devices_command() -> Result<()> {
    println!("\nAvailable input devices:");
    println!("----------------------------------------");
    for (i, name) in audio::list_input_devices()?.iter().enumerate() {
        println!("  [{i}] {name}");
    }
    println!();
    Ok(())
}

fn download_model_command(model: Option<&str>) -> Result<()> {
    let downloader = ModelDownloader::new(Config::models_dir()?);

    match model {
        Some(name) => downloader.ensure_model_exists(name)?,
        None => {
            let config = Config::load_or_create()?;
            downloader.ensure_model_exists(&config.transcription.wake_model)?;
            downloader.ensure_model_exists(&config.transcription.command_model)?;
        }
    }

    Ok(())
}

fn classify_command(text: &str) -> Result<()> {
    let command = intent::classify(text);
    println!("action: {}", command.action);
    for (key, value) in &command.parameters {
        println!("{key}: {value}");
    }
    Ok(())
}

fn run_assistant() -> Result<()> {
    let config = Config::load_or_create()?;

    // Load both models up front so arming never stalls on a model load
    println!("Loading speech models...");
    let registry = Arc::new(ModelRegistry::new(
        Config::models_dir()?,
        config.transcription.use_gpu,
    ));
    registry.preload(&[
        &config.transcription.wake_model,
        &config.transcription.command_model,
    ])?;

    let engine = TranscriptionEngine::new(registry, config.transcription.language.clone());

    let frontend = AudioFrontend::new(config.audio.device_index, config.audio.warmup_ms);
    frontend.describe();

    let session = SessionMachine::new(
        &config.session,
        CaptureProfile {
            model: config.transcription.wake_model.clone(),
            window_secs: config.audio.wake_window_secs,
        },
        CaptureProfile {
            model: config.transcription.command_model.clone(),
            window_secs: config.audio.command_window_secs,
        },
    );

    let history = HistoryLog::load(Config::history_path()?);
    let mut dispatcher = Dispatcher::new(
        history,
        config.dispatch.confirm_destructive,
        config.dispatch.spoken_limit,
    );
    handlers::register_builtin(&mut dispatcher);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .ok(); // Ignore error if a handler is already installed
    }

    if config.session.require_wake {
        println!("Wake phrases: {}", config.session.wake_phrases.join(", "));
    } else {
        println!("Wake phrases disabled: every utterance is a command.");
    }
    println!("Exit phrases: {}", config.session.exit_phrases.join(", "));

    let mut assistant = Assistant::new(frontend, engine, session, dispatcher, &config, shutdown);
    assistant.run()
}
