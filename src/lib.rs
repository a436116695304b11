// Library exports for testing
pub mod assistant;
pub mod audio;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod hallucination;
pub mod handlers;
pub mod history;
pub mod intent;
pub mod model_download;
pub mod normalize;
pub mod session;
pub mod transcription;
