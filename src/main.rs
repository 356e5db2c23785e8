//! Subburn server
//!
//! Wires up:
//! - Local adapters (filesystem, ffmpeg)
//! - Session registry for the connected client
//! - Job runner
//! - HTTP layer (upload form/endpoint, WebSocket events, processed outputs)

use std::sync::Arc;
use subburn::adapters::local::ffmpeg::locate;
use subburn::adapters::local::http::{router, AppState};
use subburn::ports::engine::CaptionStyle;
use subburn::ports::storage::ArtifactStore;
use subburn::{AppConfig, FfmpegEngine, FsAdapter, JobRunner, RunnerSettings, SessionRegistry};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();

    tracing_subscriber::fmt::init();

    // 1. Adapters
    let store = FsAdapter::new(&config.upload_dir, &config.processed_dir);
    if let Err(e) = store.ensure_layout().await {
        error!(error = %e, "failed to prepare storage directories");
        std::process::exit(1);
    }

    if locate(&config.ffmpeg_path).is_none() {
        warn!(program = %config.ffmpeg_path, "ffmpeg not found, jobs will fail until it is installed");
    }
    let engine = FfmpegEngine::new(&config.ffmpeg_path, &config.ffprobe_path);

    // 2. Session registry + job runner
    let sessions = Arc::new(SessionRegistry::new());
    let settings = RunnerSettings {
        subtitles: config.subtitle_settings(),
        download_base: config.download_base(),
        style: CaptionStyle::default(),
    };
    let runner = Arc::new(JobRunner::new(engine, store, sessions.clone(), settings));

    // 3. HTTP layer
    let app = router(AppState { runner, sessions }, config.serve_upload_form);

    // 4. Start server
    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .expect("Failed to bind TCP listener");
    info!("Listening at {}", config.bind_address());
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
