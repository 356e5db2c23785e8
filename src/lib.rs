//! Subburn - burn transcript-derived subtitles into uploaded videos.
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (subtitle synthesis, jobs, client events)
//! - ports/: Trait definitions (transcoding engine, artifact store)
//! - adapters/: Concrete implementations (ffmpeg, filesystem, HTTP, sessions)
//! - application/: The job runner tying ports together
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use adapters::local::{FfmpegEngine, FsAdapter, SessionRegistry};
pub use application::runner::{JobHandle, JobRunner, RunnerSettings};
pub use config::AppConfig;
