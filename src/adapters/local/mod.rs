//! Local adapters for single-server deployment.

pub mod events;
pub mod ffmpeg;
pub mod fs;
pub mod http;

pub use events::SessionRegistry;
pub use ffmpeg::FfmpegEngine;
pub use fs::FsAdapter;
