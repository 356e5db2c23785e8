//! Configuration loaded from the environment (and `.env`).

use crate::domain::subtitles::{SubtitleSettings, DEFAULT_SECONDS_PER_CUE, DEFAULT_WORDS_PER_CUE};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Route finished outputs are served under.
pub const PROCESSED_ROUTE: &str = "/processed";

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Directory incoming uploads and their subtitle files are written to
    pub upload_dir: PathBuf,
    /// Directory finished outputs are written to and served from
    pub processed_dir: PathBuf,
    /// Base used to build download URLs handed to clients
    pub public_base_url: String,
    pub words_per_cue: usize,
    pub seconds_per_cue: u64,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Serve the HTML upload form on `/`
    pub serve_upload_form: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let addr = string("ADDR", "127.0.0.1");
        let port = string("PORT", "3000");
        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{}:{}", addr, port));

        Self {
            upload_dir: PathBuf::from(string("UPLOAD_DIR", "uploads")),
            processed_dir: PathBuf::from(string("PROCESSED_DIR", "processed")),
            public_base_url,
            words_per_cue: parsed(&lookup, "WORDS_PER_CUE", DEFAULT_WORDS_PER_CUE),
            seconds_per_cue: parsed(&lookup, "SECONDS_PER_CUE", DEFAULT_SECONDS_PER_CUE),
            ffmpeg_path: string("FFMPEG_PATH", "ffmpeg"),
            ffprobe_path: string("FFPROBE_PATH", "ffprobe"),
            serve_upload_form: parsed(&lookup, "SERVE_UPLOAD_FORM", true),
            addr,
            port,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn subtitle_settings(&self) -> SubtitleSettings {
        SubtitleSettings::new(self.words_per_cue, self.seconds_per_cue)
    }

    /// URL prefix of the static route serving processed outputs.
    pub fn download_base(&self) -> String {
        format!(
            "{}{}",
            self.public_base_url.trim_end_matches('/'),
            PROCESSED_ROUTE
        )
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
