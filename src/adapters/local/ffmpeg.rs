//! ffmpeg-backed transcoding engine.
//!
//! Runs `ffmpeg` as a subprocess with `-progress pipe:1` and turns the
//! key/value progress blocks into `EngineEvent`s. Total duration comes from
//! `ffprobe`; without it only the terminal event is reported.

use crate::ports::engine::{
    CaptionStyle, EngineEvent, EngineEvents, TranscodeEngine, TranscodeRequest,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 32;
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found in PATH")]
    NotFound(String),

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },

    #[error("ffmpeg exited with status {code:?}: {stderr}")]
    Exited { code: Option<i32>, stderr: String },
}

#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Input duration in microseconds, if ffprobe can tell.
    async fn probe_duration_us(&self, media_path: &Path) -> Option<u64> {
        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(media_path)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let duration = parse_duration_us(&stdout);
                if duration.is_none() {
                    warn!(path = ?media_path, output = %stdout.trim(), "unusable ffprobe duration");
                }
                duration
            }
            Ok(output) => {
                warn!(
                    path = ?media_path,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "ffprobe failed, progress will not be reported"
                );
                None
            }
            Err(e) => {
                warn!(program = %self.ffprobe, error = %e, "could not run ffprobe");
                None
            }
        }
    }

    async fn run(
        &self,
        ffmpeg: &Path,
        request: &TranscodeRequest,
        tx: &mpsc::Sender<EngineEvent>,
    ) -> Result<(), EngineError> {
        let total_us = self.probe_duration_us(&request.input).await;
        let args = transcode_args(request);
        debug!("Running ffmpeg {}", args.join(" "));

        let io_err = |source: std::io::Error| EngineError::Io {
            program: self.ffmpeg.clone(),
            source,
        };

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(io_err)?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            Vec::from(tail).join("\n")
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            let mut progress = ProgressBlock::default();
            while let Ok(Some(line)) = lines.next_line().await {
                let Some(out_time_us) = progress.feed(&line) else {
                    continue;
                };
                if let Some(total_us) = total_us {
                    // A closed receiver means the job stopped listening; keep draining so ffmpeg can finish.
                    let _ = tx
                        .send(EngineEvent::Progress(percent_of(out_time_us, total_us)))
                        .await;
                }
            }
        }

        let status = child.wait().await.map_err(io_err)?;
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            info!(output = ?request.output, "ffmpeg finished");
            Ok(())
        } else {
            Err(EngineError::Exited {
                code: status.code(),
                stderr,
            })
        }
    }
}

impl TranscodeEngine for FfmpegEngine {
    fn start(&self, request: TranscodeRequest) -> EngineEvents {
        let ffmpeg = match which::which(&self.ffmpeg) {
            Ok(path) => path,
            Err(_) => {
                let error = EngineError::NotFound(self.ffmpeg.clone());
                return EngineEvents::failed(error.to_string());
            }
        };

        let (tx, events) = EngineEvents::channel(EVENT_BUFFER);
        let engine = self.clone();
        tokio::spawn(async move {
            let terminal = match engine.run(&ffmpeg, &request, &tx).await {
                Ok(()) => EngineEvent::Completed,
                Err(e) => EngineEvent::Failed(e.to_string()),
            };
            let _ = tx.send(terminal).await;
        });
        events
    }
}

/// Command line for one burn-in transcode.
pub fn transcode_args(request: &TranscodeRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-v".into(),
        "error".into(),
        "-nostats".into(),
        "-progress".into(),
        "pipe:1".into(),
        "-i".into(),
        request.input.to_string_lossy().into_owned(),
    ];
    if let Some(subtitles) = &request.subtitles {
        args.push("-vf".into());
        args.push(subtitles_filter(subtitles, &request.style));
    }
    args.push("-c:a".into());
    args.push("aac".into());
    args.push(request.output.to_string_lossy().into_owned());
    args
}

/// `subtitles` filter description, escaped for both the option parser and the filtergraph parser.
pub fn subtitles_filter(path: &Path, style: &CaptionStyle) -> String {
    let options = format!(
        "filename={}:force_style={}",
        escape_option_value(&path.to_string_lossy()),
        escape_option_value(&style.force_style())
    );
    format!("subtitles={}", escape_filtergraph(&options))
}

fn escape_option_value(value: &str) -> String {
    escape_chars(value, &['\\', '\'', ':'])
}

fn escape_filtergraph(value: &str) -> String {
    escape_chars(value, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Accumulates one `-progress` block; yields the output time when the block closes.
#[derive(Debug, Default)]
struct ProgressBlock {
    out_time_us: Option<u64>,
}

impl ProgressBlock {
    fn feed(&mut self, line: &str) -> Option<u64> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // ffmpeg reports `out_time_ms` in microseconds as well.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<u64>() {
                    self.out_time_us = Some(us);
                }
                None
            }
            "progress" => self.out_time_us.take(),
            _ => None,
        }
    }
}

fn percent_of(out_time_us: u64, total_us: u64) -> f64 {
    if total_us == 0 {
        return 0.0;
    }
    (out_time_us as f64 / total_us as f64 * 100.0).min(100.0)
}

fn parse_duration_us(raw: &str) -> Option<u64> {
    let seconds: f64 = raw.trim().parse().ok()?;
    if seconds.is_finite() && seconds > 0.0 {
        Some((seconds * 1_000_000.0) as u64)
    } else {
        None
    }
}

/// Resolve a configured program name the same way `start` does.
pub fn locate(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}
