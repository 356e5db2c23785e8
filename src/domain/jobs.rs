use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const SUBTITLE_SUFFIX: &str = ".srt";
pub const OUTPUT_PREFIX: &str = "processed-";
pub const OUTPUT_EXTENSION: &str = "mp4";

/// One transcoding run, from upload hand-off to cleanup.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub source_video_path: PathBuf,
    pub transcript_text: String,
    pub subtitle_path: PathBuf,
    pub output_path: PathBuf,
    pub output_file_name: String,
}

impl Job {
    /// Build a job for `source_video_path`; the output lands at `output_dir/output_file_name`.
    pub fn new(
        id: Uuid,
        source_video_path: PathBuf,
        transcript_text: String,
        output_dir: &Path,
        output_file_name: String,
    ) -> Self {
        Self {
            id,
            subtitle_path: subtitle_path_for(&source_video_path),
            output_path: output_dir.join(&output_file_name),
            source_video_path,
            transcript_text,
            output_file_name,
        }
    }

    /// Intermediate files removed once the job reaches a terminal state.
    pub fn intermediates(&self) -> [PathBuf; 2] {
        [self.source_video_path.clone(), self.subtitle_path.clone()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Waiting behind the admission gate
    Queued,
    Running,
    Succeeded { download_url: String },
    Failed { message: String },
}

/// `<video path>.srt`, kept next to the upload so the job never tracks the name separately.
pub fn subtitle_path_for(video_path: &Path) -> PathBuf {
    let mut raw = video_path.as_os_str().to_owned();
    raw.push(SUBTITLE_SUFFIX);
    PathBuf::from(raw)
}

pub fn output_file_name(unix_millis: u64) -> String {
    format!("{}{}.{}", OUTPUT_PREFIX, unix_millis, OUTPUT_EXTENSION)
}

/// Hands out `processed-<unixMillis>.mp4` names that are unique within the process.
///
/// When two calls land in the same millisecond the later one is bumped to the next value.
#[derive(Debug, Default)]
pub struct OutputNamer {
    last: AtomicU64,
}

impl OutputNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_name(&self) -> String {
        self.next_name_at(unix_millis())
    }

    fn next_name_at(&self, now: u64) -> String {
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return output_file_name(candidate),
                Err(actual) => prev = actual,
            }
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Turns noisy engine percentages into a strictly increasing series of integers in `[0, 100]`.
#[derive(Debug, Default)]
pub struct ProgressGate {
    last: Option<u8>,
}

impl ProgressGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value to forward, or `None` when it would repeat or go backward.
    pub fn admit(&mut self, percent: f64) -> Option<u8> {
        if percent.is_nan() {
            return None;
        }
        let value = percent.round().clamp(0.0, 100.0) as u8;
        match self.last {
            Some(last) if value <= last => None,
            _ => {
                self.last = Some(value);
                Some(value)
            }
        }
    }
}
