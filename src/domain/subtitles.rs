//! Subtitle synthesis: plain transcript text to a timed SRT track.

use std::fmt::Write;

pub const DEFAULT_WORDS_PER_CUE: usize = 5;
pub const DEFAULT_SECONDS_PER_CUE: u64 = 3;
/// Longest cue a track may use: one day.
pub const MAX_SECONDS_PER_CUE: u64 = 24 * 60 * 60;

/// Tunables for cue grouping and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtitleSettings {
    words_per_cue: usize,
    seconds_per_cue: u64,
}

impl SubtitleSettings {
    /// Zero values are raised to 1 so every cue is non-empty and has a positive duration.
    /// Cue length is capped at [`MAX_SECONDS_PER_CUE`].
    pub fn new(words_per_cue: usize, seconds_per_cue: u64) -> Self {
        Self {
            words_per_cue: words_per_cue.max(1),
            seconds_per_cue: seconds_per_cue.clamp(1, MAX_SECONDS_PER_CUE),
        }
    }

    pub fn words_per_cue(&self) -> usize {
        self.words_per_cue
    }

    pub fn seconds_per_cue(&self) -> u64 {
        self.seconds_per_cue
    }
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self::new(DEFAULT_WORDS_PER_CUE, DEFAULT_SECONDS_PER_CUE)
    }
}

/// A single timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// 1-based position in the track
    pub index: usize,
    pub start_seconds: u64,
    pub end_seconds: u64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleTrack {
    cues: Vec<Cue>,
}

impl SubtitleTrack {
    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Render the track in SubRip format. An empty track renders as an empty string.
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for cue in &self.cues {
            // Writing into a String cannot fail.
            let _ = write!(
                out,
                "{}\n{} --> {}\n{}\n\n",
                cue.index,
                format_timestamp(cue.start_seconds),
                format_timestamp(cue.end_seconds),
                cue.text
            );
        }
        out
    }
}

/// Split `transcript` on whitespace and group the words into fixed-duration cues.
///
/// Cue `i` covers `[i * S, (i + 1) * S)` seconds regardless of how many words it holds.
/// The trailing cue may be shorter than `words_per_cue` but is always emitted.
pub fn synthesize(transcript: &str, settings: &SubtitleSettings) -> SubtitleTrack {
    let words: Vec<&str> = transcript.split_whitespace().collect();
    let step = settings.seconds_per_cue();

    let cues = words
        .chunks(settings.words_per_cue())
        .enumerate()
        .map(|(i, chunk)| {
            let start_seconds = (i as u64).saturating_mul(step);
            Cue {
                index: i + 1,
                start_seconds,
                end_seconds: start_seconds.saturating_add(step),
                text: chunk.join(" "),
            }
        })
        .collect();

    SubtitleTrack { cues }
}

/// Format whole seconds as `HH:MM:SS,000`.
pub fn format_timestamp(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02},000", hours, minutes, seconds)
}
