use std::path::PathBuf;
use tokio::sync::mpsc;

/// What the engine reports while a transcode runs.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Raw percent complete; may be noisy, repeated or out of range
    Progress(f64),
    Completed,
    Failed(String),
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::Completed | EngineEvent::Failed(_))
    }
}

/// Fixed caption look applied when burning subtitles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionStyle {
    /// ASS numpad alignment, 2 = bottom centre
    pub alignment: u8,
    pub font_size: u32,
    /// ASS colour in `&HAABBGGRR` form
    pub primary_colour: String,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            alignment: 2,
            font_size: 24,
            primary_colour: "&H00FFFFFF".to_string(),
        }
    }
}

impl CaptionStyle {
    /// Value for the subtitles filter's `force_style` option.
    pub fn force_style(&self) -> String {
        format!(
            "Alignment={},FontSize={},PrimaryColour={}",
            self.alignment, self.font_size, self.primary_colour
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    /// Subtitle file to burn in; `None` transcodes without the burn filter
    pub subtitles: Option<PathBuf>,
    pub output: PathBuf,
    pub style: CaptionStyle,
}

/// Typed event stream for one engine invocation.
///
/// The stream ends after the first `Completed` or `Failed` event, even if the
/// producer keeps sending.
#[derive(Debug)]
pub struct EngineEvents {
    rx: mpsc::Receiver<EngineEvent>,
    finished: bool,
}

impl EngineEvents {
    pub fn new(rx: mpsc::Receiver<EngineEvent>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    pub fn channel(buffer: usize) -> (mpsc::Sender<EngineEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }

    /// A stream that replays a fixed sequence and then closes.
    pub fn from_events(events: impl IntoIterator<Item = EngineEvent>) -> Self {
        let events: Vec<EngineEvent> = events.into_iter().collect();
        let (tx, stream) = Self::channel(events.len());
        for event in events {
            // Capacity matches the number of events, so this never hits `Full`.
            let _ = tx.try_send(event);
        }
        stream
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::from_events([EngineEvent::Failed(message.into())])
    }

    pub async fn next(&mut self) -> Option<EngineEvent> {
        if self.finished {
            return None;
        }
        let event = self.rx.recv().await;
        match &event {
            Some(e) if !e.is_terminal() => {}
            _ => self.finished = true,
        }
        event
    }
}

/// The external transcoding engine.
///
/// `start` must not block: it launches the work and hands back the event stream.
/// Both launch failures and mid-run failures are reported as `EngineEvent::Failed`.
#[cfg_attr(test, mockall::automock)]
pub trait TranscodeEngine: Send + Sync {
    fn start(&self, request: TranscodeRequest) -> EngineEvents;
}
