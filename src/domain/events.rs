use serde::Serialize;

/// Events pushed to the connected client while a job runs.
///
/// Serialized as `{"event": "processing_progress", "data": {"progress": 45}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ProcessingEvent {
    ProcessingProgress {
        progress: u8,
    },
    ProcessingComplete {
        #[serde(rename = "downloadUrl")]
        download_url: String,
    },
    ProcessingError {
        message: String,
    },
}

impl ProcessingEvent {
    pub fn progress(progress: u8) -> Self {
        Self::ProcessingProgress {
            progress: progress.min(100),
        }
    }

    pub fn complete(download_url: impl Into<String>) -> Self {
        Self::ProcessingComplete {
            download_url: download_url.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ProcessingProgress { .. } => "processing_progress",
            Self::ProcessingComplete { .. } => "processing_complete",
            Self::ProcessingError { .. } => "processing_error",
        }
    }
}
