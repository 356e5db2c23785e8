use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Filesystem layout for uploads, generated subtitles and processed outputs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Create the upload and output directories if they are missing
    async fn ensure_layout(&self) -> Result<(), ArtifactError>;

    /// Directory incoming uploads are written to
    fn upload_dir(&self) -> &Path;

    /// Directory finished outputs are written to
    fn output_dir(&self) -> &Path;

    /// Resolve an output file name inside the output directory
    fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir().join(name)
    }

    /// Persist a rendered subtitle track
    async fn write_subtitles(&self, path: &Path, contents: &str) -> Result<(), ArtifactError>;

    /// Delete intermediate files, skipping any that are already gone.
    /// Returns how many files were actually removed.
    async fn cleanup(&self, paths: &[PathBuf]) -> usize;
}
