use crate::ports::storage::{ArtifactError, ArtifactStore};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FsAdapter {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl FsAdapter {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsAdapter {
    async fn ensure_layout(&self) -> Result<(), ArtifactError> {
        for dir in [&self.upload_dir, &self.output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ArtifactError::CreateDir {
                    path: dir.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn write_subtitles(&self, path: &Path, contents: &str) -> Result<(), ArtifactError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|source| ArtifactError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn cleanup(&self, paths: &[PathBuf]) -> usize {
        let mut removed = 0;
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    debug!(path = ?path, "removed intermediate file");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = ?path, "intermediate file already gone");
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "failed to remove intermediate file");
                }
            }
        }
        removed
    }
}
