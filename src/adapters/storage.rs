use crate::domain::ports::{StagedFile, UploadStore};
use crate::utils::error::{Result, ServiceError, TransformError};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Stages uploads as uniquely named files in a local directory.
#[derive(Debug, Clone)]
pub struct LocalUploadStore {
    dir: PathBuf,
}

impl LocalUploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl UploadStore for LocalUploadStore {
    async fn stage(&self, original_name: &str, data: &[u8]) -> Result<StagedFile> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let bytes = data.to_vec();
        let path = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            let mut file = tempfile::Builder::new()
                .prefix("upload-")
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.into_temp_path()
                .keep()
                .map_err(|e| ServiceError::UploadError {
                    message: format!("could not keep staged file: {e}"),
                })
        })
        .await
        .map_err(|e| ServiceError::UploadError {
            message: format!("staging task failed: {e}"),
        })??;

        tracing::debug!("Staged upload '{}' at {}", original_name, path.display());
        Ok(StagedFile {
            path,
            original_name: original_name.to_string(),
        })
    }

    async fn read(&self, file: &StagedFile) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&file.path).await?)
    }

    async fn discard(&self, file: StagedFile) -> Result<()> {
        tokio::fs::remove_file(&file.path).await?;
        tracing::debug!("Removed staged upload {}", file.path.display());
        Ok(())
    }
}

/// Stages an upload, reads it back as UTF-8 text and removes it again. The
/// staged file is discarded exactly once, whether or not reading succeeded.
pub async fn consume_upload(
    store: &dyn UploadStore,
    original_name: &str,
    data: &[u8],
) -> std::result::Result<String, TransformError> {
    let staged = store.stage(original_name, data).await.map_err(|e| {
        tracing::error!("Failed to stage upload '{}': {}", original_name, e);
        TransformError::internal(e.to_string())
    })?;

    let content = store.read(&staged).await;

    if let Err(e) = store.discard(staged).await {
        tracing::warn!("Failed to remove staged upload '{}': {}", original_name, e);
    }

    let bytes = content.map_err(|e| {
        tracing::error!("Failed to read staged upload '{}': {}", original_name, e);
        TransformError::internal(e.to_string())
    })?;

    String::from_utf8(bytes)
        .map_err(|_| TransformError::parse(format!("Uploaded file '{original_name}' is not valid UTF-8 text")))
}
