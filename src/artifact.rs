//! The test artifact sent by every attempt of a run.

use std::path::Path;

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {path} is empty")]
    Empty { path: String },
}

/// Binary content plus the metadata needed to build a multipart part.
///
/// Cloning is cheap; all attempts of a run share the same buffer.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Artifact {
    pub fn new(
        bytes: impl Into<Bytes>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read an artifact from disk, inferring its content type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, ArtifactError> {
        let shown = path.display().to_string();
        let data = tokio::fs::read(path).await.map_err(|source| ArtifactError::Read {
            path: shown.clone(),
            source,
        })?;
        if data.is_empty() {
            return Err(ArtifactError::Empty { path: shown });
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());

        tracing::debug!(path = %shown, bytes = data.len(), "loaded artifact");
        Ok(Self::new(data, file_name, content_type_for(path)))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Content type for the document kinds the upload endpoint accepts.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
