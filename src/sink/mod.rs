//! Durable storage seam for extracted collections.
//!
//! The engine only needs "write these bytes under this name"; everything
//! else about storage is a downstream concern. [`DirSink`] covers the
//! standalone deployment by writing into a local directory.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from writing one artifact.
#[derive(Debug, Error)]
pub enum SinkError {
    /// File system error while writing the artifact.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The destination path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Write-only destination for serialized collections.
///
/// The engine never reads back what it writes. Upload failures are scoped
/// to one artifact; other kinds proceed independently.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Stores `bytes` under `name`, overwriting any previous artifact.
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError>;
}

/// Sink writing artifacts as files under one directory.
#[derive(Debug, Clone)]
pub struct DirSink {
    root: PathBuf,
}

impl DirSink {
    /// Creates a sink rooted at `root`. The directory is created on first
    /// upload if missing.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the sink's root directory.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl Sink for DirSink {
    #[instrument(skip(self, bytes), fields(root = %self.root.display()))]
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| SinkError::Io {
                path: self.root.clone(),
                source,
            })?;

        let path = self.root.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dir_sink_writes_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DirSink::new(temp_dir.path());

        sink.upload("genres.json", b"[]").await.unwrap();

        let written = std::fs::read(temp_dir.path().join("genres.json")).unwrap();
        assert_eq!(written, b"[]");
    }

    #[tokio::test]
    async fn test_dir_sink_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("exports").join("latest");
        let sink = DirSink::new(&nested);

        sink.upload("games.json", b"[1]").await.unwrap();

        assert_eq!(std::fs::read(nested.join("games.json")).unwrap(), b"[1]");
    }

    #[tokio::test]
    async fn test_dir_sink_overwrites_previous_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DirSink::new(temp_dir.path());

        sink.upload("games.json", b"old").await.unwrap();
        sink.upload("games.json", b"new").await.unwrap();

        assert_eq!(
            std::fs::read(temp_dir.path().join("games.json")).unwrap(),
            b"new"
        );
    }

    #[tokio::test]
    async fn test_dir_sink_unwritable_root_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("not-a-dir");
        std::fs::write(&file_path, b"occupied").unwrap();

        // Root collides with an existing file, so create_dir_all fails.
        let sink = DirSink::new(&file_path);
        let result = sink.upload("games.json", b"[]").await;

        assert!(matches!(result, Err(SinkError::Io { .. })));
    }
}
