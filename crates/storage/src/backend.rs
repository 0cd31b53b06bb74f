// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage backends for the document
//!
//! A backend stores exactly one document and replaces it whole on every save.

use crate::backup::{BackupError, BackupManager};
use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// File name of the document inside the store directory
pub const DOCUMENT_FILE: &str = "db.json";

/// Errors that can occur reading or writing the document
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("document at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0}")]
    Unavailable(String),
}

/// Persistence for the single store document
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Read the raw document, `None` when nothing has been written yet
    async fn load(&self) -> Result<Option<Value>, BackendError>;

    /// Replace the whole document with `bytes`
    async fn save(&self, bytes: &[u8]) -> Result<(), BackendError>;

    /// Copy the current document aside, `None` when there is nothing to copy
    async fn backup(
        &self,
        version: Option<&str>,
        timestamp_ms: i64,
    ) -> Result<Option<PathBuf>, BackupError>;
}

/// Document stored as `<db_dir>/db.json`
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    path: PathBuf,
    backups: BackupManager,
}

impl FileBackend {
    /// Open a backend rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| BackendError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(DOCUMENT_FILE);
        let backups = BackupManager::new(&dir, &path);
        Ok(Self { dir, path, backups })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn io_error(&self, path: &Path) -> impl FnOnce(io::Error) -> BackendError {
        let path = path.to_path_buf();
        move |source| BackendError::Io { path, source }
    }
}

#[async_trait]
impl Backend for FileBackend {
    async fn load(&self) -> Result<Option<Value>, BackendError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(&self.path)(e)),
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| BackendError::Json {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(value))
    }

    /// Write-to-temp + fsync + rename, so readers never see a partial file
    async fn save(&self, bytes: &[u8]) -> Result<(), BackendError> {
        let tmp_path = self.tmp_path();

        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(self.io_error(&tmp_path))?;
        file.write_all(bytes)
            .await
            .map_err(self.io_error(&tmp_path))?;
        file.sync_all().await.map_err(self.io_error(&tmp_path))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(self.io_error(&self.path))?;

        // fsync the directory so the rename itself is durable
        #[cfg(unix)]
        {
            if let Ok(dir) = tokio::fs::File::open(&self.dir).await {
                let _ = dir.sync_all().await;
            }
        }

        Ok(())
    }

    async fn backup(
        &self,
        version: Option<&str>,
        timestamp_ms: i64,
    ) -> Result<Option<PathBuf>, BackupError> {
        self.backups.backup(version, timestamp_ms).await
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
