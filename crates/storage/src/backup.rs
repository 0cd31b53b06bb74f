// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup management for the document file
//!
//! Backups are byte-for-byte copies of the document file named
//! `db-<version>-<epoch-millis>.json` under `<db_dir>/backups/`.

use crate::migrate::NO_VERSION;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Subdirectory of the store directory holding backups
pub const BACKUP_DIR: &str = "backups";

/// Errors that can occur while taking or listing backups
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to create backup directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Metadata parsed from a backup file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupMeta {
    pub path: PathBuf,
    pub version: String,
    pub timestamp_ms: i64,
}

/// Takes and lists backups of one document file
#[derive(Debug, Clone)]
pub struct BackupManager {
    document_path: PathBuf,
    backups_dir: PathBuf,
}

impl BackupManager {
    /// Manage backups of `document_path`, kept under `<db_dir>/backups`
    pub fn new(db_dir: &Path, document_path: &Path) -> Self {
        Self {
            document_path: document_path.to_path_buf(),
            backups_dir: db_dir.join(BACKUP_DIR),
        }
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// File name for a backup of `version` taken at `timestamp_ms`
    pub fn file_name(version: Option<&str>, timestamp_ms: i64) -> String {
        format!("db-{}-{}.json", version.unwrap_or(NO_VERSION), timestamp_ms)
    }

    /// Copy the document file aside
    ///
    /// Returns `None` when there is no document file yet. If a backup with
    /// the same name exists, the next free millisecond is used.
    pub async fn backup(
        &self,
        version: Option<&str>,
        timestamp_ms: i64,
    ) -> Result<Option<PathBuf>, BackupError> {
        if !tokio::fs::try_exists(&self.document_path).await? {
            tracing::debug!(path = %self.document_path.display(), "no document to back up");
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.backups_dir)
            .await
            .map_err(|source| BackupError::CreateDir {
                path: self.backups_dir.clone(),
                source,
            })?;

        let mut timestamp_ms = timestamp_ms;
        let mut target = self.backups_dir.join(Self::file_name(version, timestamp_ms));
        while tokio::fs::try_exists(&target).await? {
            timestamp_ms += 1;
            target = self.backups_dir.join(Self::file_name(version, timestamp_ms));
        }

        tokio::fs::copy(&self.document_path, &target)
            .await
            .map_err(|source| BackupError::Copy {
                from: self.document_path.clone(),
                to: target.clone(),
                source,
            })?;

        tracing::info!(
            version = version.unwrap_or(NO_VERSION),
            path = %target.display(),
            "backed up document"
        );
        Ok(Some(target))
    }

    /// All backups, newest first
    pub async fn list_backups(&self) -> Result<Vec<BackupMeta>, BackupError> {
        if !tokio::fs::try_exists(&self.backups_dir).await? {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if let Some(meta) = parse_backup_name(&path) {
                backups.push(meta);
            }
        }

        backups.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        Ok(backups)
    }
}

fn parse_backup_name(path: &Path) -> Option<BackupMeta> {
    if path.extension().map(|e| e != "json").unwrap_or(true) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let rest = stem.strip_prefix("db-")?;
    let (version, millis) = rest.rsplit_once('-')?;
    let timestamp_ms = millis.parse().ok()?;
    Some(BackupMeta {
        path: path.to_path_buf(),
        version: version.to_string(),
        timestamp_ms,
    })
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
