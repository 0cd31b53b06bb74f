// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory backend for testing

use crate::backend::{Backend, BackendError};
use crate::backup::{BackupError, BackupManager};
use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A backup taken by the fake backend
#[derive(Debug, Clone, PartialEq)]
pub struct FakeBackup {
    pub path: PathBuf,
    pub document: Value,
}

#[derive(Default)]
struct FakeState {
    document: Option<Value>,
    writes: Vec<Value>,
    save_attempts: u64,
    fail_writes: u32,
    fail_backups: bool,
    backups: Vec<FakeBackup>,
}

/// In-memory backend that records writes and can inject failures
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a document already "on disk"
    pub fn with_document(document: Value) -> Self {
        let backend = Self::new();
        backend.lock().document = Some(document);
        backend
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The document as last saved
    pub fn document(&self) -> Option<Value> {
        self.lock().document.clone()
    }

    /// Every successfully saved document, oldest first
    pub fn writes(&self) -> Vec<Value> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Saves attempted, including failed ones
    pub fn save_attempts(&self) -> u64 {
        self.lock().save_attempts
    }

    /// Make the next `count` saves fail
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().fail_writes = count;
    }

    pub fn fail_backups(&self, fail: bool) {
        self.lock().fail_backups = fail;
    }

    pub fn backups(&self) -> Vec<FakeBackup> {
        self.lock().backups.clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn load(&self) -> Result<Option<Value>, BackendError> {
        Ok(self.document())
    }

    async fn save(&self, bytes: &[u8]) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.save_attempts += 1;
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(BackendError::Unavailable("injected write failure".to_string()));
        }
        let document: Value = serde_json::from_slice(bytes)?;
        state.document = Some(document.clone());
        state.writes.push(document);
        Ok(())
    }

    async fn backup(
        &self,
        version: Option<&str>,
        timestamp_ms: i64,
    ) -> Result<Option<PathBuf>, BackupError> {
        let mut state = self.lock();
        if state.fail_backups {
            return Err(BackupError::Io(io::Error::other("injected backup failure")));
        }
        let Some(document) = state.document.clone() else {
            return Ok(None);
        };
        let path = PathBuf::from("backups").join(BackupManager::file_name(version, timestamp_ms));
        state.backups.push(FakeBackup {
            path: path.clone(),
            document,
        });
        Ok(Some(path))
    }
}
