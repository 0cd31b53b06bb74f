// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the operational store

use crate::backend::BackendError;
use crate::backup::BackupError;
use crate::migrate::MigrationError;
use crate::queue::QueueError;
use crate::schema::ValidationError;
use thiserror::Error;

/// Errors surfaced by [`crate::Store`]
///
/// Every variant is fatal when returned from `init`. Steady-state write
/// failures are not returned at all; see [`crate::Durability`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot migrate document: {0}")]
    Migration(#[from] MigrationError),
    #[error("backup failed: {0}")]
    Backup(#[from] BackupError),
    #[error("document write failed: {0}")]
    WriteFailure(#[source] QueueError),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl StoreError {
    /// The on-disk version has no migration path
    pub fn is_unsupported_version(&self) -> bool {
        matches!(
            self,
            StoreError::Migration(MigrationError::UnsupportedVersion { .. })
        )
    }
}
