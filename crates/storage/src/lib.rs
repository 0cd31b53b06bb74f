// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dfd-storage: the downloader's operational document store
//!
//! A single JSON document holds the content catalog, the signed-in user and
//! first-run state. On startup the document is backed up, migrated to the
//! current schema and validated; afterwards every mutation is written back
//! through a single-writer queue with retries.

pub mod backend;
pub mod backup;
pub mod config;
mod error;
pub mod migrate;
pub mod queue;
pub mod schema;
mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use backend::{Backend, BackendError, FileBackend, DOCUMENT_FILE};
pub use backup::{BackupError, BackupManager, BackupMeta};
pub use config::{ConfigError, StoreConfig};
pub use error::StoreError;
pub use migrate::{MigrationError, MigrationReport, Migrator};
pub use queue::{QueueConfig, QueueError, TaskHandle, WorkQueue};
pub use schema::{Document, ValidationError, CURRENT_VERSION};
pub use store::{Durability, DocumentSummary, InitInfo, Store, WriteHealth};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBackend, FakeBackup};
