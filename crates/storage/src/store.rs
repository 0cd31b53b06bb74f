// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operational store
//!
//! [`Store`] owns the in-memory [`Document`] and is the only thing allowed to
//! change it. Every mutation is applied in memory first, so readers see it
//! immediately, and then a whole-document write is queued on the store's
//! single-writer [`WorkQueue`].
//!
//! Write failures after startup do not fail the mutation: the change stays
//! in memory, the failure is logged and counted in [`WriteHealth`], and the
//! caller gets [`Durability::NotPersisted`]. Any failure during
//! [`Store::init`] is fatal.

use crate::backend::{Backend, BackendError, FileBackend};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::migrate::{self, MigrationContext, MigrationReport, Migrator, NO_VERSION};
use crate::queue::{QueueConfig, TaskHandle, WorkQueue};
use crate::schema::{self, Document};
use chrono::{DateTime, Utc};
use dfd_core::{Clock, ContentEntry, SystemClock, UserInfo};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Whether a mutation reached disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Applied in memory and written to disk
    Persisted,
    /// Applied in memory only; the write exhausted its retries
    NotPersisted,
    /// Nothing to apply, nothing written
    Unchanged,
}

impl Durability {
    pub fn is_durable(&self) -> bool {
        !matches!(self, Durability::NotPersisted)
    }
}

/// Accumulated steady-state write failures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteHealth {
    pub failed_writes: u64,
    pub last_error: Option<String>,
}

/// Result of [`Store::init`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitInfo {
    /// The first-run flag has not been set yet
    pub first_run: bool,
    /// Present when an on-disk document was upgraded
    pub migration: Option<MigrationReport>,
    /// Backup taken before migrating
    pub backup: Option<PathBuf>,
}

/// Snapshot of the document's top-level state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub version: String,
    pub entries: usize,
    pub has_user: bool,
    pub first_run_complete: bool,
    pub refetch_required: bool,
    pub last_updated: DateTime<Utc>,
}

struct Shared<B, C> {
    backend: B,
    clock: C,
    document: Mutex<Document>,
    health: Mutex<WriteHealth>,
}

impl<B: Backend, C: Clock> Shared<B, C> {
    fn document(&self) -> MutexGuard<'_, Document> {
        self.document.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialize the current document and replace the backing file
    async fn write_document(&self) -> Result<(), BackendError> {
        let (bytes, entries) = {
            let mut document = self.document();
            document.last_updated = self.clock.now();
            let file = document.to_file();
            (serde_json::to_vec_pretty(&file)?, file.content_info.len())
        };

        tracing::info!(entries, "writing document");
        let start = std::time::Instant::now();
        self.backend.save(&bytes).await?;
        tracing::info!(
            entries,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "wrote document"
        );
        Ok(())
    }
}

/// Catalog and user state store
pub struct Store<B: Backend, C: Clock = SystemClock> {
    shared: Arc<Shared<B, C>>,
    queue: WorkQueue,
}

impl<B: Backend, C: Clock> Clone for Store<B, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            queue: self.queue.clone(),
        }
    }
}

impl Store<FileBackend, SystemClock> {
    /// Open and initialize the file store described by `config`
    pub async fn open(config: &StoreConfig) -> Result<(Self, InitInfo), StoreError> {
        let backend = FileBackend::open(&config.db_dir)?;
        Self::init(backend, SystemClock, config.queue.clone()).await
    }
}

impl<B: Backend, C: Clock> Store<B, C> {
    /// Load (or create) the document, migrating and validating it, then
    /// persist it once
    pub async fn init(
        backend: B,
        clock: C,
        queue: QueueConfig,
    ) -> Result<(Self, InitInfo), StoreError> {
        Self::init_with_migrator(backend, clock, queue, &Migrator::standard()).await
    }

    /// [`Store::init`] with a custom migration chain
    ///
    /// Only the retry settings of `queue` apply; the store always writes
    /// through a single lane so saves never overlap.
    pub async fn init_with_migrator(
        backend: B,
        clock: C,
        queue: QueueConfig,
        migrator: &Migrator,
    ) -> Result<(Self, InitInfo), StoreError> {
        let (document, migration, backup) = match backend.load().await? {
            None => {
                tracing::info!("no document on disk, starting a new catalog");
                let mut document = Document::new(clock.now());
                document.version = migrator.current().to_string();
                (document, None, None)
            }
            Some(mut raw) => {
                let plan = migrator.plan(&raw)?;
                if plan.is_empty() {
                    tracing::info!(
                        version = migrator.current(),
                        "document already at current version, no migrations to apply"
                    );
                    (schema::validate(&raw, migrator.current())?, None, None)
                } else {
                    let from = migrate::declared_version(&raw)?;
                    let from_name = from.as_deref().unwrap_or(NO_VERSION);
                    tracing::info!(version = from_name, "backing up document before migration");
                    let backup = backend.backup(from.as_deref(), clock.epoch_millis()).await?;

                    let ctx = MigrationContext { now: clock.now() };
                    let report = migrator.apply(&mut raw, &plan, &ctx)?;
                    tracing::info!(
                        from = from_name,
                        to = %report.to,
                        refetch_required = report.refetch_required,
                        "document migrated"
                    );
                    (
                        schema::validate(&raw, migrator.current())?,
                        Some(report),
                        backup,
                    )
                }
            }
        };

        if queue.concurrency != 1 {
            tracing::warn!(
                requested = queue.concurrency,
                "store writes are serialized, ignoring queue concurrency"
            );
        }
        let queue = QueueConfig {
            concurrency: 1,
            ..queue
        };

        let first_run = !document.first_run_complete;
        let store = Self {
            shared: Arc::new(Shared {
                backend,
                clock,
                document: Mutex::new(document),
                health: Mutex::default(),
            }),
            queue: WorkQueue::new(queue),
        };

        // A migrated document that cannot be written back is not safe to serve
        store
            .enqueue_write()
            .await
            .map_err(StoreError::WriteFailure)?;

        Ok((
            store,
            InitInfo {
                first_run,
                migration,
                backup,
            },
        ))
    }

    fn enqueue_write(&self) -> TaskHandle<()> {
        let shared = Arc::clone(&self.shared);
        self.queue.enqueue(move || {
            let shared = Arc::clone(&shared);
            async move { shared.write_document().await }
        })
    }

    async fn persist(&self) -> Durability {
        match self.enqueue_write().await {
            Ok(()) => Durability::Persisted,
            Err(e) => {
                tracing::error!(error = %e, "document write failed, change is held in memory only");
                let mut health = self.shared.health.lock().unwrap_or_else(|e| e.into_inner());
                health.failed_writes += 1;
                health.last_error = Some(e.to_string());
                Durability::NotPersisted
            }
        }
    }

    /// Upsert entries by name; later duplicates in `entries` win
    pub async fn add_content_entries<I>(&self, entries: I) -> Durability
    where
        I: IntoIterator<Item = ContentEntry>,
    {
        let added = {
            let mut document = self.shared.document();
            let mut added = 0usize;
            for entry in entries {
                document.content_info.insert(entry.name.clone(), entry);
                added += 1;
            }
            added
        };
        if added == 0 {
            return Durability::Unchanged;
        }
        tracing::debug!(added, "upserted content entries");
        self.persist().await
    }

    pub fn get_all_content_entries(&self) -> Vec<ContentEntry> {
        self.shared.document().content_info.values().cloned().collect()
    }

    /// One slot per requested name, `None` for unknown names
    pub fn get_content_entry_list<S: AsRef<str>>(&self, names: &[S]) -> Vec<Option<ContentEntry>> {
        let document = self.shared.document();
        names
            .iter()
            .map(|name| {
                let name: &str = name.as_ref();
                document.content_info.get(name).cloned()
            })
            .collect()
    }

    /// Known names only
    pub fn get_content_entry_map<S: AsRef<str>>(&self, names: &[S]) -> HashMap<String, ContentEntry> {
        let document = self.shared.document();
        names
            .iter()
            .filter_map(|name| {
                let name: &str = name.as_ref();
                document
                    .content_info
                    .get(name)
                    .map(|entry| (name.to_string(), entry.clone()))
            })
            .collect()
    }

    pub fn get_content_entry(&self, name: &str) -> Option<ContentEntry> {
        self.shared.document().content_info.get(name).cloned()
    }

    /// Delete named entries; unknown names are ignored
    pub async fn remove_content_entries<I, S>(&self, names: I) -> Durability
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = {
            let mut document = self.shared.document();
            names
                .into_iter()
                .filter(|name| {
                    let name: &str = name.as_ref();
                    document.content_info.remove(name).is_some()
                })
                .count()
        };
        tracing::debug!(removed, "removed content entries");
        self.persist().await
    }

    pub async fn set_user_info(&self, user: UserInfo) -> Durability {
        self.shared.document().user = Some(user);
        self.persist().await
    }

    pub fn get_user_info(&self) -> Option<UserInfo> {
        self.shared.document().user.clone()
    }

    /// Mark onboarding done; writes every time it is called
    pub async fn set_first_run_complete(&self) -> Durability {
        self.shared.document().first_run_complete = true;
        self.persist().await
    }

    pub fn refetch_required(&self) -> bool {
        self.shared.document().refetch_required
    }

    /// Read and clear the refetch flag, persisting only if it was set
    ///
    /// The durability is [`Durability::Unchanged`] when the flag was clear.
    pub async fn take_refetch_required(&self) -> (bool, Durability) {
        let was_set = std::mem::take(&mut self.shared.document().refetch_required);
        if !was_set {
            return (false, Durability::Unchanged);
        }
        tracing::info!("refetch flag consumed");
        (true, self.persist().await)
    }

    /// Copy the current document file aside
    pub async fn backup(&self) -> Result<Option<PathBuf>, StoreError> {
        let version = self.shared.document().version.clone();
        let timestamp_ms = self.shared.clock.epoch_millis();
        Ok(self
            .shared
            .backend
            .backup(Some(&version), timestamp_ms)
            .await?)
    }

    /// Wait for every write queued before this call
    pub async fn flush(&self) {
        let barrier = self.queue.enqueue(|| async { Ok::<(), Infallible>(()) });
        if barrier.await.is_err() {
            tracing::warn!("work queue closed while flushing");
        }
    }

    pub fn write_health(&self) -> WriteHealth {
        self.shared
            .health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn summary(&self) -> DocumentSummary {
        let document = self.shared.document();
        DocumentSummary {
            version: document.version.clone(),
            entries: document.content_info.len(),
            has_user: document.user.is_some(),
            first_run_complete: document.first_run_complete,
            refetch_required: document.refetch_required,
            last_updated: document.last_updated,
        }
    }

    pub fn backend(&self) -> &B {
        &self.shared.backend
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
