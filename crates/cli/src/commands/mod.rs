// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod backup;
pub mod entries;
pub mod status;
pub mod user;

use anyhow::bail;
use dfd_storage::{Durability, FileBackend, Store};
use serde::de::DeserializeOwned;
use std::path::Path;

/// The store as the CLI opens it
pub type FileStore = Store<FileBackend>;

/// Fail the command if its change did not reach disk
pub fn require_persisted(store: &FileStore, durability: Durability) -> anyhow::Result<()> {
    if durability == Durability::NotPersisted {
        let reason = store
            .write_health()
            .last_error
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("change was not written to disk: {reason}");
    }
    Ok(())
}

/// Read a JSON file, or stdin when `path` is `-`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?
    };
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("invalid JSON in {}: {e}", path.display()))
}
