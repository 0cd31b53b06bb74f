// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary store directory and the `dfd` command pointed at it
pub struct TestStore {
    pub dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Start from an existing document
    pub fn with_document(document: &Value) -> Self {
        let store = Self::new();
        fs::write(store.document_path(), document.to_string()).expect("Failed to seed db.json");
        store
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn document_path(&self) -> PathBuf {
        self.path().join("db.json")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.path().join("backups")
    }

    /// `dfd --db-dir <dir>` with a clean environment
    pub fn dfd(&self) -> Command {
        let mut cmd = bare_dfd();
        cmd.arg("--db-dir").arg(self.path());
        cmd
    }

    /// The document currently on disk
    pub fn document(&self) -> Value {
        let bytes = fs::read(self.document_path()).expect("Failed to read db.json");
        serde_json::from_slice(&bytes).expect("db.json is not JSON")
    }

    pub fn backup_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.backups_dir()) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        files.sort();
        files
    }

    /// Write a JSON input file next to the store
    pub fn input(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, value.to_string()).expect("Failed to write input file");
        path
    }
}

/// `dfd` with store-related environment cleared
pub fn bare_dfd() -> Command {
    let mut cmd = Command::cargo_bin("dfd").expect("dfd binary not built");
    cmd.env_remove("DB_DIR").env_remove("RUST_LOG");
    cmd
}
