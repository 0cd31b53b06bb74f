// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.

use dfd_storage::{MigrationError, StoreError};
use std::fmt;
use std::path::Path;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct DfdError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl DfdError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Explain a failed store open
    pub fn from_open(err: &StoreError, db_dir: &Path) -> Self {
        let base = DfdError::new(format!("cannot open store in {}", db_dir.display()))
            .with_context(err.to_string());
        match err {
            StoreError::Migration(MigrationError::UnsupportedVersion { version }) => base
                .with_context(format!("document version {version} is newer than this build understands"))
                .with_suggestion("upgrade dfd, or restore a backup from the backups/ directory"),
            StoreError::Migration(MigrationError::Malformed { .. }) | StoreError::Validation(_) => base
                .with_suggestion("inspect db.json, or restore a backup from the backups/ directory"),
            StoreError::Backup(_) => base
                .with_context("the document is only migrated after a backup succeeds")
                .with_suggestion("check that the backups/ directory is writable"),
            StoreError::WriteFailure(_) | StoreError::Backend(_) => base
                .with_suggestion(format!("check permissions on {}", db_dir.display())),
        }
    }
}

impl fmt::Display for DfdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for DfdError {}
