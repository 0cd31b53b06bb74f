// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store status and first-run commands

use super::{require_persisted, FileStore};
use crate::output::{self, OutputFormat};
use clap::Args;
use dfd_storage::{DocumentSummary, InitInfo, WriteHealth};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Args)]
pub struct StatusArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Shorthand for --format json
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct RefetchArgs {
    /// Clear the flag after reporting it
    #[arg(long)]
    pub clear: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    path: PathBuf,
    first_run: bool,
    #[serde(flatten)]
    summary: DocumentSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    migrated_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backup: Option<PathBuf>,
    failed_writes: u64,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Store: {}", self.path.display())?;
        writeln!(f, "  Version: {}", self.summary.version)?;
        writeln!(f, "  Entries: {}", self.summary.entries)?;
        writeln!(
            f,
            "  User: {}",
            if self.summary.has_user { "set" } else { "none" }
        )?;
        writeln!(f, "  First run: {}", if self.first_run { "yes" } else { "no" })?;
        writeln!(f, "  Refetch required: {}", if self.summary.refetch_required { "yes" } else { "no" })?;
        write!(f, "  Last updated: {}", self.summary.last_updated.to_rfc3339())?;
        if let Some(from) = &self.migrated_from {
            write!(f, "\n  Migrated from: {}", from)?;
        }
        if let Some(backup) = &self.backup {
            write!(f, "\n  Backup: {}", backup.display())?;
        }
        if self.failed_writes > 0 {
            write!(f, "\n  Failed writes: {}", self.failed_writes)?;
        }
        Ok(())
    }
}

pub fn status(store: &FileStore, info: &InitInfo, args: StatusArgs) -> anyhow::Result<()> {
    let WriteHealth { failed_writes, .. } = store.write_health();
    let report = StatusReport {
        path: store.backend().path().to_path_buf(),
        first_run: info.first_run,
        summary: store.summary(),
        migrated_from: info.migration.as_ref().map(|m| {
            m.from
                .clone()
                .unwrap_or_else(|| dfd_storage::migrate::NO_VERSION.to_string())
        }),
        backup: info.backup.clone(),
        failed_writes,
    };
    let format = if args.json { OutputFormat::Json } else { args.format };
    output::print(&report, format)
}

pub async fn first_run_complete(store: &FileStore) -> anyhow::Result<()> {
    let durability = store.set_first_run_complete().await;
    require_persisted(store, durability)?;
    println!("First run marked complete");
    Ok(())
}

pub async fn refetch(store: &FileStore, args: RefetchArgs) -> anyhow::Result<()> {
    if !args.clear {
        let required = store.refetch_required();
        println!("{}", if required { "refetch required" } else { "up to date" });
        return Ok(());
    }

    let (required, durability) = store.take_refetch_required().await;
    println!("{}", if required { "refetch required" } else { "up to date" });
    require_persisted(store, durability)
}
