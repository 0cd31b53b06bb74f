// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup commands

use super::FileStore;
use crate::output::{self, OutputFormat};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args)]
pub struct BackupsArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupRow {
    path: PathBuf,
    version: String,
    timestamp_ms: i64,
}

pub async fn backup(store: &FileStore) -> anyhow::Result<()> {
    match store.backup().await? {
        Some(path) => println!("Backup written: {}", path.display()),
        None => println!("Nothing to back up"),
    }
    Ok(())
}

pub async fn list(store: &FileStore, args: BackupsArgs) -> anyhow::Result<()> {
    let backups = store.backend().backups().list_backups().await?;

    if args.format == OutputFormat::Json {
        let rows: Vec<BackupRow> = backups
            .into_iter()
            .map(|b| BackupRow {
                path: b.path,
                version: b.version,
                timestamp_ms: b.timestamp_ms,
            })
            .collect();
        return output::print_json(&rows);
    }

    if backups.is_empty() {
        println!("No backups");
        return Ok(());
    }
    println!("{:<12} {:<15} PATH", "VERSION", "TIMESTAMP");
    for b in backups {
        println!("{:<12} {:<15} {}", b.version, b.timestamp_ms, b.path.display());
    }
    Ok(())
}
