// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content catalog commands

use super::{read_json, require_persisted, FileStore};
use crate::output::{self, column, OutputFormat};
use anyhow::bail;
use clap::{Args, Subcommand};
use dfd_core::ContentEntry;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Args)]
pub struct EntriesArgs {
    #[command(subcommand)]
    pub command: EntriesCommand,
}

#[derive(Subcommand)]
pub enum EntriesCommand {
    /// List catalog entries
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show one or more entries by name
    Show {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Add or replace entries from a JSON file (`-` for stdin)
    Add {
        /// A single entry or a list of entries
        file: PathBuf,
    },
    /// Remove entries by name
    Remove {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryInput {
    Many(Vec<ContentEntry>),
    One(Box<ContentEntry>),
}

impl EntryInput {
    fn into_entries(self) -> Vec<ContentEntry> {
        match self {
            EntryInput::Many(entries) => entries,
            EntryInput::One(entry) => vec![*entry],
        }
    }
}

pub async fn handle(store: &FileStore, command: EntriesCommand) -> anyhow::Result<()> {
    match command {
        EntriesCommand::List { format } => list(store, format),
        EntriesCommand::Show { names, format } => show(store, &names, format),
        EntriesCommand::Add { file } => add(store, file).await,
        EntriesCommand::Remove { names } => remove(store, names).await,
    }
}

fn list(store: &FileStore, format: OutputFormat) -> anyhow::Result<()> {
    let mut entries = store.get_all_content_entries();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    if format == OutputFormat::Json {
        return output::print_json(&entries);
    }
    if entries.is_empty() {
        println!("No entries");
        return Ok(());
    }

    println!("{:<32} {:<12} TITLE", "NAME", "STATUS");
    for entry in entries {
        println!(
            "{:<32} {:<12} {}",
            column(&entry.name, 32),
            entry.status_info.name(),
            entry.content_info.title
        );
    }
    Ok(())
}

fn show(store: &FileStore, names: &[String], format: OutputFormat) -> anyhow::Result<()> {
    let found = store.get_content_entry_list(names);
    let missing: Vec<&str> = names
        .iter()
        .zip(&found)
        .filter(|(_, entry)| entry.is_none())
        .map(|(name, _)| name.as_str())
        .collect();

    let entries: Vec<ContentEntry> = found.into_iter().flatten().collect();
    match format {
        OutputFormat::Json => output::print_json(&entries)?,
        OutputFormat::Text => {
            for entry in &entries {
                println!("Entry: {}", entry.name);
                println!("  Title: {}", entry.content_info.title);
                println!("  Status: {}", entry.status_info);
                println!("  Data version: {}", entry.data_version);
            }
        }
    }

    if !missing.is_empty() {
        bail!("entry not found: {}", missing.join(", "));
    }
    Ok(())
}

async fn add(store: &FileStore, file: PathBuf) -> anyhow::Result<()> {
    let input: EntryInput = read_json(&file)?;
    let entries = input.into_entries();
    let count = entries.len();

    let durability = store.add_content_entries(entries).await;
    require_persisted(store, durability)?;
    println!("Added {} entr{}", count, if count == 1 { "y" } else { "ies" });
    Ok(())
}

async fn remove(store: &FileStore, names: Vec<String>) -> anyhow::Result<()> {
    let present = store.get_content_entry_map(&names).len();
    let durability = store.remove_content_entries(names).await;
    require_persisted(store, durability)?;
    println!("Removed {} entr{}", present, if present == 1 { "y" } else { "ies" });
    Ok(())
}
