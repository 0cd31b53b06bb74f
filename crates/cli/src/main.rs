// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dfd - downloader operational store CLI

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{backup, entries, status, user, FileStore};
use dfd_storage::StoreConfig;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::error::DfdError;

#[derive(Parser)]
#[command(
    name = "dfd",
    version,
    about = "Inspect and maintain the downloader's operational store"
)]
struct Cli {
    /// Store directory (overrides DB_DIR and the config file)
    #[arg(long, global = true)]
    db_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show store status, migrating the document if needed
    Status(status::StatusArgs),
    /// Content catalog entries
    Entries(entries::EntriesArgs),
    /// Signed-in user
    User(user::UserArgs),
    /// Mark the first run as complete
    FirstRunComplete,
    /// Copy the current document into backups/
    Backup,
    /// List backups, newest first
    Backups(backup::BackupsArgs),
    /// Report (and optionally clear) the refetch flag
    Refetch(status::RefetchArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<DfdError>() {
                Some(friendly) => eprint!("{}", friendly),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::from_env(),
    };
    if let Some(dir) = &cli.db_dir {
        config.db_dir = dir.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    tracing::debug!(db_dir = %config.db_dir.display(), "opening store");

    let (store, info) = FileStore::open(&config)
        .await
        .map_err(|e| DfdError::from_open(&e, &config.db_dir))?;

    if let Some(report) = &info.migration {
        eprintln!(
            "Migrated document {} -> {}",
            report.from.as_deref().unwrap_or(dfd_storage::migrate::NO_VERSION),
            report.to
        );
    }

    let result = match cli.command {
        Commands::Status(args) => status::status(&store, &info, args),
        Commands::Entries(args) => entries::handle(&store, args.command).await,
        Commands::User(args) => user::handle(&store, args.command).await,
        Commands::FirstRunComplete => status::first_run_complete(&store).await,
        Commands::Backup => backup::backup(&store).await,
        Commands::Backups(args) => backup::list(&store, args).await,
        Commands::Refetch(args) => status::refetch(&store, args).await,
    };

    store.flush().await;
    result
}
