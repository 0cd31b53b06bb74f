// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signed-in user commands

use super::{read_json, require_persisted, FileStore};
use crate::output::{self, OutputFormat};
use clap::{Args, Subcommand};
use dfd_core::UserInfo;
use std::path::PathBuf;

#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Show the stored user
    Show {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Replace the stored user from a JSON file (`-` for stdin)
    Set { file: PathBuf },
}

pub async fn handle(store: &FileStore, command: UserCommand) -> anyhow::Result<()> {
    match command {
        UserCommand::Show { format } => {
            let user = store.get_user_info();
            match (format, user) {
                (OutputFormat::Json, user) => output::print_json(&user)?,
                (OutputFormat::Text, None) => println!("No user"),
                (OutputFormat::Text, Some(user)) => {
                    println!("User: {}", user.username);
                    if let Some(tier) = &user.tier {
                        println!("  Tier: {}", tier);
                    }
                }
            }
            Ok(())
        }
        UserCommand::Set { file } => {
            let user: UserInfo = read_json(&file)?;
            let username = user.username.clone();
            let durability = store.set_user_info(user).await;
            require_persisted(store, durability)?;
            println!("User set: {}", username);
            Ok(())
        }
    }
}
