/*
 * main.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, a mail submission and retrieval client.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! `postino`: send a letter, fetch the mailbox, browse what was fetched.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Log filter variable; falls back to `warn` (or `debug` with --verbose).
const LOG_ENV: &str = "POSTINO_LOG";

#[derive(Parser)]
#[command(name = "postino", about = "Mail submission and retrieval client", version)]
struct Cli {
    /// Enable debug diagnostics on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding account.xml and the encrypted secret (default ~/.postino).
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one letter over SMTP.
    Send {
        #[arg(long)]
        from: String,

        /// Recipients, comma separated.
        #[arg(long, value_delimiter = ',', required = true)]
        to: Vec<String>,

        #[arg(long, default_value = "")]
        subject: String,

        /// Read the body from this file instead of stdin.
        #[arg(long)]
        body_file: Option<PathBuf>,
    },

    /// Download every message from the POP3 mailbox into the message directory.
    Fetch,

    /// Browse saved messages.
    Inbox {
        #[command(subcommand)]
        action: InboxAction,
    },

    /// Manage the account settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum InboxAction {
    /// One line per saved message: id, sender, subject.
    List,
    /// Print a saved message.
    Show {
        id: String,
        /// Print the raw message instead of the summary.
        #[arg(long)]
        raw: bool,
    },
    /// Remove a saved message.
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write account.xml and store the secret (from POSTINO_SECRET or the first stdin line).
    Init(commands::InitArgs),
    /// Print the current settings.
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let dir = match cli.config_dir {
        Some(dir) => dir,
        None => match postino_core::config::default_config_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("postino: {}", e);
                std::process::exit(1);
            }
        },
    };

    let result = match cli.command {
        Commands::Send {
            from,
            to,
            subject,
            body_file,
        } => commands::send(&dir, &from, &to, &subject, body_file.as_deref()).await,
        Commands::Fetch => commands::fetch(&dir).await,
        Commands::Inbox { action } => match action {
            InboxAction::List => commands::inbox_list(&dir),
            InboxAction::Show { id, raw } => commands::inbox_show(&dir, &id, raw),
            InboxAction::Delete { id } => commands::inbox_delete(&dir, &id),
        },
        Commands::Config { action } => match action {
            ConfigAction::Init(args) => commands::config_init(&dir, args),
            ConfigAction::Show => commands::config_show(&dir),
        },
    };

    if let Err(e) = result {
        eprintln!("postino: {}", e);
        std::process::exit(1);
    }
}
