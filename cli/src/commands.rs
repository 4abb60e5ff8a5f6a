/*
 * commands.rs
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

use std::error::Error;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use postino_core::config::{self, ConfigError, ServerSettings, Settings};
use postino_core::sasl::SaslMechanism;
use postino_core::store::MessageStore;
use postino_core::{AuditLog, DirectoryStore, RetrievalSession, Security, SubmissionSession};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Line that ends a body typed on stdin.
const BODY_TERMINATOR: &str = "EOF";

#[derive(clap::Args)]
pub struct InitArgs {
    #[arg(long)]
    smtp_host: String,
    #[arg(long, default_value_t = 587)]
    smtp_port: u16,
    /// none, starttls or tls; derived from the port when omitted.
    #[arg(long)]
    smtp_security: Option<String>,
    #[arg(long)]
    pop_host: String,
    #[arg(long, default_value_t = 995)]
    pop_port: u16,
    /// none or tls; derived from the port when omitted.
    #[arg(long)]
    pop_security: Option<String>,
    #[arg(long, default_value = "")]
    login: String,
    /// LOGIN, PLAIN or CRAM-MD5.
    #[arg(long, default_value = "LOGIN")]
    mechanism: String,
    /// Per-command timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[arg(long)]
    message_dir: Option<PathBuf>,
}

fn load_settings(dir: &Path) -> CliResult<Settings> {
    let path = config::settings_path(dir);
    Settings::load(&path)
        .map_err(|e| Box::<dyn Error>::from(format!("{} (run `postino config init` first)", e)))
}

/// Collect a body from `input`: everything up to end of input or a line reading `EOF`.
pub fn read_body(input: impl BufRead) -> io::Result<String> {
    let mut lines = Vec::new();
    for line in input.lines() {
        let line = line?;
        if line == BODY_TERMINATOR {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

fn clean_recipients(to: &[String]) -> Vec<String> {
    to.iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

pub async fn send(dir: &Path, from: &str, to: &[String], subject: &str, body_file: Option<&Path>) -> CliResult {
    let settings = load_settings(dir)?;
    let secret = config::resolve_secret(dir)?;
    let body = match body_file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => {
            if atty_hint() {
                eprintln!("Enter the letter body. End it with a line reading '{}'.", BODY_TERMINATOR);
            }
            read_body(io::stdin().lock())?
        }
    };
    let recipients = clean_recipients(to);
    let audit = AuditLog::open(settings.smtp_log_path())?;
    let mut session = SubmissionSession::new(settings.submission(&secret), audit);
    session.submit(from, &recipients, subject, &body).await?;
    Ok(())
}

// Prompt only when a person is typing.
fn atty_hint() -> bool {
    use std::io::IsTerminal;
    io::stdin().is_terminal()
}

pub async fn fetch(dir: &Path) -> CliResult {
    let settings = load_settings(dir)?;
    let secret = config::resolve_secret(dir)?;
    let audit = AuditLog::open(settings.pop_log_path())?;
    let store = Arc::new(DirectoryStore::new(settings.message_dir.clone()));
    let mut session = RetrievalSession::new(settings.retrieval(&secret), audit, store);
    let count = session.retrieve_all().await?;
    println!("{} message(s) saved to {}", count, settings.message_dir.display());
    Ok(())
}

fn open_store(dir: &Path) -> CliResult<DirectoryStore> {
    let settings = load_settings(dir)?;
    Ok(DirectoryStore::new(settings.message_dir))
}

fn display_id(id: &str) -> &str {
    if id.is_empty() {
        "(no id)"
    } else {
        id
    }
}

pub fn inbox_list(dir: &Path) -> CliResult {
    let store = open_store(dir)?;
    for id in store.list()? {
        let msg = store.load(&id)?;
        println!(
            "{}\t{}\t{}",
            display_id(&id),
            msg.headers.from.as_deref().unwrap_or(""),
            msg.headers.subject.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn inbox_show(dir: &Path, id: &str, raw: bool) -> CliResult {
    let store = open_store(dir)?;
    let msg = store.load(id)?;
    if raw {
        print!("{}", String::from_utf8_lossy(&msg.raw));
        return Ok(());
    }
    let h = &msg.headers;
    for (name, value) in [("From", &h.from), ("To", &h.to), ("Subject", &h.subject), ("Date", &h.date)] {
        if let Some(value) = value {
            println!("{}: {}", name, value);
        }
    }
    println!();
    print!("{}", msg.body);
    Ok(())
}

pub fn inbox_delete(dir: &Path, id: &str) -> CliResult {
    open_store(dir)?.delete(id)?;
    println!("Deleted {}", display_id(id));
    Ok(())
}

fn parse_security(field: &'static str, value: Option<&str>) -> Result<Option<Security>, ConfigError> {
    value
        .map(|v| {
            Security::from_name(v).ok_or_else(|| ConfigError::Invalid {
                field,
                value: v.to_string(),
            })
        })
        .transpose()
}

fn secret_from_env_or_stdin() -> io::Result<String> {
    if let Ok(secret) = std::env::var(config::SECRET_ENV) {
        return Ok(secret);
    }
    if atty_hint() {
        eprintln!("Password:");
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

pub fn config_init(dir: &Path, args: InitArgs) -> CliResult {
    let defaults = Settings::default();
    let mechanism = SaslMechanism::from_name(&args.mechanism).ok_or_else(|| ConfigError::Invalid {
        field: "mechanism",
        value: args.mechanism.clone(),
    })?;
    let settings = Settings {
        smtp: ServerSettings {
            host: args.smtp_host,
            port: args.smtp_port,
            security: parse_security("smtp security", args.smtp_security.as_deref())?,
        },
        pop: ServerSettings {
            host: args.pop_host,
            port: args.pop_port,
            security: parse_security("pop security", args.pop_security.as_deref())?,
        },
        login: args.login,
        mechanism,
        timeout: Duration::from_secs(args.timeout),
        log_dir: args.log_dir.unwrap_or(defaults.log_dir),
        message_dir: args.message_dir.unwrap_or(defaults.message_dir),
    };
    let path = config::settings_path(dir);
    settings.save(&path)?;
    let secret = secret_from_env_or_stdin()?;
    config::store_secret(dir, &secret)?;
    tracing::info!("settings written to {}", path.display());
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn config_show(dir: &Path) -> CliResult {
    let settings = load_settings(dir)?;
    let security = |s: &ServerSettings| s.security.map(|s| s.name()).unwrap_or("by port");
    println!("smtp:        {}:{} ({})", settings.smtp.host, settings.smtp.port, security(&settings.smtp));
    println!("pop:         {}:{} ({})", settings.pop.host, settings.pop.port, security(&settings.pop));
    println!("login:       {}", settings.login);
    println!("mechanism:   {}", settings.mechanism);
    println!("timeout:     {}s", settings.timeout.as_secs());
    println!("log dir:     {}", settings.log_dir.display());
    println!("message dir: {}", settings.message_dir.display());
    Ok(())
}
