/*
 * audit.rs
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

//! Session transcript: every line goes to the echo sink (console), and to the durable
//! sink unless recording is suppressed. Line format: `<timestamp> [<SEVERITY>]: <text>`.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Local;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Severity tag written between brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format one transcript line (without trailing newline).
pub fn format_line(severity: Severity, message: &str) -> String {
    format!(
        "{} [{}]: {}",
        Local::now().format(TIMESTAMP_FORMAT),
        severity,
        message
    )
}

type Sink = Box<dyn Write + Send>;

/// Append-only transcript for one session. Single writer; not shared between sessions.
pub struct AuditLog {
    sink: Option<Sink>,
    echo: Sink,
    active: bool,
}

impl AuditLog {
    /// Open (or create) the transcript file in append mode, echoing to stdout.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::with_writers(BufWriter::new(file), io::stdout()))
    }

    /// Transcript over arbitrary writers (durable sink, echo sink).
    pub fn with_writers<W, E>(sink: W, echo: E) -> Self
    where
        W: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        Self {
            sink: Some(Box::new(sink)),
            echo: Box::new(echo),
            active: true,
        }
    }

    /// Record at INFO.
    pub fn record(&mut self, message: &str) {
        self.record_with(Severity::Info, message);
    }

    pub fn warning(&mut self, message: &str) {
        self.record_with(Severity::Warning, message);
    }

    pub fn error(&mut self, message: &str) {
        self.record_with(Severity::Error, message);
    }

    /// Echo the line, and persist it when recording is active and the sink is open.
    pub fn record_with(&mut self, severity: Severity, message: &str) {
        let line = format_line(severity, message);
        if let Err(e) = writeln!(self.echo, "{}", line) {
            tracing::debug!("transcript echo failed: {}", e);
        }
        if !self.active {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = writeln!(sink, "{}", line) {
                tracing::warn!("transcript write failed: {}", e);
            }
        }
    }

    /// Toggle durable recording. Visible echo is never suppressed.
    pub fn set_active(&mut self, enabled: bool) {
        if enabled == self.active {
            return;
        }
        if enabled {
            self.active = true;
            self.record("Logging was enabled.");
        } else {
            self.record("Disable logging...");
            self.active = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// Flush and release the durable sink. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.flush() {
                tracing::warn!("transcript flush failed: {}", e);
            }
        }
        let _ = self.echo.flush();
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cloneable in-memory writer; lets an embedder (or a test) read back a transcript.
#[derive(Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
