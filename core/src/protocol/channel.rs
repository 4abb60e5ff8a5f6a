/*
 * channel.rs
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

//! Line channel: CRLF command lines out, framed reply lines in, every line recorded in the
//! session transcript. Dot-terminated blocks are read with [`LineChannel::read_dot_block`].

use std::fmt;
use std::ops::{Deref, DerefMut};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::audit::AuditLog;
use crate::error::{SessionError, TransportError};
use crate::net::TransportConnection;

pub const LINE_TERMINATOR: &str = "\r\n";

/// Bytes requested per receive.
pub const RECEIVE_BUFFER: usize = 1024;

/// Longest line accepted before the reply is declared malformed (RFC 5322's 998 plus slack).
pub const MAX_LINE_LENGTH: usize = 4096;

/// Shown instead of a command line sent while the transcript was suppressed.
const REDACTED: &str = "<redacted>";

/// Outcome of feeding one line to a reply parser.
pub enum Step<R> {
    /// Reply continues on the next line.
    More(R),
    Done(R),
}

/// A protocol's reply grammar. Negative replies are values, not errors.
pub trait Reply: Sized + fmt::Display {
    /// Parse `line` (terminator stripped), continuing `partial` when the previous line said so.
    fn parse_line(line: &str, partial: Option<Self>) -> Result<Step<Self>, String>;

    fn is_positive(&self) -> bool;
}

/// Command/response channel over one transport connection.
pub struct LineChannel<S> {
    transport: Option<TransportConnection<S>>,
    audit: AuditLog,
    pending: Vec<u8>,
}

impl<S> LineChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Channel with no connection yet; attach one when the session starts.
    pub fn new(audit: AuditLog) -> Self {
        Self {
            transport: None,
            audit,
            pending: Vec::new(),
        }
    }

    pub fn attach(&mut self, transport: TransportConnection<S>) {
        self.pending.clear();
        self.transport = Some(transport);
    }

    pub fn audit(&mut self) -> &mut AuditLog {
        &mut self.audit
    }

    pub fn transport_mut(&mut self) -> Result<&mut TransportConnection<S>, TransportError> {
        self.transport.as_mut().ok_or(TransportError::Closed)
    }

    /// Whether the attached connection is running over TLS.
    pub fn is_encrypted(&self) -> bool {
        self.transport.as_ref().map_or(false, |t| t.is_encrypted())
    }

    /// Upgrade the attached connection to TLS. Bytes buffered from the plain stream are dropped.
    pub async fn upgrade_to_encrypted(&mut self, server_name: &str) -> Result<(), TransportError> {
        self.pending.clear();
        self.transport_mut()?.upgrade_to_encrypted(server_name).await
    }

    /// Record and send `text` followed by CRLF. Does not wait for a reply.
    pub async fn send_line(&mut self, text: &str) -> Result<(), TransportError> {
        self.audit.record(&format!("Client: {}", text));
        let mut wire = String::with_capacity(text.len() + LINE_TERMINATOR.len());
        wire.push_str(text);
        wire.push_str(LINE_TERMINATOR);
        self.transport_mut()?.send(wire.as_bytes()).await
    }

    /// Next line including its terminator, assembled from as many receives as it takes.
    /// Recorded as an inbound event. A line longer than [`MAX_LINE_LENGTH`] is malformed.
    pub async fn read_line_bytes(&mut self) -> Result<Vec<u8>, SessionError> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line);
                self.audit
                    .record(&format!("Server: {}", text.trim_end_matches(&['\r', '\n'][..])));
                return Ok(line);
            }
            if self.pending.len() > MAX_LINE_LENGTH {
                let held = self.pending.len();
                self.pending.clear();
                tracing::warn!("server line over {} bytes without a terminator", MAX_LINE_LENGTH);
                return Err(SessionError::Malformed(format!(
                    "line exceeds {} bytes ({} buffered)",
                    MAX_LINE_LENGTH, held
                )));
            }
            let chunk = self.transport_mut()?.receive(RECEIVE_BUFFER).await?;
            self.pending.extend_from_slice(&chunk);
        }
    }

    /// Next line as text, terminator stripped.
    pub async fn read_line(&mut self) -> Result<String, SessionError> {
        let line = self.read_line_bytes().await?;
        Ok(String::from_utf8_lossy(strip_terminator(&line)).into_owned())
    }

    /// Read one complete reply of grammar `R`, whatever its status.
    pub async fn read_reply<R: Reply>(&mut self) -> Result<R, SessionError> {
        let mut partial = None;
        loop {
            let line = self.read_line().await?;
            match R::parse_line(&line, partial.take()).map_err(SessionError::Malformed)? {
                Step::More(r) => partial = Some(r),
                Step::Done(r) => return Ok(r),
            }
        }
    }

    /// Send a command and read its reply, positive or negative.
    pub async fn command<R: Reply>(&mut self, text: &str) -> Result<R, SessionError> {
        self.send_line(text).await?;
        self.read_reply().await
    }

    /// Send a command that must succeed; a negative reply becomes [`SessionError::Rejected`].
    pub async fn expect<R: Reply>(&mut self, text: &str) -> Result<R, SessionError> {
        let label = if self.audit.is_active() { text } else { REDACTED };
        let label = label.to_string();
        let reply: R = self.command(text).await?;
        if reply.is_positive() {
            Ok(reply)
        } else {
            Err(SessionError::rejected(label, reply.to_string()))
        }
    }

    /// Wait for a reply that must be positive (greeting, end of DATA).
    pub async fn expect_reply<R: Reply>(&mut self, what: &str) -> Result<R, SessionError> {
        let reply: R = self.read_reply().await?;
        if reply.is_positive() {
            Ok(reply)
        } else {
            Err(SessionError::rejected(what, reply.to_string()))
        }
    }

    /// Read a dot-terminated block. `on_line` gets each line with its terminator and
    /// with dot-stuffing removed; the terminator line itself is not passed.
    pub async fn read_dot_block<F>(&mut self, mut on_line: F) -> Result<(), SessionError>
    where
        F: FnMut(&[u8]) -> Result<(), SessionError>,
    {
        loop {
            let line = self.read_line_bytes().await?;
            if is_block_terminator(&line) {
                return Ok(());
            }
            on_line(unstuff(&line))?;
        }
    }

    /// Suppress durable recording until the returned guard is dropped.
    pub fn suppressed(&mut self) -> Suppressed<'_, S> {
        let was_active = self.audit.is_active();
        self.audit.set_active(false);
        Suppressed {
            channel: self,
            was_active,
        }
    }

    /// Close the connection if one is attached. Idempotent.
    pub async fn shutdown(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.close().await;
        }
        self.pending.clear();
    }
}

/// Scoped transcript suppression over a channel. Recording is restored on drop, on every
/// exit path including early returns.
pub struct Suppressed<'a, S> {
    channel: &'a mut LineChannel<S>,
    was_active: bool,
}

impl<S> Deref for Suppressed<'_, S> {
    type Target = LineChannel<S>;

    fn deref(&self) -> &LineChannel<S> {
        self.channel
    }
}

impl<S> DerefMut for Suppressed<'_, S> {
    fn deref_mut(&mut self) -> &mut LineChannel<S> {
        self.channel
    }
}

impl<S> Drop for Suppressed<'_, S> {
    fn drop(&mut self) {
        self.channel.audit.set_active(self.was_active);
    }
}

/// Strip a trailing CRLF (or bare LF).
pub fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// A line consisting solely of the end-of-block marker.
pub fn is_block_terminator(line: &[u8]) -> bool {
    strip_terminator(line) == b"."
}

/// Remove the extra leading dot the server added to a content line.
pub fn unstuff(line: &[u8]) -> &[u8] {
    if line.starts_with(b"..") {
        &line[1..]
    } else {
        line
    }
}
