/*
 * error.rs
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

//! Transport, session, and storage errors.
//!
//! Transport failures are session-fatal. A server saying "no" is a typed reply at the
//! channel level and only becomes [`SessionError::Rejected`] when a session decides the
//! command had to succeed.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::sasl::SaslError;

/// Failure of the byte stream underneath a session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS failure, refusal, or dial timeout.
    #[error("cannot connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    /// TLS handshake failed (implicit TLS or STARTTLS upgrade).
    #[error("TLS handshake with {host} failed: {source}")]
    Upgrade {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection is already encrypted")]
    AlreadyEncrypted,
    #[error("connection closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure of the message store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("message store I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("no stored message with id {0:?}")]
    NotFound(String),
}

/// Why a session stopped.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server answered a command that had to succeed with a negative reply.
    #[error("server rejected {command:?}: {reply}")]
    Rejected { command: String, reply: String },
    /// The server reply could not be parsed.
    #[error("malformed server reply: {0:?}")]
    Malformed(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Auth(#[from] SaslError),
    /// Entry point called in a state that does not allow it.
    #[error("invalid session state: cannot go from {from} to {to}")]
    InvalidState { from: &'static str, to: &'static str },
    #[error("no recipients")]
    NoRecipients,
}

impl SessionError {
    /// Build a rejection from the command line (already redacted by the caller when needed).
    pub fn rejected(command: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::Rejected {
            command: command.into(),
            reply: reply.into(),
        }
    }

    /// True for timeouts, which the transcript reports separately.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Transport(TransportError::Timeout(_)))
    }
}
