/*
 * mod.rs
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

//! Line-oriented mail protocols: shared channel plus SMTP submission and POP3 retrieval.

pub mod channel;
pub mod pop3;
pub mod smtp;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

/// Host and port of a mail server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAddress {
    pub host: String,
    pub port: u16,
}

impl EndpointAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Login identity and secret. The secret never appears in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    secret: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// How the byte stream gets encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Cleartext for the whole session.
    None,
    /// Connect plain, upgrade after the STARTTLS command.
    StartTls,
    /// TLS from the first byte.
    Implicit,
}

impl Security {
    /// Submission: 587 upgrades in-session, 465 is implicit TLS, anything else stays plain.
    pub fn for_submission_port(port: u16) -> Self {
        match port {
            587 => Security::StartTls,
            465 => Security::Implicit,
            _ => Security::None,
        }
    }

    /// Retrieval: 995 is implicit TLS, anything else stays plain.
    pub fn for_retrieval_port(port: u16) -> Self {
        if port == 995 {
            Security::Implicit
        } else {
            Security::None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Security::None => "none",
            Security::StartTls => "starttls",
            Security::Implicit => "tls",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" | "plain" => Some(Security::None),
            "starttls" => Some(Security::StartTls),
            "tls" | "ssl" | "implicit" => Some(Security::Implicit),
            _ => None,
        }
    }
}
