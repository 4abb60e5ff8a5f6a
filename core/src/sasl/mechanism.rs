/*
 * mechanism.rs
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

//! SASL mechanism names.

/// Mechanisms the submission session can authenticate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaslMechanism {
    /// Legacy LOGIN: identity and secret as two base64 lines.
    #[default]
    Login,
    /// PLAIN (RFC 4616): one base64 line carrying both.
    Plain,
    /// CRAM-MD5 (RFC 2195): keyed digest of a server challenge.
    CramMd5,
}

impl SaslMechanism {
    pub fn name(&self) -> &'static str {
        match self {
            SaslMechanism::Login => "LOGIN",
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::CramMd5 => "CRAM-MD5",
        }
    }

    /// Whether the secret crosses the wire in recoverable form.
    pub fn sends_cleartext_secret(&self) -> bool {
        matches!(self, SaslMechanism::Login | SaslMechanism::Plain)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "LOGIN" => Some(SaslMechanism::Login),
            "PLAIN" => Some(SaslMechanism::Plain),
            "CRAM-MD5" => Some(SaslMechanism::CramMd5),
            _ => None,
        }
    }
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
