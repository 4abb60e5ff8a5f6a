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

//! Message store: raw retrieved messages keyed by their Message-ID.

mod directory;
pub mod filename;
pub mod headers;

pub use directory::{DirectoryStore, DEFAULT_MESSAGE_DIR};

use crate::error::StorageError;

/// Persistence for retrieved messages. The retrieval session only calls `save`; the
/// rest serves the inbox viewer.
pub trait MessageStore: Send + Sync {
    /// Write (or overwrite) the message stored under `id`. The empty id is a valid key.
    fn save(&self, id: &str, raw: &[u8]) -> Result<(), StorageError>;

    /// Ids of every stored message, sorted.
    fn list(&self) -> Result<Vec<String>, StorageError>;

    fn load(&self, id: &str) -> Result<StoredMessage, StorageError>;

    fn delete(&self, id: &str) -> Result<(), StorageError>;
}

/// The fields an inbox listing shows. Values are unfolded and encoded words decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSummary {
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
}

/// A stored message read back.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub raw: Vec<u8>,
    pub headers: HeaderSummary,
    /// Text after the first blank line.
    pub body: String,
}

impl StoredMessage {
    pub fn parse(id: impl Into<String>, raw: Vec<u8>) -> Self {
        let (header, body) = headers::split_message(&raw);
        let fields = headers::parse_headers(header);
        let field = |name: &str| headers::find(&fields, name).map(headers::decode_encoded_words);
        let summary = HeaderSummary {
            from: field("From"),
            to: field("To"),
            subject: field("Subject"),
            date: field("Date"),
        };
        let body = String::from_utf8_lossy(body).into_owned();
        Self {
            id: id.into(),
            headers: summary,
            body,
            raw,
        }
    }
}
