/*
 * directory.rs
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

//! One file per message in a flat directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{filename, MessageStore, StoredMessage};
use crate::error::StorageError;

/// Directory used when the settings do not name one.
pub const DEFAULT_MESSAGE_DIR: &str = ".msg";

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Filesystem message store. Writes go to a dot-prefixed temp file first and are renamed
/// into place, so a reader never sees half a message.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(filename::encode(id))
    }
}

impl Default for DirectoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_DIR)
    }
}

impl MessageStore for DirectoryStore {
    fn save(&self, id: &str, raw: &[u8]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| io_error(&self.root, e))?;
        let name = filename::encode(id);
        let tmp = self.root.join(format!(".{}.tmp", name));
        let path = self.root.join(&name);
        fs::write(&tmp, raw).map_err(|e| io_error(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(&path, e));
        }
        tracing::debug!("saved {} bytes as {}", raw.len(), path.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, e)),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // temp files and anything else hidden
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                ids.push(filename::decode(&name));
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn load(&self, id: &str) -> Result<StoredMessage, StorageError> {
        let path = self.path_for(id);
        match fs::read(&path) {
            Ok(raw) => Ok(StoredMessage::parse(id, raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound(id.to_string())),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn delete(&self, id: &str) -> Result<(), StorageError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound(id.to_string())),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}
