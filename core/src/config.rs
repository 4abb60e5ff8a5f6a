/*
 * config.rs
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

//! Account settings and the stored secret.
//!
//! Settings live in `~/.postino/account.xml` (read and written with quick_xml). The secret
//! is kept out of the XML: `~/.postino/secret` holds it encrypted with XChaCha20-Poly1305
//! under a key in `~/.postino/.key` (mode 0o600). `POSTINO_SECRET` overrides the file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

use crate::net::DEFAULT_TIMEOUT;
use crate::protocol::pop3::RetrievalSettings;
use crate::protocol::smtp::SubmissionSettings;
use crate::protocol::{Credentials, EndpointAddress, Security};
use crate::sasl::SaslMechanism;
use crate::store::DEFAULT_MESSAGE_DIR;

/// Magic header for the encrypted secret file.
const ENCRYPTED_MAGIC: &[u8] = b"PSTENC";
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;
/// Poly1305 tag.
const TAG_LEN: usize = 16;

/// Overrides the stored secret when set.
pub const SECRET_ENV: &str = "POSTINO_SECRET";

const SETTINGS_FILE: &str = "account.xml";
const SECRET_FILE: &str = "secret";
const KEY_FILE: &str = ".key";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("settings XML: {0}")]
    Xml(String),
    #[error("invalid value for {field}: {value:?}")]
    Invalid { field: &'static str, value: String },
    #[error("secret file: {0}")]
    Crypto(&'static str),
    #[error("HOME is not set")]
    NoHome,
}

fn io_error(path: &Path, source: io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn xml_error(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Xml(e.to_string())
}

/// Default config directory: ~/.postino.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|h| h.join(".postino"))
        .ok_or(ConfigError::NoHome)
}

pub fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE)
}

/// One server. `security: None` means "decide from the port".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub security: Option<Security>,
}

/// Everything but the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub smtp: ServerSettings,
    pub pop: ServerSettings,
    pub login: String,
    pub mechanism: SaslMechanism,
    pub timeout: Duration,
    /// Holds `smtp.log` and `pop3.log`.
    pub log_dir: PathBuf,
    pub message_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            smtp: ServerSettings {
                host: String::new(),
                port: 587,
                security: None,
            },
            pop: ServerSettings {
                host: String::new(),
                port: 995,
                security: None,
            },
            login: String::new(),
            mechanism: SaslMechanism::default(),
            timeout: DEFAULT_TIMEOUT,
            log_dir: PathBuf::from("."),
            message_dir: PathBuf::from(DEFAULT_MESSAGE_DIR),
        }
    }
}

impl Settings {
    /// Load settings. A missing file is an error: run `config init` first.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        Self::from_xml(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }
        let xml = self.to_xml()?;
        fs::write(path, xml).map_err(|e| io_error(path, e))
    }

    pub fn smtp_log_path(&self) -> PathBuf {
        self.log_dir.join("smtp.log")
    }

    pub fn pop_log_path(&self) -> PathBuf {
        self.log_dir.join("pop3.log")
    }

    pub fn submission(&self, secret: &str) -> SubmissionSettings {
        let address = EndpointAddress::new(self.smtp.host.clone(), self.smtp.port);
        let mut settings = SubmissionSettings::new(address, Credentials::new(self.login.clone(), secret))
            .with_mechanism(self.mechanism)
            .with_timeout(self.timeout);
        if let Some(security) = self.smtp.security {
            settings = settings.with_security(security);
        }
        settings
    }

    pub fn retrieval(&self, secret: &str) -> RetrievalSettings {
        let address = EndpointAddress::new(self.pop.host.clone(), self.pop.port);
        let mut settings =
            RetrievalSettings::new(address, Credentials::new(self.login.clone(), secret)).with_timeout(self.timeout);
        if let Some(security) = self.pop.security {
            settings = settings.with_security(security);
        }
        settings
    }

    /// Parse `<postino>` XML. Unknown elements are ignored; missing ones keep their defaults.
    pub fn from_xml(content: &str) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut section = Vec::<u8>::new();
        let mut element = Vec::<u8>::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Err(e) => return Err(xml_error(e)),
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) => {
                    let name = e.name();
                    let name = name.as_ref();
                    if name == b"smtp" || name == b"pop" {
                        section.clear();
                        section.extend_from_slice(name);
                    } else {
                        element.clear();
                        element.extend_from_slice(name);
                    }
                }
                Ok(Event::Text(e)) if !element.is_empty() => {
                    let text = e.unescape().map_err(xml_error)?.trim().to_string();
                    settings.apply(&section, &element, text)?;
                    element.clear();
                }
                Ok(Event::End(e)) => {
                    let name = e.name();
                    if name.as_ref() == section.as_slice() {
                        section.clear();
                    }
                    element.clear();
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(settings)
    }

    fn apply(&mut self, section: &[u8], element: &[u8], text: String) -> Result<(), ConfigError> {
        match section {
            b"smtp" => apply_server(&mut self.smtp, element, text),
            b"pop" => apply_server(&mut self.pop, element, text),
            _ => self.apply_account(element, text),
        }
    }

    fn apply_account(&mut self, element: &[u8], text: String) -> Result<(), ConfigError> {
        match element {
            b"login" => self.login = text,
            b"mechanism" => {
                self.mechanism = SaslMechanism::from_name(&text).ok_or_else(|| invalid("mechanism", &text))?
            }
            b"timeout" => {
                let secs: u64 = text.parse().map_err(|_| invalid("timeout", &text))?;
                self.timeout = Duration::from_secs(secs);
            }
            b"log-dir" => self.log_dir = PathBuf::from(text),
            b"message-dir" => self.message_dir = PathBuf::from(text),
            _ => tracing::debug!("ignoring settings element {}", String::from_utf8_lossy(element)),
        }
        Ok(())
    }

    pub fn to_xml(&self) -> Result<Vec<u8>, ConfigError> {
        let mut out = Vec::new();
        let mut writer = Writer::new_with_indent(&mut out, b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::Start(BytesStart::new("postino")))
            .map_err(xml_error)?;
        for (name, server) in [("smtp", &self.smtp), ("pop", &self.pop)] {
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(xml_error)?;
            write_text_element(&mut writer, "host", &server.host)?;
            write_text_element(&mut writer, "port", &server.port.to_string())?;
            if let Some(security) = server.security {
                write_text_element(&mut writer, "security", security.name())?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(xml_error)?;
        }
        write_text_element(&mut writer, "login", &self.login)?;
        write_text_element(&mut writer, "mechanism", self.mechanism.name())?;
        write_text_element(&mut writer, "timeout", &self.timeout.as_secs().to_string())?;
        write_text_element(&mut writer, "log-dir", &self.log_dir.to_string_lossy())?;
        write_text_element(&mut writer, "message-dir", &self.message_dir.to_string_lossy())?;
        writer
            .write_event(Event::End(BytesEnd::new("postino")))
            .map_err(xml_error)?;
        Ok(out)
    }
}

fn invalid(field: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        value: value.to_string(),
    }
}

fn apply_server(server: &mut ServerSettings, element: &[u8], text: String) -> Result<(), ConfigError> {
    match element {
        b"host" => server.host = text,
        b"port" => server.port = text.parse().map_err(|_| invalid("port", &text))?,
        b"security" => server.security = Some(Security::from_name(&text).ok_or_else(|| invalid("security", &text))?),
        _ => tracing::debug!("ignoring server element {}", String::from_utf8_lossy(element)),
    }
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<(), ConfigError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

fn create_private_dir(dir: &Path) -> Result<(), ConfigError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    #[cfg(unix)]
    drop(fs::set_permissions(dir, PermissionsExt::from_mode(0o700)));
    Ok(())
}

/// Open for writing; on Unix the file is created with mode 0o600.
fn open_private_file(path: &Path) -> Result<File, ConfigError> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| io_error(path, e))
    }
    #[cfg(not(unix))]
    {
        File::create(path).map_err(|e| io_error(path, e))
    }
}

fn read_key(path: &Path) -> Result<Option<[u8; KEY_LEN]>, ConfigError> {
    let buf = match fs::read(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    if buf.len() != KEY_LEN {
        return Err(ConfigError::Crypto("key file has wrong length"));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&buf);
    Ok(Some(key))
}

fn get_or_create_key(dir: &Path) -> Result<[u8; KEY_LEN], ConfigError> {
    let path = dir.join(KEY_FILE);
    if let Some(key) = read_key(&path)? {
        return Ok(key);
    }
    create_private_dir(dir)?;
    let mut key = [0u8; KEY_LEN];
    getrandom::getrandom(&mut key).map_err(|_| ConfigError::Crypto("no system randomness"))?;
    let mut f = open_private_file(&path)?;
    f.write_all(&key).map_err(|e| io_error(&path, e))?;
    f.flush().map_err(|e| io_error(&path, e))?;
    Ok(key)
}

/// Encrypt and write the secret into `dir`, creating the key on first use.
pub fn store_secret(dir: &Path, secret: &str) -> Result<(), ConfigError> {
    let key = get_or_create_key(dir)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| ConfigError::Crypto("bad key"))?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, secret.as_bytes())
        .map_err(|_| ConfigError::Crypto("encryption failed"))?;
    let path = dir.join(SECRET_FILE);
    let mut f = open_private_file(&path)?;
    f.write_all(ENCRYPTED_MAGIC).map_err(|e| io_error(&path, e))?;
    f.write_all(nonce.as_slice()).map_err(|e| io_error(&path, e))?;
    f.write_all(&ciphertext).map_err(|e| io_error(&path, e))?;
    f.flush().map_err(|e| io_error(&path, e))?;
    Ok(())
}

/// Decrypt the stored secret. `None` when nothing has been stored yet.
pub fn load_stored_secret(dir: &Path) -> Result<Option<String>, ConfigError> {
    let path = dir.join(SECRET_FILE);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(&path, e)),
    };
    if !raw.starts_with(ENCRYPTED_MAGIC) {
        return Err(ConfigError::Crypto("not an encrypted secret file"));
    }
    if raw.len() < ENCRYPTED_MAGIC.len() + NONCE_LEN + TAG_LEN {
        return Err(ConfigError::Crypto("file too short"));
    }
    let key = read_key(&dir.join(KEY_FILE))?.ok_or(ConfigError::Crypto("key file not found"))?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| ConfigError::Crypto("bad key"))?;
    let (nonce, ciphertext) = raw[ENCRYPTED_MAGIC.len()..].split_at(NONCE_LEN);
    let plain = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| ConfigError::Crypto("decryption failed (wrong key or tampered file)"))?;
    String::from_utf8(plain)
        .map(Some)
        .map_err(|_| ConfigError::Crypto("secret is not UTF-8"))
}

/// `POSTINO_SECRET` if set, else the stored secret, else empty.
pub fn resolve_secret(dir: &Path) -> Result<String, ConfigError> {
    if let Ok(secret) = std::env::var(SECRET_ENV) {
        return Ok(secret);
    }
    Ok(load_stored_secret(dir)?.unwrap_or_default())
}
