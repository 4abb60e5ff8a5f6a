/*
 * lib.rs
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

//! Postino core: SMTP submission and POP3 retrieval sessions over a shared
//! line channel, with a redactable audit transcript and a local message store.

pub mod audit;
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod sasl;
pub mod store;

pub use audit::{AuditLog, Severity};
pub use error::{SessionError, StorageError, TransportError};
pub use protocol::pop3::RetrievalSession;
pub use protocol::smtp::SubmissionSession;
pub use protocol::{Credentials, EndpointAddress, Security};
pub use store::{DirectoryStore, MessageStore};
