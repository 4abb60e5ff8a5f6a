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

//! SMTP submission client (RFC 5321, RFC 3207 STARTTLS, RFC 4954 AUTH).

pub mod compose;
pub mod reply;
mod session;

pub use compose::Letter;
pub use reply::{Capabilities, ReplyClass, SmtpReply};
pub use session::{SubmissionSession, SubmissionSettings, SubmissionState, SESSION_SEPARATOR};
