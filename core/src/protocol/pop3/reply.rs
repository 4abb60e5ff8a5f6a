/*
 * reply.rs
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

//! POP3 status lines (`+OK` / `-ERR`) and the LIST grammars.

use std::fmt;

use crate::protocol::channel::{Reply, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err,
}

impl Status {
    fn token(&self) -> &'static str {
        match self {
            Status::Ok => "+OK",
            Status::Err => "-ERR",
        }
    }
}

/// One POP3 status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopReply {
    pub status: Status,
    pub detail: String,
}

impl fmt::Display for PopReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            f.write_str(self.status.token())
        } else {
            write!(f, "{} {}", self.status.token(), self.detail)
        }
    }
}

impl Reply for PopReply {
    /// Always a single line. The status token must stand alone (`+OKAY` is malformed).
    fn parse_line(line: &str, _partial: Option<Self>) -> Result<Step<Self>, String> {
        let (token, detail) = match line.split_once(' ') {
            Some((token, detail)) => (token, detail.trim()),
            None => (line.trim_end(), ""),
        };
        let status = match token {
            "+OK" => Status::Ok,
            "-ERR" => Status::Err,
            _ => return Err(line.to_string()),
        };
        Ok(Step::Done(PopReply {
            status,
            detail: detail.to_string(),
        }))
    }

    fn is_positive(&self) -> bool {
        self.status == Status::Ok
    }
}

/// One row of a mailbox listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxEntry {
    pub sequence_id: u32,
    pub size_bytes: u64,
}

/// `count size` from the LIST (or STAT) status detail. Servers may append free text.
pub fn parse_summary(detail: &str) -> Option<(u32, u64)> {
    let mut fields = detail.split_whitespace();
    let count = fields.next()?.parse().ok()?;
    let size = fields.next()?.parse().ok()?;
    Some((count, size))
}

/// `id size` listing row. Exactly two numeric fields; sequence numbers start at 1.
pub fn parse_list_entry(line: &str) -> Option<MailboxEntry> {
    let mut fields = line.split_whitespace();
    let sequence_id: u32 = fields.next()?.parse().ok()?;
    let size_bytes = fields.next()?.parse().ok()?;
    if fields.next().is_some() || sequence_id == 0 {
        return None;
    }
    Some(MailboxEntry {
        sequence_id,
        size_bytes,
    })
}
