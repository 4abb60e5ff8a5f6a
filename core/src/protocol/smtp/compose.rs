/*
 * compose.rs
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

//! Flat text/plain message composition for the DATA phase.
//!
//! Produces the lines sent between `DATA` and the terminating `.`: header block, blank
//! line, body. Body lines are dot-stuffed (RFC 5321 section 4.5.2).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Local};

/// Longest run of subject bytes packed into one encoded word (keeps each word under 75 chars).
const ENCODED_WORD_CHUNK: usize = 45;

/// One outgoing letter.
#[derive(Debug, Clone)]
pub struct Letter<'a> {
    pub sender: &'a str,
    pub recipients: &'a [String],
    pub subject: &'a str,
    pub body: &'a str,
}

impl Letter<'_> {
    /// Header, blank separator and stuffed body lines, without terminators.
    pub fn data_lines(&self, now: DateTime<Local>) -> Vec<String> {
        let mut lines = vec![
            format!("From: {}", single_line(self.sender)),
            format!("To: {}", self.recipients.join(", ")),
            format!("Subject: {}", encode_subject(&single_line(self.subject))),
            format!("Date: {}", now.to_rfc2822()),
            format!("Message-ID: {}", message_id(domain_of(self.sender), now)),
            "MIME-Version: 1.0".to_string(),
            "Content-Type: text/plain; charset=utf-8".to_string(),
            "Content-Transfer-Encoding: 8bit".to_string(),
            String::new(),
        ];
        lines.extend(body_lines(self.body));
        lines
    }
}

/// Header values cannot carry line breaks.
fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

fn domain_of(address: &str) -> &str {
    match address.rsplit_once('@') {
        Some((_, domain)) if !domain.trim().is_empty() => domain.trim().trim_end_matches('>'),
        _ => "localhost",
    }
}

/// `<millis.random@domain>`
pub fn message_id(domain: &str, now: DateTime<Local>) -> String {
    format!(
        "<{}.{:016x}@{}>",
        now.timestamp_millis(),
        rand::random::<u64>(),
        domain
    )
}

/// ASCII subjects pass through; anything else becomes RFC 2047 B-encoded words.
pub fn encode_subject(subject: &str) -> String {
    if subject.is_ascii() {
        return subject.to_string();
    }
    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (i, c) in subject.char_indices() {
        let next = i + c.len_utf8();
        if next - start > ENCODED_WORD_CHUNK && end > start {
            words.push(encoded_word(&subject[start..end]));
            start = end;
        }
        end = next;
    }
    if end > start {
        words.push(encoded_word(&subject[start..end]));
    }
    words.join(" ")
}

fn encoded_word(text: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(text.as_bytes()))
}

/// Split on LF or CRLF and double a leading dot.
pub fn body_lines(body: &str) -> impl Iterator<Item = String> + '_ {
    body.lines().map(|line| {
        if line.starts_with('.') {
            format!(".{}", line)
        } else {
            line.to_string()
        }
    })
}
