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

//! SMTP reply grammar: three-digit code, `-` for continuation, space (or nothing) for the last line.

use std::fmt;

use crate::protocol::channel::{Reply, Step};
use crate::sasl::SaslMechanism;

/// Class of a reply, from the first digit of its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 2yz
    PositiveCompletion,
    /// 3yz
    PositiveIntermediate,
    /// 4yz
    TransientNegative,
    /// 5yz
    PermanentNegative,
}

impl ReplyClass {
    fn from_digit(d: u8) -> Option<Self> {
        match d {
            b'2' => Some(ReplyClass::PositiveCompletion),
            b'3' => Some(ReplyClass::PositiveIntermediate),
            b'4' => Some(ReplyClass::TransientNegative),
            b'5' => Some(ReplyClass::PermanentNegative),
            _ => None,
        }
    }
}

/// Parsed SMTP reply (code + text of every line).
#[derive(Debug, Clone)]
pub struct SmtpReply {
    pub code: u16,
    pub class: ReplyClass,
    pub lines: Vec<String>,
}

impl SmtpReply {
    /// Text of the last line.
    pub fn message(&self) -> &str {
        self.lines.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// EHLO keywords (every line after the first).
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::default();
        for line in self.lines.iter().skip(1) {
            let upper = line.trim().to_uppercase();
            let mut words = upper.split_whitespace();
            match words.next() {
                Some("STARTTLS") => caps.starttls = true,
                Some("AUTH") => caps
                    .auth
                    .extend(words.filter_map(SaslMechanism::from_name)),
                _ => {}
            }
        }
        caps
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.lines.join(" / "))
    }
}

impl Reply for SmtpReply {
    fn parse_line(line: &str, partial: Option<Self>) -> Result<Step<Self>, String> {
        let bytes = line.as_bytes();
        if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(line.to_string());
        }
        let class = ReplyClass::from_digit(bytes[0]).ok_or_else(|| line.to_string())?;
        let code: u16 = line[..3].parse().map_err(|_| line.to_string())?;
        let continued = match bytes.get(3) {
            None | Some(b' ') => false,
            Some(b'-') => true,
            Some(_) => return Err(line.to_string()),
        };
        let text = line.get(4..).unwrap_or("").trim().to_string();

        let mut reply = match partial {
            Some(r) if r.code != code => return Err(line.to_string()),
            Some(r) => r,
            None => SmtpReply {
                code,
                class,
                lines: Vec::new(),
            },
        };
        reply.lines.push(text);
        if continued {
            Ok(Step::More(reply))
        } else {
            Ok(Step::Done(reply))
        }
    }

    /// 2yz and 3yz go on; 4yz and 5yz stop the session.
    fn is_positive(&self) -> bool {
        matches!(
            self.class,
            ReplyClass::PositiveCompletion | ReplyClass::PositiveIntermediate
        )
    }
}

/// What the server announced in its EHLO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub starttls: bool,
    pub auth: Vec<SaslMechanism>,
}
