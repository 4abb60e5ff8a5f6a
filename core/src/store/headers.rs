/*
 * headers.rs
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

//! Minimal RFC 5322 header reading for stored messages: header/body split, unfolding,
//! a few summary fields, and RFC 2047 encoded-word decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Split raw message bytes at the first empty line. Without one, everything is header.
pub fn split_message(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while pos < raw.len() {
        let end = raw[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| pos + i + 1);
        let line = &raw[pos..end];
        if line == b"\r\n" || line == b"\n" {
            return (&raw[..pos], &raw[end..]);
        }
        pos = end;
    }
    (raw, &[])
}

/// `(name, unfolded value)` pairs in order of appearance.
pub fn parse_headers(header: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(header);
    let mut fields: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if line.starts_with(&[' ', '\t'][..]) {
            if let Some((_, value)) = fields.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() && !name.contains(' ') {
                fields.push((name.to_string(), value.trim().to_string()));
            }
        }
    }
    fields
}

/// First value of `name`, case-insensitive.
pub fn find<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Message-ID of a raw message, read from the header section only. Folded values are
/// unfolded first; angle brackets and blanks are trimmed. Empty when there is none.
pub fn message_id(raw: &[u8]) -> String {
    let (header, _) = split_message(raw);
    let fields = parse_headers(header);
    find(&fields, "Message-ID")
        .map(|v| v.trim_matches(|c: char| c == '<' || c == '>' || c.is_whitespace()))
        .unwrap_or_default()
        .to_string()
}

/// Expand `=?charset?B|Q?payload?=` words. UTF-8 and Latin-1 are decoded; other charsets
/// fall back to lossy UTF-8. Whitespace between adjacent encoded words is dropped.
pub fn decode_encoded_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut last_was_word = false;
    while let Some(start) = rest.find("=?") {
        let (literal, candidate) = rest.split_at(start);
        match decode_word(candidate) {
            Some((decoded, used)) => {
                if !(last_was_word && literal.trim().is_empty()) {
                    out.push_str(literal);
                }
                out.push_str(&decoded);
                rest = &candidate[used..];
                last_was_word = true;
            }
            None => {
                out.push_str(literal);
                out.push_str("=?");
                rest = &candidate[2..];
                last_was_word = false;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode one encoded word at the start of `s`; returns the text and bytes consumed.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let inner = s.strip_prefix("=?")?;
    let (charset, after) = inner.split_once('?')?;
    let (encoding, after) = after.split_once('?')?;
    let end = after.find("?=")?;
    let payload = &after[..end];
    let bytes = match encoding {
        "B" | "b" => STANDARD.decode(payload.trim()).ok()?,
        "Q" | "q" => decode_q(payload),
        _ => return None,
    };
    let text = match charset.to_ascii_lowercase().as_str() {
        "iso-8859-1" | "latin1" | "us-ascii" => bytes.iter().map(|&b| b as char).collect(),
        _ => String::from_utf8_lossy(&bytes).into_owned(),
    };
    let used = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
    Some((text, used))
}

/// Q encoding: `_` is space, `=XX` is a byte.
fn decode_q(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                        continue;
                    }
                    None => out.push(b'='),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_at_first_blank_line() {
        let raw = b"From: a\r\nSubject: s\r\n\r\nbody\r\n\r\nmore\r\n";
        let (h, b) = split_message(raw);
        assert_eq!(h, b"From: a\r\nSubject: s\r\n");
        assert_eq!(b, b"body\r\n\r\nmore\r\n");
        let (h, b) = split_message(b"X: only\r\n");
        assert_eq!(h, b"X: only\r\n");
        assert!(b.is_empty());
    }

    #[test]
    fn folded_headers_are_unfolded() {
        let fields = parse_headers(b"Subject: a long\r\n\tsubject line\r\nTo: x@y\r\n");
        assert_eq!(find(&fields, "subject"), Some("a long subject line"));
        assert_eq!(find(&fields, "TO"), Some("x@y"));
        assert_eq!(find(&fields, "Date"), None);
    }

    #[test]
    fn message_id_from_header_section() {
        assert_eq!(
            message_id(b"Subject: s\r\nMessage-ID: <abc.123@mail.example.org>\r\n\r\nbody\r\n"),
            "abc.123@mail.example.org"
        );
        assert_eq!(message_id(b"message-id:<x@y>\r\n\r\n"), "x@y");
        assert_eq!(message_id(b"Message-IDs: nope\r\n\r\n"), "");
        assert_eq!(message_id(b"Subject: Message-ID: <x>\r\n\r\n"), "");
        assert_eq!(message_id(b"Subject: s\r\n\r\nMessage-ID: <body@y>\r\n"), "");
    }

    #[test]
    fn folded_message_id_is_unfolded() {
        let raw = b"Subject: a\r\nMessage-ID:\r\n <DB9PR01MB1234@eurprd01.prod.outlook.com>\r\n\r\nhi\r\n";
        assert_eq!(message_id(raw), "DB9PR01MB1234@eurprd01.prod.outlook.com");
    }

    #[test]
    fn encoded_words() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?0J/RgNC40LLQtdGC?="), "Привет");
        assert_eq!(decode_encoded_words("=?iso-8859-1?Q?caf=E9_au_lait?="), "café au lait");
        assert_eq!(
            decode_encoded_words("Re: =?utf-8?q?a?= =?utf-8?q?b?= end"),
            "Re: ab end"
        );
        assert_eq!(decode_encoded_words("50% =? off"), "50% =? off");
    }
}
