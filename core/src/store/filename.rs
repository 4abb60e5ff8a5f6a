/*
 * filename.rs
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

//! Message identifier <-> file name. Percent-encodes anything that could escape the
//! directory or clash with the filesystem; message ids such as `1234.5@mail.example.org`
//! stay readable.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes left as-is besides ASCII alphanumerics.
const ID_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'@')
    .remove(b'+')
    .remove(b'=')
    .remove(b'$');

/// File name of a message saved without an identifier. Never produced by encoding a
/// non-empty id, since a literal `%` always encodes as `%25`.
pub const EMPTY_ID_NAME: &str = "%";

pub fn encode(id: &str) -> String {
    if id.is_empty() {
        return EMPTY_ID_NAME.to_string();
    }
    let encoded = utf8_percent_encode(id, ID_ENCODE_SET).to_string();
    // no hidden files, no "." or ".."
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded,
    }
}

pub fn decode(name: &str) -> String {
    if name == EMPTY_ID_NAME {
        return String::new();
    }
    percent_decode_str(name).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_ids_pass_through() {
        assert_eq!(encode("4849151669057440@mail.yandex.ru"), "4849151669057440@mail.yandex.ru");
        assert_eq!(encode("CA+x=y_z-1@mail.gmail.com"), "CA+x=y_z-1@mail.gmail.com");
    }

    #[test]
    fn separators_and_dots_are_escaped() {
        assert_eq!(encode("a/b"), "a%2Fb");
        assert_eq!(encode("..").as_str(), "%2E.");
        assert_eq!(encode(".hidden"), "%2Ehidden");
        assert_eq!(encode("50%"), "50%25");
        assert!(!encode("x\\y\0z").contains(&['\\', '\0'][..]));
    }

    #[test]
    fn empty_id_has_reserved_name() {
        assert_eq!(encode(""), EMPTY_ID_NAME);
        assert_eq!(decode(EMPTY_ID_NAME), "");
    }

    #[test]
    fn decode_inverts_encode() {
        for id in ["", "..", ".x", "a/b\\c", "ünï@cödé", "%", "%25", "a b"] {
            assert_eq!(decode(&encode(id)), id, "{:?}", id);
        }
    }
}
