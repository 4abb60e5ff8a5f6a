/*
 * plain.rs
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

//! PLAIN SASL (RFC 4616).

use super::SaslError;

/// Build PLAIN initial response: NUL authzid NUL authcid NUL password (UTF-8).
/// Caller must base64-encode for the wire (e.g. SMTP "AUTH PLAIN <base64>").
pub fn encode_plain(authzid: &str, authcid: &str, password: &str) -> Result<Vec<u8>, SaslError> {
    if authcid.contains('\0') || password.contains('\0') || authzid.contains('\0') {
        return Err(SaslError::Invalid("PLAIN credentials must not contain NUL"));
    }
    Ok(format!("{}\0{}\0{}", authzid, authcid, password).into_bytes())
}
