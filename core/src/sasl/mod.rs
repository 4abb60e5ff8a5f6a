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

//! SASL client pieces used by SMTP AUTH: LOGIN, PLAIN, CRAM-MD5.
//!
//! Wire values are base64 (standard alphabet, padded).

mod mechanism;
mod plain;

pub use mechanism::SaslMechanism;
pub use plain::encode_plain;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Md5;
use thiserror::Error;

type HmacMd5 = Hmac<Md5>;

#[derive(Debug, Error)]
pub enum SaslError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("server challenge is not valid base64")]
    Base64(#[from] base64::DecodeError),
    #[error("server does not offer {0}")]
    Unsupported(SaslMechanism),
    #[error("{0} would send the secret over an unencrypted connection")]
    CleartextRefused(SaslMechanism),
}

/// Base64 for the wire.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(encoded: &str) -> Result<Vec<u8>, SaslError> {
    Ok(STANDARD.decode(encoded.trim())?)
}

/// CRAM-MD5: base64("authcid " + hex(HMAC-MD5(password, challenge))).
pub fn cram_md5_response(authcid: &str, password: &str, challenge_b64: &str) -> Result<String, SaslError> {
    let challenge = decode(challenge_b64)?;
    let mut mac = HmacMd5::new_from_slice(password.as_bytes())
        .map_err(|_| SaslError::Invalid("CRAM-MD5 key rejected"))?;
    mac.update(&challenge);
    let digest = mac.finalize().into_bytes();
    let response = format!("{} {}", authcid, bytes_to_hex(&digest));
    Ok(encode(response.as_bytes()))
}

fn bytes_to_hex(b: &[u8]) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut s = String::with_capacity(b.len() * 2);
    for &x in b {
        s.push(HEX[(x >> 4) as usize] as char);
        s.push(HEX[(x & 15) as usize] as char);
    }
    s
}
