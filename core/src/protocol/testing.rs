/*
 * testing.rs
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

//! Scripted in-memory servers for session tests.

use std::io;

use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use crate::net::Dialer;
use crate::protocol::EndpointAddress;

/// What the scripted server does with one client line.
pub enum Action {
    Reply(String),
    /// Data line (no reply expected).
    Silent,
    /// Reply, then answer the client's next raw bytes (a TLS hello) with junk.
    ReplyThenJunk(String),
}

/// Hands out the client end of the scripted server; refuses once used.
pub struct ScriptedDialer {
    stream: Option<DuplexStream>,
    pub dials: usize,
}

impl Dialer for ScriptedDialer {
    type Stream = DuplexStream;

    async fn dial(&mut self, _address: &EndpointAddress) -> io::Result<DuplexStream> {
        self.dials += 1;
        self.stream
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }
}

/// Start a server that sends `greeting`, then feeds each client line (terminator stripped)
/// to `respond`. The join handle yields every line the client sent.
pub fn serve<F>(greeting: &str, mut respond: F) -> (ScriptedDialer, JoinHandle<Vec<String>>)
where
    F: FnMut(&str) -> Action + Send + 'static,
{
    let (client, server) = duplex(64 * 1024);
    let greeting = greeting.to_string();
    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        let mut server = BufReader::new(server);
        if server.get_mut().write_all(greeting.as_bytes()).await.is_err() {
            return seen;
        }
        loop {
            let mut raw = Vec::new();
            match server.read_until(b'\n', &mut raw).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = String::from_utf8_lossy(&raw)
                .trim_end_matches(&['\r', '\n'][..])
                .to_string();
            let action = respond(&line);
            seen.push(line);
            let written = match action {
                Action::Silent => Ok(()),
                Action::Reply(text) => server.get_mut().write_all(text.as_bytes()).await,
                Action::ReplyThenJunk(text) => {
                    if server.get_mut().write_all(text.as_bytes()).await.is_err() {
                        break;
                    }
                    let mut hello = vec![0u8; 4096];
                    let _ = server.read(&mut hello).await;
                    server
                        .get_mut()
                        .write_all(b"this is not a TLS record\r\n")
                        .await
                }
            };
            if written.is_err() {
                break;
            }
        }
        seen
    });
    (
        ScriptedDialer {
            stream: Some(client),
            dials: 0,
        },
        handle,
    )
}
