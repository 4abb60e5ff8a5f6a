/*
 * net.rs
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

//! Transport connection: a byte stream that starts plain and can be upgraded to TLS in place.
//!
//! Implicit TLS handshakes immediately after dialing; STARTTLS upgrades the plain stream
//! after protocol negotiation. Every dial, handshake, read and write is bounded by the
//! connection timeout.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::error::TransportError;
use crate::protocol::EndpointAddress;

/// Connect/read timeout used when the settings do not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

static DEFAULT_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

fn default_connector() -> &'static TlsConnector {
    DEFAULT_CONNECTOR.get_or_init(|| {
        let config = ClientConfig::builder()
            .with_root_certificates(build_root_store())
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    })
}

/// Opens the plain byte stream for a session. Called once, when the session starts.
pub trait Dialer {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn dial(
        &mut self,
        address: &EndpointAddress,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Dials TCP (host name resolution included).
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&mut self, address: &EndpointAddress) -> io::Result<TcpStream> {
        TcpStream::connect((address.host.as_str(), address.port)).await
    }
}

/// Plain or TLS stream over the same peer.
enum Link<S> {
    Plain(S),
    Tls(Box<TlsStream<S>>),
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for Link<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Link::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Link::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncWrite for Link<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Link::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Link::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Link::Plain(s) => Pin::new(s).poll_flush(cx),
            Link::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Link::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Link::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Run `fut` under `limit`, mapping an elapsed timer to [`TransportError::Timeout`].
async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(TransportError::from),
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

async fn handshake<S>(stream: S, host: &str, limit: Duration) -> Result<TlsStream<S>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let upgrade_error = |source: io::Error| TransportError::Upgrade {
        host: host.to_string(),
        source,
    };
    let server_name = ServerName::try_from(host)
        .map(|name| name.to_owned())
        .map_err(|_| upgrade_error(io::Error::new(io::ErrorKind::InvalidInput, "invalid host name")))?;
    match tokio::time::timeout(limit, default_connector().connect(server_name, stream)).await {
        Ok(Ok(tls)) => Ok(tls),
        Ok(Err(e)) => Err(upgrade_error(e)),
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

/// The single owner of a session's socket.
pub struct TransportConnection<S> {
    link: Option<Link<S>>,
    peer: String,
    timeout: Duration,
    upgraded: bool,
}

impl<S> TransportConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Dial `address`. With `implicit_tls` the TLS handshake runs before any protocol byte.
    pub async fn connect<D>(
        dialer: &mut D,
        address: &EndpointAddress,
        implicit_tls: bool,
        timeout: Duration,
    ) -> Result<Self, TransportError>
    where
        D: Dialer<Stream = S>,
    {
        tracing::debug!("dialing {} (implicit TLS: {})", address, implicit_tls);
        let stream = match tokio::time::timeout(timeout, dialer.dial(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TransportError::Connect {
                    address: address.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(TransportError::Connect {
                    address: address.to_string(),
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };
        let link = if implicit_tls {
            Link::Tls(Box::new(handshake(stream, &address.host, timeout).await?))
        } else {
            Link::Plain(stream)
        };
        Ok(Self {
            link: Some(link),
            peer: address.to_string(),
            timeout,
            upgraded: false,
        })
    }

    /// Replace the plain stream with TLS over the same peer. Allowed once per connection.
    pub async fn upgrade_to_encrypted(&mut self, server_name: &str) -> Result<(), TransportError> {
        if self.upgraded {
            return Err(TransportError::AlreadyEncrypted);
        }
        match self.link.take() {
            Some(Link::Plain(stream)) => {
                self.upgraded = true;
                let tls = handshake(stream, server_name, self.timeout).await?;
                tracing::debug!("{} upgraded to TLS", self.peer);
                self.link = Some(Link::Tls(Box::new(tls)));
                Ok(())
            }
            Some(tls @ Link::Tls(_)) => {
                self.link = Some(tls);
                Err(TransportError::AlreadyEncrypted)
            }
            None => Err(TransportError::Closed),
        }
    }

    /// Write all of `bytes` and flush.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let limit = self.timeout;
        let link = self.link.as_mut().ok_or(TransportError::Closed)?;
        bounded(limit, async {
            link.write_all(bytes).await?;
            link.flush().await
        })
        .await
    }

    /// Return whatever is available, at most `max_bytes`. Does not wait for a full line.
    pub async fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        let limit = self.timeout;
        let link = self.link.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = vec![0u8; max_bytes.max(1)];
        let n = bounded(limit, link.read(&mut buf)).await?;
        if n == 0 {
            self.link = None;
            return Err(TransportError::Closed);
        }
        buf.truncate(n);
        Ok(buf)
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.link, Some(Link::Tls(_)))
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Shut the stream down. Safe after failure and safe to repeat.
    pub async fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = tokio::time::timeout(self.timeout, link.shutdown()).await;
            tracing::debug!("connection to {} closed", self.peer);
        }
    }
}
