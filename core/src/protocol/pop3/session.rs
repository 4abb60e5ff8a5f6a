/*
 * session.rs
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

//! POP3 retrieval session: USER/PASS, LIST, then RETR + DELE per message, then QUIT.
//!
//! Each message is saved locally before its DELE is sent. A failure part way through
//! leaves earlier messages saved and deleted on the server, later ones untouched.

use std::sync::Arc;
use std::time::Duration;

use super::reply::{parse_list_entry, parse_summary, MailboxEntry, PopReply};
use crate::audit::AuditLog;
use crate::error::SessionError;
use crate::net::{Dialer, TcpDialer, TransportConnection, DEFAULT_TIMEOUT};
use crate::protocol::channel::LineChannel;
use crate::protocol::smtp::SESSION_SEPARATOR;
use crate::protocol::{Credentials, EndpointAddress, Security};
use crate::store::headers;
use crate::store::MessageStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalState {
    Idle,
    Connected,
    Authorized,
    Transaction,
    Closed,
}

impl RetrievalState {
    pub fn name(&self) -> &'static str {
        match self {
            RetrievalState::Idle => "Idle",
            RetrievalState::Connected => "Connected",
            RetrievalState::Authorized => "Authorized",
            RetrievalState::Transaction => "Transaction",
            RetrievalState::Closed => "Closed",
        }
    }

    pub fn can_advance_to(&self, next: RetrievalState) -> bool {
        use RetrievalState::*;
        match (*self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Connected) | (Connected, Authorized) | (Authorized, Transaction) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub address: EndpointAddress,
    pub credentials: Credentials,
    pub security: Security,
    pub timeout: Duration,
}

impl RetrievalSettings {
    /// Security follows the port (995 implicit TLS).
    pub fn new(address: EndpointAddress, credentials: Credentials) -> Self {
        Self {
            security: Security::for_retrieval_port(address.port),
            address,
            credentials,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One message as it came off the wire.
#[derive(Debug, Clone, Default)]
pub struct RetrievedMessage {
    pub raw: Vec<u8>,
    /// Message-ID without angle brackets; empty when the header is missing.
    pub derived_id: String,
}

/// Drains a mailbox into a [`MessageStore`]. Single-use: after `retrieve_all` returns it
/// is `Closed`.
pub struct RetrievalSession<D: Dialer = TcpDialer> {
    settings: RetrievalSettings,
    dialer: D,
    channel: LineChannel<D::Stream>,
    store: Arc<dyn MessageStore>,
    state: RetrievalState,
}

impl RetrievalSession<TcpDialer> {
    pub fn new(settings: RetrievalSettings, audit: AuditLog, store: Arc<dyn MessageStore>) -> Self {
        Self::with_dialer(settings, audit, store, TcpDialer)
    }
}

impl<D: Dialer> RetrievalSession<D> {
    pub fn with_dialer(
        settings: RetrievalSettings,
        audit: AuditLog,
        store: Arc<dyn MessageStore>,
        dialer: D,
    ) -> Self {
        Self {
            settings,
            dialer,
            channel: LineChannel::new(audit),
            store,
            state: RetrievalState::Idle,
        }
    }

    pub fn state(&self) -> RetrievalState {
        self.state
    }

    fn advance(&mut self, next: RetrievalState) -> Result<(), SessionError> {
        if !self.state.can_advance_to(next) {
            return Err(SessionError::InvalidState {
                from: self.state.name(),
                to: next.name(),
            });
        }
        tracing::trace!("retrieval {} -> {}", self.state.name(), next.name());
        self.state = next;
        Ok(())
    }

    /// Fetch, save and delete every message; returns how many were saved. The session is
    /// `Closed` afterwards either way.
    pub async fn retrieve_all(&mut self) -> Result<usize, SessionError> {
        if self.state != RetrievalState::Idle {
            return Err(SessionError::InvalidState {
                from: self.state.name(),
                to: RetrievalState::Connected.name(),
            });
        }
        let mut saved = 0;
        let result = self.run(&mut saved).await;
        match &result {
            Ok(()) => {
                let line = format!("Retrieved {} message(s)", saved);
                self.channel.audit().record(&line);
            }
            Err(e) if e.is_timeout() => self.channel.audit().error("POP3 command timeout"),
            Err(e) => {
                let line = format!("Retrieval failed after {} message(s): {}", saved, e);
                self.channel.audit().error(&line);
            }
        }
        self.close().await;
        result.map(|()| saved)
    }

    async fn run(&mut self, saved: &mut usize) -> Result<(), SessionError> {
        self.connect().await?;
        self.login().await?;
        let entries = self.list().await?;
        for entry in entries {
            let message = self.retrieve(entry).await?;
            self.store.save(&message.derived_id, &message.raw)?;
            *saved += 1;
            self.channel
                .expect::<PopReply>(&format!("DELE {}", entry.sequence_id))
                .await?;
        }
        // no reply awaited
        self.channel.send_line("QUIT").await?;
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), SessionError> {
        let implicit = self.settings.security == Security::Implicit;
        let transport = TransportConnection::connect(
            &mut self.dialer,
            &self.settings.address,
            implicit,
            self.settings.timeout,
        )
        .await?;
        self.channel.attach(transport);
        self.advance(RetrievalState::Connected)?;
        let line = format!("Successfully connected to {}", self.settings.address);
        self.channel.audit().record(&line);
        self.channel.expect_reply::<PopReply>("greeting").await?;
        Ok(())
    }

    async fn login(&mut self) -> Result<(), SessionError> {
        let user = format!("USER {}", self.settings.credentials.login);
        self.channel.expect::<PopReply>(&user).await?;
        let pass = format!("PASS {}", self.settings.credentials.secret());
        {
            let mut quiet = self.channel.suppressed();
            quiet.expect::<PopReply>(&pass).await?;
        }
        self.advance(RetrievalState::Authorized)
    }

    async fn list(&mut self) -> Result<Vec<MailboxEntry>, SessionError> {
        let reply = self.channel.expect::<PopReply>("LIST").await?;
        self.advance(RetrievalState::Transaction)?;
        match parse_summary(&reply.detail) {
            Some((count, size)) => tracing::debug!("mailbox holds {} message(s), {} bytes", count, size),
            None => {
                let line = format!("Unexpected LIST summary: {}", reply);
                self.channel.audit().warning(&line);
            }
        }
        let mut entries = Vec::new();
        self.channel
            .read_dot_block(|line| {
                let text = String::from_utf8_lossy(line);
                let text = text.trim_end_matches(&['\r', '\n'][..]);
                let entry = parse_list_entry(text)
                    .ok_or_else(|| SessionError::Malformed(text.to_string()))?;
                entries.push(entry);
                Ok(())
            })
            .await?;
        Ok(entries)
    }

    /// RETR one message. The body is kept out of the durable transcript.
    async fn retrieve(&mut self, entry: MailboxEntry) -> Result<RetrievedMessage, SessionError> {
        self.channel
            .expect::<PopReply>(&format!("RETR {}", entry.sequence_id))
            .await?;
        let mut message = RetrievedMessage::default();
        let read = {
            let mut quiet = self.channel.suppressed();
            quiet
                .read_dot_block(|line| {
                    message.raw.extend_from_slice(line);
                    Ok(())
                })
                .await
        };
        read?;
        message.derived_id = headers::message_id(&message.raw);
        let got = message.raw.len() as u64;
        if got != entry.size_bytes {
            let line = format!(
                "Unexpected end of message. Message ID: {}, message size: {}, read: {}",
                entry.sequence_id, entry.size_bytes, got
            );
            self.channel.audit().warning(&line);
            tracing::warn!("message {} size drift: listed {}, read {}", entry.sequence_id, entry.size_bytes, got);
        }
        Ok(message)
    }

    /// Close the connection and release the transcript. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.state == RetrievalState::Closed {
            return;
        }
        self.state = RetrievalState::Closed;
        self.channel.shutdown().await;
        let audit = self.channel.audit();
        audit.record("Connection closed");
        audit.record(SESSION_SEPARATOR);
        audit.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use crate::error::StorageError;
    use crate::protocol::testing::{serve, Action};
    use crate::store::StoredMessage;
    use std::io;
    use std::sync::Mutex;

    /// Records saves in memory.
    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, Vec<u8>)>>);

    impl Recorder {
        fn saves(&self) -> Vec<(String, Vec<u8>)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl MessageStore for Recorder {
        fn save(&self, id: &str, raw: &[u8]) -> Result<(), StorageError> {
            self.0.lock().unwrap().push((id.to_string(), raw.to_vec()));
            Ok(())
        }

        fn list(&self) -> Result<Vec<String>, StorageError> {
            Ok(self.saves().into_iter().map(|(id, _)| id).collect())
        }

        fn load(&self, id: &str) -> Result<StoredMessage, StorageError> {
            self.saves()
                .into_iter()
                .find(|(k, _)| k == id)
                .map(|(k, raw)| StoredMessage::parse(k, raw))
                .ok_or_else(|| StorageError::NotFound(id.to_string()))
        }

        fn delete(&self, _id: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn settings() -> RetrievalSettings {
        RetrievalSettings::new(
            EndpointAddress::new("pop.example.org", 110),
            Credentials::new("bob", "s3cr3t-pw"),
        )
        .with_timeout(Duration::from_secs(2))
    }

    fn audit() -> (AuditLog, MemorySink) {
        let sink = MemorySink::new();
        (AuditLog::with_writers(sink.clone(), io::sink()), sink)
    }

    /// Mailbox server over `messages` (already dot-stuffed, CRLF lines).
    fn mailbox(messages: Vec<&'static str>) -> impl FnMut(&str) -> Action + Send + 'static {
        move |line: &str| {
            let ok = |s: &str| Action::Reply(format!("+OK {}\r\n", s));
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some("USER"), _) => ok("hello"),
                (Some("PASS"), Some("s3cr3t-pw")) => ok("logged in"),
                (Some("PASS"), _) => Action::Reply("-ERR invalid password\r\n".to_string()),
                (Some("LIST"), _) => {
                    let total: usize = messages.iter().map(|m| m.len()).sum();
                    let mut out = format!("+OK {} {}\r\n", messages.len(), total);
                    for (i, m) in messages.iter().enumerate() {
                        out.push_str(&format!("{} {}\r\n", i + 1, m.len()));
                    }
                    out.push_str(".\r\n");
                    Action::Reply(out)
                }
                (Some("RETR"), Some(n)) => {
                    let i: usize = n.parse().unwrap();
                    Action::Reply(format!("+OK\r\n{}.\r\n", messages[i - 1]))
                }
                (Some("DELE"), Some(n)) => ok(&format!("message {} deleted", n)),
                _ => Action::Silent,
            }
        }
    }

    const FIRST: &str = "Message-ID: <one@example.org>\r\nSubject: 1\r\n\r\nhi\r\n";
    const SECOND: &str = "Subject: 2\r\nmessage-id:<two@example.org>\r\n\r\n..dotted\r\n";

    #[tokio::test]
    async fn retrieves_saves_and_deletes_in_order() {
        let (dialer, server) = serve("+OK POP3 ready\r\n", mailbox(vec![FIRST, SECOND]));
        let (audit, sink) = audit();
        let store = Arc::new(Recorder::default());
        let mut session = RetrievalSession::with_dialer(settings(), audit, store.clone(), dialer);
        assert_eq!(session.retrieve_all().await.unwrap(), 2);
        assert_eq!(session.state(), RetrievalState::Closed);

        let seen = server.await.unwrap();
        assert_eq!(
            seen,
            vec!["USER bob", "PASS s3cr3t-pw", "LIST", "RETR 1", "DELE 1", "RETR 2", "DELE 2", "QUIT"]
        );
        let saves = store.saves();
        assert_eq!(saves[0].0, "one@example.org");
        assert_eq!(saves[0].1, FIRST.as_bytes());
        assert_eq!(saves[1].0, "two@example.org");
        assert!(String::from_utf8_lossy(&saves[1].1).ends_with("\r\n.dotted\r\n"));

        let durable = sink.contents();
        assert!(!durable.contains("s3cr3t-pw"));
        assert!(!durable.contains("Subject: 1"));
        // second message is one byte shorter after unstuffing
        assert!(durable.contains("[WARNING]: Unexpected end of message. Message ID: 2"));
        assert!(!durable.contains("Message ID: 1,"));
    }

    #[tokio::test]
    async fn body_message_id_is_ignored() {
        let body_only = "Subject: none\r\n\r\nMessage-ID: <fake@x>\r\n";
        let (dialer, _server) = serve("+OK ready\r\n", mailbox(vec![body_only]));
        let (audit, _) = audit();
        let store = Arc::new(Recorder::default());
        let mut session = RetrievalSession::with_dialer(settings(), audit, store.clone(), dialer);
        session.retrieve_all().await.unwrap();
        assert_eq!(store.saves()[0].0, "");
    }

    #[tokio::test]
    async fn folded_message_ids_keep_messages_apart() {
        let a = "Subject: a\r\nMessage-ID:\r\n <DB9PR01MB1234@eurprd01.prod.outlook.com>\r\n\r\nhi\r\n";
        let b = "Subject: b\r\nMessage-ID:\r\n\t<DB9PR01MB5678@eurprd01.prod.outlook.com>\r\n\r\nho\r\n";
        let (dialer, _server) = serve("+OK ready\r\n", mailbox(vec![a, b]));
        let (audit, _) = audit();
        let store = Arc::new(Recorder::default());
        let mut session = RetrievalSession::with_dialer(settings(), audit, store.clone(), dialer);
        assert_eq!(session.retrieve_all().await.unwrap(), 2);
        let ids: Vec<String> = store.saves().into_iter().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec![
                "DB9PR01MB1234@eurprd01.prod.outlook.com",
                "DB9PR01MB5678@eurprd01.prod.outlook.com"
            ]
        );
    }

    #[tokio::test]
    async fn failure_mid_loop_keeps_earlier_work() {
        let mut inner = mailbox(vec![FIRST, SECOND]);
        let (dialer, server) = serve("+OK ready\r\n", move |line: &str| {
            if line == "RETR 2" {
                Action::Reply("-ERR message 2 is locked\r\n".to_string())
            } else {
                inner(line)
            }
        });
        let (audit, sink) = audit();
        let store = Arc::new(Recorder::default());
        let mut session = RetrievalSession::with_dialer(settings(), audit, store.clone(), dialer);
        let err = session.retrieve_all().await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected { ref command, .. } if command == "RETR 2"));

        let saves = store.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, "one@example.org");
        let seen = server.await.unwrap();
        assert!(seen.iter().any(|l| l == "DELE 1"));
        assert!(!seen.iter().any(|l| l == "DELE 2" || l == "QUIT"));
        assert!(sink.contents().contains("Retrieval failed after 1 message(s)"));
    }

    #[tokio::test]
    async fn wrong_password_stops_before_list() {
        let (dialer, server) = serve("+OK ready\r\n", mailbox(vec![FIRST]));
        let (audit, sink) = audit();
        let store = Arc::new(Recorder::default());
        let s = RetrievalSettings::new(
            EndpointAddress::new("pop.example.org", 110),
            Credentials::new("bob", "wrong"),
        );
        let mut session = RetrievalSession::with_dialer(s, audit, store.clone(), dialer);
        let err = session.retrieve_all().await.err().unwrap();
        match err {
            SessionError::Rejected { command, .. } => assert_eq!(command, "<redacted>"),
            other => panic!("unexpected {:?}", other),
        }
        let seen = server.await.unwrap();
        assert_eq!(seen, vec!["USER bob", "PASS wrong"]);
        assert!(store.saves().is_empty());
        let durable = sink.contents();
        assert!(!durable.contains("wrong"));
        assert!(durable.contains("Logging was enabled."));
        assert!(durable.contains("[ERROR]"));
    }

    #[tokio::test]
    async fn malformed_listing_row_aborts() {
        let (dialer, _server) = serve("+OK ready\r\n", |line: &str| {
            if line == "LIST" {
                Action::Reply("+OK 1 10\r\n1 ten\r\n.\r\n".to_string())
            } else {
                Action::Reply("+OK\r\n".to_string())
            }
        });
        let (audit, _) = audit();
        let store = Arc::new(Recorder::default());
        let mut session = RetrievalSession::with_dialer(settings(), audit, store.clone(), dialer);
        let err = session.retrieve_all().await.err().unwrap();
        assert!(matches!(err, SessionError::Malformed(ref row) if row == "1 ten"));
    }

    #[tokio::test]
    async fn odd_summary_is_only_a_warning() {
        let (dialer, _server) = serve("+OK ready\r\n", |line: &str| {
            if line == "LIST" {
                Action::Reply("+OK mailbox scan listing follows\r\n.\r\n".to_string())
            } else {
                Action::Reply("+OK\r\n".to_string())
            }
        });
        let (audit, sink) = audit();
        let store = Arc::new(Recorder::default());
        let mut session = RetrievalSession::with_dialer(settings(), audit, store.clone(), dialer);
        assert_eq!(session.retrieve_all().await.unwrap(), 0);
        assert!(sink.contents().contains("[WARNING]: Unexpected LIST summary"));
    }

    #[tokio::test]
    async fn close_twice_and_reuse() {
        let (dialer, _server) = serve("+OK ready\r\n", mailbox(vec![]));
        let (audit, sink) = audit();
        let store = Arc::new(Recorder::default());
        let mut session = RetrievalSession::with_dialer(settings(), audit, store, dialer);
        assert_eq!(session.retrieve_all().await.unwrap(), 0);
        session.close().await;
        session.close().await;
        assert_eq!(sink.contents().matches("Connection closed").count(), 1);
        assert!(matches!(
            session.retrieve_all().await,
            Err(SessionError::InvalidState { from: "Closed", .. })
        ));
    }

    #[test]
    fn transition_table() {
        use RetrievalState::*;
        assert!(Idle.can_advance_to(Connected));
        assert!(!Connected.can_advance_to(Transaction));
        assert!(Transaction.can_advance_to(Closed));
        assert!(!Closed.can_advance_to(Idle));
    }
}
