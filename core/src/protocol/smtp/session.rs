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

//! SMTP submission session: greeting, EHLO, optional STARTTLS, AUTH, envelope, DATA, QUIT.

use std::time::Duration;

use chrono::Local;

use super::compose::Letter;
use super::reply::{Capabilities, SmtpReply};
use crate::audit::AuditLog;
use crate::error::SessionError;
use crate::net::{Dialer, TcpDialer, TransportConnection, DEFAULT_TIMEOUT};
use crate::protocol::channel::{LineChannel, Reply};
use crate::protocol::{Credentials, EndpointAddress, Security};
use crate::sasl::{self, SaslError, SaslMechanism};

/// Written after the closing line of every session.
pub const SESSION_SEPARATOR: &str = "___________________";

/// Where a submission session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Connected,
    Greeted,
    EncryptionNegotiating,
    Authenticated,
    EnvelopeOpen,
    DataPhase,
    Closed,
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "Idle",
            SubmissionState::Connected => "Connected",
            SubmissionState::Greeted => "Greeted",
            SubmissionState::EncryptionNegotiating => "EncryptionNegotiating",
            SubmissionState::Authenticated => "Authenticated",
            SubmissionState::EnvelopeOpen => "EnvelopeOpen",
            SubmissionState::DataPhase => "DataPhase",
            SubmissionState::Closed => "Closed",
        }
    }

    /// Transition table. Any live state may close; `Greeted -> EnvelopeOpen` is the
    /// unauthenticated path.
    pub fn can_advance_to(&self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        match (*self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Connected)
            | (Connected, Greeted)
            | (Greeted, EncryptionNegotiating)
            | (EncryptionNegotiating, Greeted)
            | (Greeted, Authenticated)
            | (Greeted, EnvelopeOpen)
            | (Authenticated, EnvelopeOpen)
            | (EnvelopeOpen, DataPhase) => true,
            _ => false,
        }
    }
}

/// Connection parameters for a submission session.
#[derive(Debug, Clone)]
pub struct SubmissionSettings {
    pub address: EndpointAddress,
    pub credentials: Credentials,
    pub security: Security,
    pub mechanism: SaslMechanism,
    pub timeout: Duration,
    /// Name announced in EHLO.
    pub client_name: String,
    /// Let LOGIN and PLAIN run over an unencrypted link.
    pub allow_cleartext_auth: bool,
}

impl SubmissionSettings {
    /// Security follows the port (587 STARTTLS, 465 implicit TLS).
    pub fn new(address: EndpointAddress, credentials: Credentials) -> Self {
        Self {
            security: Security::for_submission_port(address.port),
            address,
            credentials,
            mechanism: SaslMechanism::default(),
            timeout: DEFAULT_TIMEOUT,
            client_name: "localhost".to_string(),
            allow_cleartext_auth: false,
        }
    }

    pub fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    pub fn with_mechanism(mut self, mechanism: SaslMechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cleartext_auth(mut self, allow: bool) -> Self {
        self.allow_cleartext_auth = allow;
        self
    }
}

/// One submission. The session owns its channel, transport and transcript, and is
/// single-use: after `submit` returns it is `Closed`.
pub struct SubmissionSession<D: Dialer = TcpDialer> {
    settings: SubmissionSettings,
    dialer: D,
    channel: LineChannel<D::Stream>,
    state: SubmissionState,
}

impl SubmissionSession<TcpDialer> {
    pub fn new(settings: SubmissionSettings, audit: AuditLog) -> Self {
        Self::with_dialer(settings, audit, TcpDialer)
    }
}

impl<D: Dialer> SubmissionSession<D> {
    pub fn with_dialer(settings: SubmissionSettings, audit: AuditLog, dialer: D) -> Self {
        Self {
            settings,
            dialer,
            channel: LineChannel::new(audit),
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    fn advance(&mut self, next: SubmissionState) -> Result<(), SessionError> {
        if !self.state.can_advance_to(next) {
            return Err(SessionError::InvalidState {
                from: self.state.name(),
                to: next.name(),
            });
        }
        tracing::trace!("submission {} -> {}", self.state.name(), next.name());
        self.state = next;
        Ok(())
    }

    /// Deliver one letter. Whatever happens, the session ends `Closed` with its transcript
    /// released; the error says why the letter was not accepted.
    pub async fn submit(
        &mut self,
        sender: &str,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), SessionError> {
        if self.state != SubmissionState::Idle {
            return Err(SessionError::InvalidState {
                from: self.state.name(),
                to: SubmissionState::Connected.name(),
            });
        }
        let letter = Letter {
            sender,
            recipients,
            subject,
            body,
        };
        let result = if recipients.is_empty() {
            Err(SessionError::NoRecipients)
        } else {
            self.run(&letter).await
        };
        match &result {
            Ok(()) => self.channel.audit().record("Letter was sent successfully!"),
            Err(e) if e.is_timeout() => self.channel.audit().error("SMTP command timeout"),
            Err(e) => self.channel.audit().error(&format!("Submission failed: {}", e)),
        }
        self.close().await;
        result
    }

    async fn run(&mut self, letter: &Letter<'_>) -> Result<(), SessionError> {
        self.connect().await?;
        let caps = self.greet().await?;
        let caps = if self.settings.security == Security::StartTls {
            self.start_tls(&caps).await?
        } else {
            caps
        };
        if self.settings.credentials.login.is_empty() {
            tracing::debug!("no login configured, skipping AUTH");
        } else {
            self.authenticate(&caps).await?;
        }
        self.envelope(letter).await?;
        self.data(letter).await?;
        self.quit().await;
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
        self.advance(SubmissionState::Connected)?;
        let line = format!("Successfully connected to {}", self.settings.address);
        self.channel.audit().record(&line);
        self.channel.expect_reply::<SmtpReply>("greeting").await?;
        Ok(())
    }

    async fn ehlo(&mut self) -> Result<Capabilities, SessionError> {
        let command = format!("EHLO {}", self.settings.client_name);
        let reply: SmtpReply = self.channel.command(&command).await?;
        if reply.code == 500 || reply.code == 502 {
            // no ESMTP: plain HELO, no extensions
            let helo = format!("HELO {}", self.settings.client_name);
            self.channel.expect::<SmtpReply>(&helo).await?;
            return Ok(Capabilities::default());
        }
        if !reply.is_positive() {
            return Err(SessionError::rejected(command, reply.to_string()));
        }
        Ok(reply.capabilities())
    }

    async fn greet(&mut self) -> Result<Capabilities, SessionError> {
        let caps = self.ehlo().await?;
        self.advance(SubmissionState::Greeted)?;
        Ok(caps)
    }

    async fn start_tls(&mut self, caps: &Capabilities) -> Result<Capabilities, SessionError> {
        if !caps.starttls {
            tracing::warn!("{} did not advertise STARTTLS", self.settings.address);
        }
        self.advance(SubmissionState::EncryptionNegotiating)?;
        self.channel.expect::<SmtpReply>("STARTTLS").await?;
        let host = self.settings.address.host.clone();
        self.channel.upgrade_to_encrypted(&host).await?;
        // capabilities are reset by the upgrade
        let caps = self.ehlo().await?;
        self.advance(SubmissionState::Greeted)?;
        Ok(caps)
    }

    async fn authenticate(&mut self, caps: &Capabilities) -> Result<(), SessionError> {
        let mechanism = self.settings.mechanism;
        if !caps.auth.is_empty() && !caps.auth.contains(&mechanism) {
            return Err(SaslError::Unsupported(mechanism).into());
        }
        if mechanism.sends_cleartext_secret()
            && !self.channel.is_encrypted()
            && !self.settings.allow_cleartext_auth
        {
            return Err(SaslError::CleartextRefused(mechanism).into());
        }
        let login = self.settings.credentials.login.clone();
        let secret = self.settings.credentials.secret().to_string();
        match mechanism {
            SaslMechanism::Login => {
                self.channel.expect::<SmtpReply>("AUTH LOGIN").await?;
                self.channel
                    .expect::<SmtpReply>(&sasl::encode(login.as_bytes()))
                    .await?;
                let mut quiet = self.channel.suppressed();
                quiet
                    .expect::<SmtpReply>(&sasl::encode(secret.as_bytes()))
                    .await?;
            }
            SaslMechanism::Plain => {
                let initial = sasl::encode(&sasl::encode_plain("", &login, &secret)?);
                let mut quiet = self.channel.suppressed();
                quiet
                    .expect::<SmtpReply>(&format!("AUTH PLAIN {}", initial))
                    .await?;
            }
            SaslMechanism::CramMd5 => {
                let challenge = self.channel.expect::<SmtpReply>("AUTH CRAM-MD5").await?;
                let response = sasl::cram_md5_response(&login, &secret, challenge.message())?;
                let mut quiet = self.channel.suppressed();
                quiet.expect::<SmtpReply>(&response).await?;
            }
        }
        self.advance(SubmissionState::Authenticated)
    }

    async fn envelope(&mut self, letter: &Letter<'_>) -> Result<(), SessionError> {
        self.advance(SubmissionState::EnvelopeOpen)?;
        self.channel
            .expect::<SmtpReply>(&format!("MAIL FROM:<{}>", letter.sender.trim()))
            .await?;
        for recipient in letter.recipients {
            self.channel
                .expect::<SmtpReply>(&format!("RCPT TO:<{}>", recipient.trim()))
                .await?;
        }
        Ok(())
    }

    async fn data(&mut self, letter: &Letter<'_>) -> Result<(), SessionError> {
        self.advance(SubmissionState::DataPhase)?;
        self.channel.expect::<SmtpReply>("DATA").await?;
        for line in letter.data_lines(Local::now()) {
            self.channel.send_line(&line).await?;
        }
        self.channel.send_line(".").await?;
        self.channel.expect_reply::<SmtpReply>("end of data").await?;
        Ok(())
    }

    /// The letter is already accepted; a failed QUIT only earns a warning.
    async fn quit(&mut self) {
        match self.channel.command::<SmtpReply>("QUIT").await {
            Ok(reply) if reply.is_positive() => {}
            Ok(reply) => {
                let line = format!("QUIT answered with {}", reply);
                self.channel.audit().warning(&line);
            }
            Err(e) => {
                let line = format!("QUIT failed: {}", e);
                self.channel.audit().warning(&line);
            }
        }
    }

    /// Close the connection and release the transcript. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.state == SubmissionState::Closed {
            return;
        }
        self.state = SubmissionState::Closed;
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
    use crate::error::TransportError;
    use crate::protocol::testing::{serve, Action};
    use std::io;

    fn reply(text: &str) -> Action {
        Action::Reply(format!("{}\r\n", text))
    }

    fn settings(port: u16, login: &str) -> SubmissionSettings {
        SubmissionSettings::new(
            EndpointAddress::new("mail.example.org", port),
            Credentials::new(login, "s3cr3t-pw"),
        )
        .with_timeout(Duration::from_secs(2))
        // duplex links are never encrypted
        .with_cleartext_auth(true)
    }

    fn audit() -> (AuditLog, MemorySink) {
        let sink = MemorySink::new();
        (AuditLog::with_writers(sink.clone(), io::sink()), sink)
    }

    /// Well-behaved relay on port 25; DATA content is swallowed until ".".
    fn relay(reject_rcpt: Option<&'static str>) -> impl FnMut(&str) -> Action + Send + 'static {
        let mut in_data = false;
        move |line: &str| {
            if in_data {
                if line == "." {
                    in_data = false;
                    return reply("250 2.0.0 queued");
                }
                return Action::Silent;
            }
            match line {
                l if l.starts_with("EHLO") => Action::Reply(
                    "250-mail.example.org\r\n250-AUTH LOGIN PLAIN CRAM-MD5\r\n250 8BITMIME\r\n"
                        .to_string(),
                ),
                "AUTH LOGIN" => reply("334 VXNlcm5hbWU6"),
                "AUTH CRAM-MD5" => reply("334 PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+"),
                l if l.starts_with("AUTH PLAIN") => reply("235 ok"),
                l if l == sasl::encode(b"bob") => reply("334 UGFzc3dvcmQ6"),
                l if l.starts_with("MAIL FROM") => reply("250 ok"),
                l if l.starts_with("RCPT TO") => match reject_rcpt {
                    Some(bad) if l.contains(bad) => reply("550 5.1.1 no such user"),
                    _ => reply("250 ok"),
                },
                "DATA" => {
                    in_data = true;
                    reply("354 go ahead")
                }
                "QUIT" => reply("221 bye"),
                _ => reply("235 authenticated"),
            }
        }
    }

    fn rcpts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn full_submission_with_login() {
        let (dialer, server) = serve("220 mail.example.org ESMTP\r\n", relay(None));
        let (audit, sink) = audit();
        let mut session = SubmissionSession::with_dialer(settings(25, "bob"), audit, dialer);
        session
            .submit("bob@example.org", &rcpts(&["a@example.net", "b@example.net"]), "Hello", "Hi.\n.hidden\n")
            .await
            .unwrap();
        assert_eq!(session.state(), SubmissionState::Closed);

        let seen = server.await.unwrap();
        let commands: Vec<&str> = seen.iter().map(|s| s.as_str()).collect();
        assert_eq!(commands[0], "EHLO localhost");
        assert_eq!(commands[1], "AUTH LOGIN");
        assert_eq!(commands[2], sasl::encode(b"bob"));
        assert_eq!(commands[3], sasl::encode(b"s3cr3t-pw"));
        assert_eq!(commands[4], "MAIL FROM:<bob@example.org>");
        assert_eq!(commands[5], "RCPT TO:<a@example.net>");
        assert_eq!(commands[6], "RCPT TO:<b@example.net>");
        assert_eq!(commands[7], "DATA");
        assert!(commands.contains(&"Subject: Hello"));
        assert!(commands.contains(&"..hidden"));
        assert_eq!(commands[commands.len() - 2], ".");
        assert_eq!(commands[commands.len() - 1], "QUIT");

        let durable = sink.contents();
        assert!(durable.contains("Letter was sent successfully!"));
        assert!(!durable.contains(&sasl::encode(b"s3cr3t-pw")));
        assert!(durable.contains("Disable logging..."));
        assert!(durable.contains("Logging was enabled."));
        assert!(durable.contains(SESSION_SEPARATOR));
    }

    #[tokio::test]
    async fn rejected_recipient_stops_the_envelope() {
        let (dialer, server) = serve("220 ready\r\n", relay(Some("b@")));
        let (audit, sink) = audit();
        let mut session = SubmissionSession::with_dialer(settings(25, ""), audit, dialer);
        let err = session
            .submit("me@example.org", &rcpts(&["a@x.org", "b@x.org", "c@x.org"]), "s", "b")
            .await
            .err()
            .unwrap();
        match err {
            SessionError::Rejected { command, reply } => {
                assert_eq!(command, "RCPT TO:<b@x.org>");
                assert!(reply.starts_with("550"));
            }
            other => panic!("unexpected {:?}", other),
        }
        let seen = server.await.unwrap();
        assert!(!seen.iter().any(|l| l.contains("c@x.org")));
        assert!(!seen.iter().any(|l| l == "DATA"));
        assert!(!seen.iter().any(|l| l.starts_with("AUTH")));
        assert!(sink.contents().contains("[ERROR]: Submission failed"));
    }

    #[tokio::test]
    async fn negative_greeting_fails() {
        let (dialer, _server) = serve("554 go away\r\n", relay(None));
        let (audit, _) = audit();
        let mut session = SubmissionSession::with_dialer(settings(25, ""), audit, dialer);
        let err = session
            .submit("me@example.org", &rcpts(&["a@x.org"]), "s", "b")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Rejected { .. }));
    }

    #[tokio::test]
    async fn plain_and_cram_md5_are_suppressed() {
        for mechanism in [SaslMechanism::Plain, SaslMechanism::CramMd5] {
            let (dialer, server) = serve("220 ready\r\n", relay(None));
            let (audit, sink) = audit();
            let s = settings(25, "bob").with_mechanism(mechanism);
            let mut session = SubmissionSession::with_dialer(s, audit, dialer);
            session
                .submit("bob@example.org", &rcpts(&["a@x.org"]), "s", "b")
                .await
                .unwrap();
            let seen = server.await.unwrap();
            let durable = sink.contents();
            let secret_line = match mechanism {
                SaslMechanism::Plain => seen.iter().find(|l| l.starts_with("AUTH PLAIN ")).cloned(),
                _ => seen.get(2).cloned(),
            }
            .unwrap();
            assert!(!durable.contains(&secret_line), "{:?}", mechanism);
        }
    }

    #[tokio::test]
    async fn unsupported_mechanism_is_reported() {
        let (dialer, _server) = serve("220 ready\r\n", |line: &str| {
            if line.starts_with("EHLO") {
                Action::Reply("250-hi\r\n250 AUTH PLAIN\r\n".to_string())
            } else {
                Action::Reply("221 bye\r\n".to_string())
            }
        });
        let (audit, _) = audit();
        let mut session = SubmissionSession::with_dialer(settings(25, "bob"), audit, dialer);
        let err = session
            .submit("bob@example.org", &rcpts(&["a@x.org"]), "s", "b")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Auth(SaslError::Unsupported(SaslMechanism::Login))));
    }

    #[tokio::test]
    async fn cleartext_secret_is_refused_on_a_plain_link() {
        for mechanism in [SaslMechanism::Login, SaslMechanism::Plain] {
            let (dialer, server) = serve("220 ready\r\n", relay(None));
            let (audit, sink) = audit();
            let s = settings(25, "bob")
                .with_cleartext_auth(false)
                .with_mechanism(mechanism);
            let mut session = SubmissionSession::with_dialer(s, audit, dialer);
            let err = session
                .submit("bob@example.org", &rcpts(&["a@x.org"]), "s", "b")
                .await
                .err()
                .unwrap();
            assert!(
                matches!(err, SessionError::Auth(SaslError::CleartextRefused(m)) if m == mechanism),
                "{:?}",
                err
            );
            let seen = server.await.unwrap();
            assert!(!seen.iter().any(|l| l.starts_with("AUTH") || l.starts_with("MAIL")));
            assert!(!seen.iter().any(|l| l.contains(&sasl::encode(b"s3cr3t-pw"))));
            assert!(sink.contents().contains("[ERROR]: Submission failed"));
        }
    }

    #[tokio::test]
    async fn cram_md5_needs_no_encryption() {
        let (dialer, server) = serve("220 ready\r\n", relay(None));
        let (audit, _) = audit();
        let s = settings(25, "bob")
            .with_cleartext_auth(false)
            .with_mechanism(SaslMechanism::CramMd5);
        let mut session = SubmissionSession::with_dialer(s, audit, dialer);
        session
            .submit("bob@example.org", &rcpts(&["a@x.org"]), "s", "b")
            .await
            .unwrap();
        let seen = server.await.unwrap();
        assert!(seen.iter().any(|l| l == "AUTH CRAM-MD5"));
    }

    #[tokio::test]
    async fn helo_when_ehlo_is_not_implemented() {
        let mut in_data = false;
        let (dialer, server) = serve("220 old relay\r\n", move |line: &str| {
            if in_data {
                if line == "." {
                    in_data = false;
                    return reply("250 queued");
                }
                return Action::Silent;
            }
            match line {
                l if l.starts_with("EHLO") => reply("502 command not implemented"),
                "DATA" => {
                    in_data = true;
                    reply("354 go ahead")
                }
                "QUIT" => reply("221 bye"),
                _ => reply("250 ok"),
            }
        });
        let (audit, _) = audit();
        let mut session = SubmissionSession::with_dialer(settings(25, ""), audit, dialer);
        session
            .submit("me@example.org", &rcpts(&["a@x.org"]), "s", "b")
            .await
            .unwrap();
        let seen = server.await.unwrap();
        assert_eq!(seen[0], "EHLO localhost");
        assert_eq!(seen[1], "HELO localhost");
        assert_eq!(seen[2], "MAIL FROM:<me@example.org>");
    }

    #[tokio::test]
    async fn starttls_handshake_failure_is_upgrade_error() {
        let (dialer, server) = serve("220 ready\r\n", |line: &str| {
            if line.starts_with("EHLO") {
                Action::Reply("250-hi\r\n250 STARTTLS\r\n".to_string())
            } else if line == "STARTTLS" {
                Action::ReplyThenJunk("220 go ahead\r\n".to_string())
            } else {
                Action::Reply("500 what\r\n".to_string())
            }
        });
        let (audit, sink) = audit();
        let mut session = SubmissionSession::with_dialer(settings(587, "bob"), audit, dialer);
        let err = session
            .submit("bob@example.org", &rcpts(&["a@x.org"]), "s", "b")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Transport(TransportError::Upgrade { .. })));
        assert_eq!(session.state(), SubmissionState::Closed);
        let seen = server.await.unwrap();
        assert!(!seen.iter().any(|l| l.starts_with("AUTH")));
        assert!(sink.contents().contains("[ERROR]"));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (dialer, _server) = serve("220 ready\r\n", |_: &str| Action::Silent);
        let (audit, sink) = audit();
        let s = settings(25, "").with_timeout(Duration::from_millis(100));
        let mut session = SubmissionSession::with_dialer(s, audit, dialer);
        let err = session
            .submit("me@example.org", &rcpts(&["a@x.org"]), "s", "b")
            .await
            .err()
            .unwrap();
        assert!(err.is_timeout());
        assert!(sink.contents().contains("SMTP command timeout"));
    }

    #[tokio::test]
    async fn no_recipients_never_dials() {
        let (dialer, _server) = serve("220 ready\r\n", relay(None));
        let (audit, _) = audit();
        let mut session = SubmissionSession::with_dialer(settings(25, ""), audit, dialer);
        let err = session.submit("me@example.org", &[], "s", "b").await.err().unwrap();
        assert!(matches!(err, SessionError::NoRecipients));
        assert_eq!(session.dialer.dials, 0);
    }

    #[tokio::test]
    async fn session_is_single_use_and_close_is_idempotent() {
        let (dialer, _server) = serve("220 ready\r\n", relay(None));
        let (audit, sink) = audit();
        let mut session = SubmissionSession::with_dialer(settings(25, ""), audit, dialer);
        session
            .submit("me@example.org", &rcpts(&["a@x.org"]), "s", "b")
            .await
            .unwrap();
        session.close().await;
        session.close().await;
        assert_eq!(sink.contents().matches("Connection closed").count(), 1);
        let err = session
            .submit("me@example.org", &rcpts(&["a@x.org"]), "s", "b")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::InvalidState { from: "Closed", .. }));
    }

    #[test]
    fn transition_table() {
        use SubmissionState::*;
        assert!(Idle.can_advance_to(Connected));
        assert!(!Idle.can_advance_to(Authenticated));
        assert!(Greeted.can_advance_to(EnvelopeOpen));
        assert!(EncryptionNegotiating.can_advance_to(Greeted));
        assert!(!DataPhase.can_advance_to(EnvelopeOpen));
        assert!(DataPhase.can_advance_to(Closed));
        assert!(!Closed.can_advance_to(Closed));
    }
}
