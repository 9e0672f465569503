use std::net::TcpStream;
use std::sync::mpsc::SyncSender;

use log::{debug, info};
use native_tls::{TlsConnector, TlsStream};

use crate::domain::mailbox::{MailboxRef, MailboxStatus};
use crate::domain::message::{FetchedMessage, Uid};
use crate::error::{ErrorKind, SessionError};
use crate::mail::decoders::decode_header_value;
use crate::mail::session::{Connector, Extensions, FetchFields, MailSession, MessageSet};

type TlsSession = imap::Session<TlsStream<TcpStream>>;

/// Connection parameters for an IMAP-over-TLS account.
pub struct ImapClient {
    pub server: String,
    pub port: u16,
    pub user: String,
    password: String,
}

impl ImapClient {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            user: user.into(),
            password: password.into(),
        }
    }

    fn connect_and_auth(&self) -> Result<TlsSession, SessionError> {
        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| SessionError::new(ErrorKind::Connection, e.to_string()))?;

        info!("Connecting to {}:{}...", self.server, self.port);
        let client = imap::connect(
            (self.server.as_str(), self.port),
            self.server.as_str(),
            &tls,
        )
        .map_err(|e| SessionError::new(ErrorKind::Connection, e.to_string()))?;

        match client.login(&self.user, &self.password) {
            Ok(session) => {
                info!("Connected as {}", self.user);
                Ok(session)
            }
            Err((e, _client)) => Err(SessionError::new(ErrorKind::Authentication, e.to_string())),
        }
    }
}

impl Connector for ImapClient {
    type Session = ImapSession;

    fn connect(&self) -> Result<ImapSession, SessionError> {
        Ok(ImapSession {
            inner: self.connect_and_auth()?,
            extensions: None,
        })
    }
}

/// An authenticated IMAP session.
pub struct ImapSession {
    inner: TlsSession,
    /// CAPABILITY is asked once per session.
    extensions: Option<Extensions>,
}

/// Servers report an expired login as a plain NO/BAD reply; this is the only
/// place where reply text is inspected.
fn is_expired_login(text: &str) -> bool {
    let t = text.to_ascii_lowercase();
    t.contains("not logged in") || t.contains("not authenticated")
}

fn classify(err: imap::error::Error) -> SessionError {
    use imap::error::Error;

    match err {
        Error::Io(e) => SessionError::session_invalid(e.to_string()),
        Error::ConnectionLost => SessionError::session_invalid("connection lost"),
        Error::No(text) | Error::Bad(text) if is_expired_login(&text) => {
            SessionError::session_invalid(text)
        }
        Error::No(text) | Error::Bad(text) => SessionError::rejected(text),
        other => SessionError::new(ErrorKind::Protocol, other.to_string()),
    }
}

fn to_fetched(f: &imap::types::Fetch) -> FetchedMessage {
    let env = f.envelope();
    FetchedMessage {
        sequence: f.message,
        uid: f.uid,
        subject: env.and_then(|e| e.subject).map(decode_header_value),
        date: env.and_then(|e| e.date).map(decode_header_value),
        size: f.size,
        body: f.body().map(|b| b.to_vec()),
    }
}

fn set_string(set: MessageSet) -> String {
    match set {
        MessageSet::Uid(uid) => uid.to_string(),
        MessageSet::AllOf(n) => format!("1:{}", n),
    }
}

impl MailSession for ImapSession {
    fn extensions(&mut self) -> Result<Extensions, SessionError> {
        if let Some(ext) = self.extensions {
            return Ok(ext);
        }
        let caps = self.inner.capabilities().map_err(classify)?;
        let ext = Extensions {
            uidplus: caps.has_str("UIDPLUS"),
            moves: caps.has_str("MOVE"),
        };
        debug!("Server extensions: {:?}", ext);
        self.extensions = Some(ext);
        Ok(ext)
    }

    fn list_mailboxes(&mut self) -> Result<Vec<MailboxRef>, SessionError> {
        let names = self.inner.list(Some(""), Some("*")).map_err(classify)?;
        Ok(names
            .iter()
            .map(|n| MailboxRef::new(n.name(), n.delimiter()))
            .collect())
    }

    fn select(&mut self, mailbox: &str, read_only: bool) -> Result<MailboxStatus, SessionError> {
        let res = if read_only {
            self.inner.examine(mailbox)
        } else {
            self.inner.select(mailbox)
        };
        let mb = res.map_err(classify)?;
        Ok(MailboxStatus { exists: mb.exists })
    }

    fn fetch_range(
        &mut self,
        from: u32,
        to: u32,
        fields: FetchFields,
        out: &SyncSender<FetchedMessage>,
    ) -> Result<(), SessionError> {
        let query = match fields {
            FetchFields::Envelope => "(UID RFC822.SIZE ENVELOPE)",
            FetchFields::Full => "(UID RFC822.SIZE ENVELOPE BODY.PEEK[])",
        };
        let fetches = self
            .inner
            .fetch(format!("{}:{}", from, to), query)
            .map_err(classify)?;

        for f in fetches.iter() {
            if out.send(to_fetched(f)).is_err() {
                debug!("fetch consumer went away at sequence {}", f.message);
                break;
            }
        }
        Ok(())
    }

    fn fetch_uid(&mut self, uid: Uid) -> Result<Option<FetchedMessage>, SessionError> {
        let fetches = self
            .inner
            .uid_fetch(uid.to_string(), "(UID RFC822.SIZE ENVELOPE)")
            .map_err(classify)?;
        // Some servers answer a UID FETCH for a vanished UID with the highest
        // existing message instead of nothing.
        Ok(fetches
            .iter()
            .find(|f| f.uid == Some(uid))
            .map(to_fetched))
    }

    fn store_deleted(&mut self, set: MessageSet) -> Result<(), SessionError> {
        let res = match set {
            MessageSet::Uid(_) => self.inner.uid_store(set_string(set), "+FLAGS (\\Deleted)"),
            MessageSet::AllOf(_) => self.inner.store(set_string(set), "+FLAGS (\\Deleted)"),
        };
        res.map(|_| ()).map_err(classify)
    }

    fn expunge(&mut self) -> Result<(), SessionError> {
        self.inner.expunge().map(|_| ()).map_err(classify)
    }

    fn uid_expunge(&mut self, uid: Uid) -> Result<(), SessionError> {
        self.inner
            .uid_expunge(uid.to_string())
            .map(|_| ())
            .map_err(classify)
    }

    fn delete_mailbox(&mut self, mailbox: &str) -> Result<(), SessionError> {
        self.inner.delete(mailbox).map_err(classify)
    }

    fn move_messages(&mut self, set: MessageSet, destination: &str) -> Result<(), SessionError> {
        let res = match set {
            MessageSet::Uid(_) => self.inner.uid_mv(set_string(set), destination),
            MessageSet::AllOf(_) => self.inner.mv(set_string(set), destination),
        };
        res.map_err(classify)
    }

    fn copy_messages(&mut self, set: MessageSet, destination: &str) -> Result<(), SessionError> {
        let res = match set {
            MessageSet::Uid(_) => self.inner.uid_copy(set_string(set), destination),
            MessageSet::AllOf(_) => self.inner.copy(set_string(set), destination),
        };
        res.map_err(classify)
    }

    fn logout(&mut self) -> Result<(), SessionError> {
        self.inner.logout().map_err(classify)
    }
}
