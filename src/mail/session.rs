//! Capability interface over a remote mailbox session.
//!
//! Everything above this module talks to the server through [`MailSession`];
//! the IMAP adapter lives in `imap_client` and tests use `fake`.

use std::sync::mpsc::SyncSender;

use crate::domain::mailbox::{MailboxRef, MailboxStatus};
use crate::domain::message::{FetchedMessage, Uid};
use crate::error::SessionError;

/// Which items a range fetch should retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFields {
    /// UID, envelope and size only.
    Envelope,
    /// Everything in `Envelope` plus the full raw message.
    Full,
}

/// Target of a flag store or a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSet {
    Uid(Uid),
    /// Sequence range `1:n` of the selected mailbox.
    AllOf(u32),
}

/// Server extensions that change how a message is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extensions {
    /// UIDPLUS: `UID EXPUNGE` limited to given UIDs.
    pub uidplus: bool,
    /// MOVE: atomic `UID MOVE`.
    pub moves: bool,
}

pub trait MailSession: Send {
    /// Capabilities of the server behind this session.
    fn extensions(&mut self) -> Result<Extensions, SessionError>;

    fn list_mailboxes(&mut self) -> Result<Vec<MailboxRef>, SessionError>;

    fn select(&mut self, mailbox: &str, read_only: bool) -> Result<MailboxStatus, SessionError>;

    /// Fetch sequence numbers `from..=to`, pushing each message into `out` as
    /// it is parsed. An error may be returned after every message was sent.
    fn fetch_range(
        &mut self,
        from: u32,
        to: u32,
        fields: FetchFields,
        out: &SyncSender<FetchedMessage>,
    ) -> Result<(), SessionError>;

    /// Fetch one message of the selected mailbox by UID (envelope only).
    fn fetch_uid(&mut self, uid: Uid) -> Result<Option<FetchedMessage>, SessionError>;

    fn store_deleted(&mut self, set: MessageSet) -> Result<(), SessionError>;

    /// Expunge every `\Deleted` message of the selected mailbox.
    fn expunge(&mut self) -> Result<(), SessionError>;

    /// Expunge only `uid`, if it is flagged `\Deleted`. Needs UIDPLUS.
    fn uid_expunge(&mut self, uid: Uid) -> Result<(), SessionError>;

    fn delete_mailbox(&mut self, mailbox: &str) -> Result<(), SessionError>;

    /// Needs MOVE.
    fn move_messages(&mut self, set: MessageSet, destination: &str) -> Result<(), SessionError>;

    fn copy_messages(&mut self, set: MessageSet, destination: &str) -> Result<(), SessionError>;

    fn logout(&mut self) -> Result<(), SessionError>;
}

/// Opens authenticated sessions. Used once at startup and again after every
/// transient failure.
pub trait Connector {
    type Session: MailSession;

    fn connect(&self) -> Result<Self::Session, SessionError>;
}
