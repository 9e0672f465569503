use serde::Serialize;

use crate::domain::mailbox::MailboxRef;

pub type Uid = u32;

/// Raw item produced by a range fetch, before fingerprinting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedMessage {
    pub sequence: u32,
    pub uid: Option<Uid>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub size: Option<u32>,
    pub body: Option<Vec<u8>>,
}

/// One scanned message. Snapshot data, valid for the run that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub mailbox: MailboxRef,
    /// Sequence number at scan time; never used for mutation.
    pub sequence: u32,
    pub uid: Uid,
    pub subject: String,
    pub date: String,
    pub size: u32,
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintGroup {
    pub fingerprint: String,
    pub members: Vec<MessageRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    Delete,
    MoveToTrash { trash: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub record: MessageRecord,
    pub kind: ActionKind,
}

/// Subject and date of a message, listed before a folder is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub subject: String,
    pub date: String,
}
