//! In-memory mail server for tests, with scripted failures.

use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex, MutexGuard};

use mailparse::MailHeaderMap;

use crate::domain::mailbox::{MailboxRef, MailboxStatus};
use crate::domain::message::{FetchedMessage, Uid};
use crate::error::{ErrorKind, SessionError};
use crate::mail::session::{Connector, Extensions, FetchFields, MailSession, MessageSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Connect,
    Capability,
    List,
    Select,
    Fetch,
    FetchUid,
    Store,
    Expunge,
    UidExpunge,
    Delete,
    Move,
    Copy,
    Logout,
}

struct Scripted {
    op: Op,
    error: SessionError,
    after_delivery: bool,
}

struct FakeMessage {
    uid: Uid,
    subject: String,
    date: String,
    raw: Option<Vec<u8>>,
    deleted: bool,
}

struct FakeMailbox {
    mailbox: MailboxRef,
    messages: Vec<FakeMessage>,
    next_uid: Uid,
}

#[derive(Default)]
struct State {
    mailboxes: Vec<FakeMailbox>,
    script: Vec<Scripted>,
    calls: Vec<Op>,
    stale_calls: usize,
    no_uidplus: bool,
    no_move: bool,
}

impl State {
    fn take_failure(&mut self, op: Op) -> Option<Scripted> {
        let idx = self.script.iter().position(|s| s.op == op)?;
        Some(self.script.remove(idx))
    }

    fn mailbox_mut(&mut self, name: &str) -> Option<&mut FakeMailbox> {
        self.mailboxes.iter_mut().find(|m| m.mailbox.name == name)
    }
}

fn in_set(set: MessageSet, sequence: u32, m: &FakeMessage) -> bool {
    match set {
        MessageSet::Uid(uid) => m.uid == uid,
        MessageSet::AllOf(n) => sequence <= n,
    }
}

impl FakeMailbox {
    fn deliver(&mut self, messages: Vec<FakeMessage>) {
        for mut m in messages {
            m.uid = self.next_uid;
            self.next_uid += 1;
            self.messages.push(m);
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<State>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_mailbox(&self, name: &str, delimiter: Option<&str>) {
        self.lock().mailboxes.push(FakeMailbox {
            mailbox: MailboxRef::new(name, delimiter),
            messages: Vec::new(),
            next_uid: 1,
        });
    }

    /// Append a raw message; returns its UID.
    pub fn append(&self, mailbox: &str, raw: Vec<u8>) -> Uid {
        let (subject, date) = match mailparse::parse_mail(&raw) {
            Ok(p) => (
                p.headers.get_first_value("Subject").unwrap_or_default(),
                p.headers.get_first_value("Date").unwrap_or_default(),
            ),
            Err(_) => (String::new(), String::new()),
        };
        self.push(mailbox, subject, date, Some(raw))
    }

    pub fn append_without_body(&self, mailbox: &str, subject: &str) -> Uid {
        self.push(mailbox, subject.to_string(), String::new(), None)
    }

    fn push(&self, mailbox: &str, subject: String, date: String, raw: Option<Vec<u8>>) -> Uid {
        let mut st = self.lock();
        let mb = st.mailbox_mut(mailbox).expect("unknown mailbox");
        let uid = mb.next_uid;
        mb.next_uid += 1;
        mb.messages.push(FakeMessage {
            uid,
            subject,
            date,
            raw,
            deleted: false,
        });
        uid
    }

    /// Stop advertising UIDPLUS; `UID EXPUNGE` is then refused.
    pub fn without_uidplus(&self) {
        self.lock().no_uidplus = true;
    }

    /// Stop advertising MOVE; moves are then refused.
    pub fn without_move(&self) {
        self.lock().no_move = true;
    }

    /// The next call of `op` fails with `error`.
    pub fn fail_next(&self, op: Op, error: SessionError) {
        self.fail_times(op, 1, error);
    }

    pub fn fail_times(&self, op: Op, times: usize, error: SessionError) {
        let mut st = self.lock();
        for _ in 0..times {
            st.script.push(Scripted {
                op,
                error: error.clone(),
                after_delivery: false,
            });
        }
    }

    /// The next range fetch delivers every message, then fails.
    pub fn fail_after_delivery(&self, op: Op, error: SessionError) {
        self.lock().script.push(Scripted {
            op,
            error,
            after_delivery: true,
        });
    }

    pub fn session(&self) -> FakeSession {
        FakeSession {
            state: self.state.clone(),
            selected: None,
            alive: true,
        }
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            server: self.clone(),
        }
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// Calls issued on a session after it was logged out or invalidated.
    pub fn stale_calls(&self) -> usize {
        self.lock().stale_calls
    }

    pub fn mailbox_names(&self) -> Vec<String> {
        self.lock()
            .mailboxes
            .iter()
            .map(|m| m.mailbox.name.clone())
            .collect()
    }

    /// Subjects of the messages currently in `mailbox`.
    pub fn subjects(&self, mailbox: &str) -> Vec<String> {
        self.lock()
            .mailboxes
            .iter()
            .find(|m| m.mailbox.name == mailbox)
            .map(|m| m.messages.iter().map(|x| x.subject.clone()).collect())
            .unwrap_or_default()
    }
}

pub struct FakeConnector {
    server: FakeServer,
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    fn connect(&self) -> Result<FakeSession, SessionError> {
        let mut st = self.server.lock();
        st.calls.push(Op::Connect);
        if let Some(f) = st.take_failure(Op::Connect) {
            return Err(f.error);
        }
        drop(st);
        Ok(self.server.session())
    }
}

pub struct FakeSession {
    state: Arc<Mutex<State>>,
    selected: Option<(String, bool)>,
    alive: bool,
}

impl FakeSession {
    /// Record the call and apply any scripted failure. Scripted
    /// `SessionInvalid` failures kill the session for good.
    fn enter(&mut self, op: Op) -> Result<(MutexGuard<'_, State>, Option<Scripted>), SessionError> {
        let mut st = self.state.lock().unwrap();
        st.calls.push(op);
        if !self.alive {
            st.stale_calls += 1;
            return Err(SessionError::session_invalid("Not logged in"));
        }
        let scripted = st.take_failure(op);
        if let Some(s) = &scripted {
            if s.error.is_transient() {
                self.alive = false;
            }
            if !s.after_delivery {
                let err = s.error.clone();
                return Err(err);
            }
        }
        Ok((st, scripted))
    }

    fn selected_writable(&self) -> Result<String, SessionError> {
        match &self.selected {
            Some((name, false)) => Ok(name.clone()),
            Some((_, true)) => Err(SessionError::rejected("mailbox is read-only")),
            None => Err(SessionError::rejected("no mailbox selected")),
        }
    }
}

impl MailSession for FakeSession {
    fn extensions(&mut self) -> Result<Extensions, SessionError> {
        let (st, _) = self.enter(Op::Capability)?;
        Ok(Extensions {
            uidplus: !st.no_uidplus,
            moves: !st.no_move,
        })
    }

    fn list_mailboxes(&mut self) -> Result<Vec<MailboxRef>, SessionError> {
        let (st, _) = self.enter(Op::List)?;
        Ok(st.mailboxes.iter().map(|m| m.mailbox.clone()).collect())
    }

    fn select(&mut self, mailbox: &str, read_only: bool) -> Result<MailboxStatus, SessionError> {
        let (st, _) = self.enter(Op::Select)?;
        let exists = st
            .mailboxes
            .iter()
            .find(|m| m.mailbox.name == mailbox)
            .map(|m| m.messages.len() as u32)
            .ok_or_else(|| SessionError::rejected(format!("no such mailbox {}", mailbox)))?;
        drop(st);
        self.selected = Some((mailbox.to_string(), read_only));
        Ok(MailboxStatus { exists })
    }

    fn fetch_range(
        &mut self,
        from: u32,
        to: u32,
        fields: FetchFields,
        out: &SyncSender<FetchedMessage>,
    ) -> Result<(), SessionError> {
        let selected = self.selected.as_ref().map(|(n, _)| n.clone());
        let (mut st, scripted) = self.enter(Op::Fetch)?;
        let name = selected.ok_or_else(|| SessionError::rejected("no mailbox selected"))?;
        let items: Vec<FetchedMessage> = st
            .mailbox_mut(&name)
            .map(|mb| {
                mb.messages
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| (from..=to).contains(&(*i as u32 + 1)))
                    .map(|(i, m)| FetchedMessage {
                        sequence: i as u32 + 1,
                        uid: Some(m.uid),
                        subject: Some(m.subject.clone()),
                        date: Some(m.date.clone()),
                        size: m.raw.as_ref().map(|r| r.len() as u32),
                        body: match fields {
                            FetchFields::Full => m.raw.clone(),
                            FetchFields::Envelope => None,
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();
        // release the lock while the consumer drains
        drop(st);

        for item in items {
            if out.send(item).is_err() {
                break;
            }
        }
        match scripted {
            Some(s) => Err(s.error),
            None => Ok(()),
        }
    }

    fn fetch_uid(&mut self, uid: Uid) -> Result<Option<FetchedMessage>, SessionError> {
        let selected = self.selected.as_ref().map(|(n, _)| n.clone());
        let (mut st, _) = self.enter(Op::FetchUid)?;
        let name = selected.ok_or_else(|| SessionError::rejected("no mailbox selected"))?;
        Ok(st.mailbox_mut(&name).and_then(|mb| {
            mb.messages
                .iter()
                .enumerate()
                .find(|(_, m)| m.uid == uid)
                .map(|(i, m)| FetchedMessage {
                    sequence: i as u32 + 1,
                    uid: Some(m.uid),
                    subject: Some(m.subject.clone()),
                    date: Some(m.date.clone()),
                    size: m.raw.as_ref().map(|r| r.len() as u32),
                    body: None,
                })
        }))
    }

    fn store_deleted(&mut self, set: MessageSet) -> Result<(), SessionError> {
        let name = self.selected_writable();
        let (mut st, _) = self.enter(Op::Store)?;
        let name = name?;
        let mb = st
            .mailbox_mut(&name)
            .ok_or_else(|| SessionError::rejected("mailbox vanished"))?;
        for (i, m) in mb.messages.iter_mut().enumerate() {
            if in_set(set, i as u32 + 1, m) {
                m.deleted = true;
            }
        }
        Ok(())
    }

    fn expunge(&mut self) -> Result<(), SessionError> {
        let name = self.selected_writable();
        let (mut st, _) = self.enter(Op::Expunge)?;
        let name = name?;
        if let Some(mb) = st.mailbox_mut(&name) {
            mb.messages.retain(|m| !m.deleted);
        }
        Ok(())
    }

    fn uid_expunge(&mut self, uid: Uid) -> Result<(), SessionError> {
        let name = self.selected_writable();
        let (mut st, _) = self.enter(Op::UidExpunge)?;
        let name = name?;
        if st.no_uidplus {
            return Err(SessionError::rejected("Unknown command UID EXPUNGE"));
        }
        if let Some(mb) = st.mailbox_mut(&name) {
            mb.messages.retain(|m| !(m.deleted && m.uid == uid));
        }
        Ok(())
    }

    fn delete_mailbox(&mut self, mailbox: &str) -> Result<(), SessionError> {
        let (mut st, _) = self.enter(Op::Delete)?;
        let idx = st
            .mailboxes
            .iter()
            .position(|m| m.mailbox.name == mailbox)
            .ok_or_else(|| SessionError::rejected(format!("no such mailbox {}", mailbox)))?;
        let target = st.mailboxes[idx].mailbox.clone();
        if let Some(d) = &target.delimiter {
            let child_prefix = format!("{}{}", target.name, d);
            if st
                .mailboxes
                .iter()
                .any(|m| m.mailbox.name.starts_with(&child_prefix))
            {
                return Err(SessionError::rejected("mailbox has inferior hierarchical names"));
            }
        }
        st.mailboxes.remove(idx);
        drop(st);
        if self.selected.as_ref().map(|(n, _)| n.as_str()) == Some(mailbox) {
            self.selected = None;
        }
        Ok(())
    }

    fn move_messages(&mut self, set: MessageSet, destination: &str) -> Result<(), SessionError> {
        let name = self.selected_writable();
        let (mut st, _) = self.enter(Op::Move)?;
        let name = name?;
        if st.no_move {
            return Err(SessionError::rejected("Unknown command UID MOVE"));
        }
        if !st.mailboxes.iter().any(|m| m.mailbox.name == destination) {
            return Err(SessionError::rejected(format!("no such mailbox {}", destination)));
        }
        let src = st
            .mailbox_mut(&name)
            .ok_or_else(|| SessionError::rejected("mailbox vanished"))?;
        let mut moved = Vec::new();
        let mut seq = 0u32;
        src.messages.retain_mut(|m| {
            seq += 1;
            let hit = in_set(set, seq, m);
            if hit {
                moved.push(FakeMessage {
                    uid: 0,
                    subject: std::mem::take(&mut m.subject),
                    date: std::mem::take(&mut m.date),
                    raw: m.raw.take(),
                    deleted: false,
                });
            }
            !hit
        });
        st.mailbox_mut(destination)
            .ok_or_else(|| SessionError::rejected("destination vanished"))?
            .deliver(moved);
        Ok(())
    }

    fn copy_messages(&mut self, set: MessageSet, destination: &str) -> Result<(), SessionError> {
        let selected = self.selected.as_ref().map(|(n, _)| n.clone());
        let (mut st, _) = self.enter(Op::Copy)?;
        let name = selected.ok_or_else(|| SessionError::rejected("no mailbox selected"))?;
        let copies: Vec<FakeMessage> = st
            .mailbox_mut(&name)
            .ok_or_else(|| SessionError::rejected("mailbox vanished"))?
            .messages
            .iter()
            .enumerate()
            .filter(|(i, m)| in_set(set, *i as u32 + 1, m))
            .map(|(_, m)| FakeMessage {
                uid: 0,
                subject: m.subject.clone(),
                date: m.date.clone(),
                raw: m.raw.clone(),
                deleted: false,
            })
            .collect();
        st.mailbox_mut(destination)
            .ok_or_else(|| SessionError::rejected(format!("no such mailbox {}", destination)))?
            .deliver(copies);
        Ok(())
    }

    fn logout(&mut self) -> Result<(), SessionError> {
        if !self.alive {
            self.state.lock().unwrap().calls.push(Op::Logout);
            return Err(SessionError::session_invalid("already logged out"));
        }
        let res = self.enter(Op::Logout).map(|_| ());
        self.alive = false;
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_transient_failure_kills_the_session() {
        let server = FakeServer::new();
        server.add_mailbox("INBOX", Some("/"));
        server.fail_next(Op::Select, SessionError::session_invalid("Not logged in"));
        let mut s = server.session();

        assert_eq!(s.select("INBOX", true).unwrap_err().kind, ErrorKind::SessionInvalid);
        assert!(s.select("INBOX", true).is_err());
        assert_eq!(server.stale_calls(), 1);

        let mut fresh = server.connector().connect().unwrap();
        assert_eq!(fresh.select("INBOX", true).unwrap().exists, 0);
    }

    #[test]
    fn parent_with_children_cannot_be_deleted() {
        let server = FakeServer::new();
        server.add_mailbox("INBOX", Some("/"));
        server.add_mailbox("INBOX/Work", Some("/"));
        let mut s = server.session();

        assert_eq!(s.delete_mailbox("INBOX").unwrap_err().kind, ErrorKind::Rejected);
        s.delete_mailbox("INBOX/Work").unwrap();
        s.delete_mailbox("INBOX").unwrap();
        assert!(server.mailbox_names().is_empty());
    }
}
