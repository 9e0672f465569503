//! Sequential plan execution with reconnect-and-retry on stale sessions.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::domain::message::{ActionKind, PlannedAction, Uid};
use crate::error::SessionError;
use crate::mail::session::{Connector, Extensions, MailSession, MessageSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The target no longer needed the action (already moved or deleted).
    AlreadyGone,
}

/// One unit of remote mutation. `apply` always starts from its first step
/// (selecting the mailbox) so it can be replayed on a fresh session.
pub trait Mutation {
    fn describe(&self) -> String;

    fn apply<S: MailSession + ?Sized>(&self, session: &mut S) -> Result<Outcome, SessionError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Reconnect-and-retry rounds after the first attempt.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abandoned {
    pub description: String,
    pub error: SessionError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub applied: usize,
    pub already_gone: usize,
    pub abandoned: Vec<Abandoned>,
}

/// Final tally, listing every abandoned action so it can be reconciled by hand.
pub fn write_report<W: Write>(out: &mut W, report: &ExecutionReport) -> io::Result<()> {
    writeln!(out, "\n=== Results ===")?;
    writeln!(
        out,
        "Applied: {}, already gone: {}, failed: {}",
        report.applied,
        report.already_gone,
        report.abandoned.len()
    )?;
    for a in &report.abandoned {
        writeln!(out, "FAILED {}: {}", a.description, a.error)?;
    }
    Ok(())
}

pub struct Executor<C: Connector> {
    connector: C,
    session: Option<C::Session>,
    policy: RetryPolicy,
}

impl<C: Connector> Executor<C> {
    pub fn new(connector: C, session: C::Session, policy: RetryPolicy) -> Self {
        Self {
            connector,
            session: Some(session),
            policy,
        }
    }

    /// The live session, if the last reconnect succeeded.
    pub fn into_session(self) -> Option<C::Session> {
        self.session
    }

    pub fn run<M: Mutation>(&mut self, actions: &[M]) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let total = actions.len();

        for (i, action) in actions.iter().enumerate() {
            let description = action.describe();
            info!("Progress: {}/{} - {}", i + 1, total, description);

            match self.execute_one(action) {
                Ok(Outcome::Applied) => report.applied += 1,
                Ok(Outcome::AlreadyGone) => {
                    info!("Nothing to do for {}: already gone", description);
                    report.already_gone += 1;
                }
                Err(e) => {
                    error!("Abandoned {}: {}", description, e);
                    report.abandoned.push(Abandoned {
                        description,
                        error: e,
                    });
                }
            }
        }

        report
    }

    fn execute_one<M: Mutation>(&mut self, action: &M) -> Result<Outcome, SessionError> {
        if self.session.is_none() {
            self.reconnect();
        }

        let mut retries = 0;
        loop {
            let result = match self.session.as_mut() {
                Some(session) => action.apply(session),
                None => Err(SessionError::session_invalid("no active session")),
            };

            match result {
                Err(e) if e.is_transient() && retries < self.policy.max_retries => {
                    retries += 1;
                    warn!(
                        "Retry attempt {} for {} after: {}",
                        retries,
                        action.describe(),
                        e
                    );
                    self.reconnect();
                }
                Err(e) if e.is_transient() => {
                    // never hand a known-stale session to the next action
                    self.discard_session();
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    fn discard_session(&mut self) {
        if let Some(mut stale) = self.session.take()
            && let Err(e) = stale.logout()
        {
            info!("Logout of stale session failed: {}", e);
        }
    }

    /// Drop the stale session and try to open a new one. On failure the
    /// executor is left without a session and the next attempt fails fast.
    fn reconnect(&mut self) {
        self.discard_session();
        thread::sleep(self.policy.backoff);

        match self.connector.connect() {
            Ok(session) => {
                info!("Reconnected successfully");
                self.session = Some(session);
            }
            Err(e) => warn!("Reconnection failed: {}", e),
        }
    }
}

// A plain EXPUNGE would also remove messages flagged by someone else.
fn require_uidplus(ext: Extensions) -> Result<(), SessionError> {
    if ext.uidplus {
        Ok(())
    } else {
        Err(SessionError::rejected(
            "server lacks UIDPLUS; refusing to expunge the whole mailbox",
        ))
    }
}

fn expunge_uid<S: MailSession + ?Sized>(session: &mut S, uid: Uid) -> Result<(), SessionError> {
    session.store_deleted(MessageSet::Uid(uid))?;
    session.uid_expunge(uid)
}

impl Mutation for PlannedAction {
    fn describe(&self) -> String {
        let verb = match &self.kind {
            ActionKind::Delete => "delete".to_string(),
            ActionKind::MoveToTrash { trash } => format!("move to {}", trash),
        };
        format!(
            "{} [{}] UID {} {:?}",
            verb, self.record.mailbox, self.record.uid, self.record.subject
        )
    }

    fn apply<S: MailSession + ?Sized>(&self, session: &mut S) -> Result<Outcome, SessionError> {
        session.select(&self.record.mailbox.name, false)?;

        // sequence numbers do not survive a reconnect; re-check by UID
        if session.fetch_uid(self.record.uid)?.is_none() {
            return Ok(Outcome::AlreadyGone);
        }

        let uid = self.record.uid;
        let target = MessageSet::Uid(uid);
        let ext = session.extensions()?;
        match &self.kind {
            ActionKind::MoveToTrash { trash } if ext.moves => session.move_messages(target, trash)?,
            ActionKind::MoveToTrash { trash } => {
                require_uidplus(ext)?;
                session.copy_messages(target, trash)?;
                expunge_uid(session, uid)?;
            }
            ActionKind::Delete => {
                require_uidplus(ext)?;
                expunge_uid(session, uid)?;
            }
        }
        Ok(Outcome::Applied)
    }
}
