//! Deleting a folder together with every folder beneath it.

use std::io::{self, Write};

use log::{info, warn};

use crate::domain::mailbox::MailboxRef;
use crate::domain::message::MessageSummary;
use crate::error::{SessionError, SetupError};
use crate::exec::{Mutation, Outcome};
use crate::mail::session::{FetchFields, MailSession, MessageSet};
use crate::scan::enumerate::EnumerateError;
use crate::scan::scanner::Scanner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderCandidate {
    pub mailbox: MailboxRef,
    pub messages: u32,
    /// Filled only when a detailed listing was requested.
    pub listing: Vec<MessageSummary>,
}

impl AsRef<MailboxRef> for FolderCandidate {
    fn as_ref(&self) -> &MailboxRef {
        &self.mailbox
    }
}

/// `prefix` and every mailbox below it, with message counts.
/// Mailboxes that cannot be selected are logged and left out.
pub fn find_deletion_candidates<S>(
    session: &mut S,
    prefix: &str,
    with_messages: bool,
    scanner: &Scanner,
) -> Result<Vec<FolderCandidate>, SetupError>
where
    S: MailSession + ?Sized,
{
    info!("Looking for mailboxes under: {}", prefix);
    let all = session.list_mailboxes()?;
    info!("Found {} mailboxes in total", all.len());

    let matching: Vec<MailboxRef> = all.into_iter().filter(|m| m.is_within(prefix)).collect();
    if matching.is_empty() {
        return Err(EnumerateError::NotFound(prefix.to_string()).into());
    }

    let mut out = Vec::new();
    for mailbox in matching {
        let status = match session.select(&mailbox.name, true) {
            Ok(s) => s,
            Err(e) => {
                warn!("Error selecting mailbox {}: {}", mailbox, e);
                continue;
            }
        };

        let mut listing = Vec::new();
        if with_messages && status.exists > 0 {
            let res = scanner.scan_mailbox(session, &mailbox, FetchFields::Envelope, |m| {
                listing.push(MessageSummary {
                    subject: m.subject.unwrap_or_default(),
                    date: m.date.unwrap_or_default(),
                })
            });
            if let Err(e) = res {
                warn!("Error getting messages for {}: {}", mailbox, e);
            }
        }

        info!("- {} ({} messages)", mailbox, status.exists);
        out.push(FolderCandidate {
            mailbox,
            messages: status.exists,
            listing,
        });
    }

    if out.is_empty() {
        return Err(EnumerateError::NotFound(prefix.to_string()).into());
    }
    info!("Found {} mailboxes to delete", out.len());
    Ok(out)
}

/// Empty a mailbox and delete it: select, flag everything deleted, expunge,
/// delete. Replays from the select after a reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxDeletion {
    pub mailbox: MailboxRef,
}

impl AsRef<MailboxRef> for MailboxDeletion {
    fn as_ref(&self) -> &MailboxRef {
        &self.mailbox
    }
}

impl From<FolderCandidate> for MailboxDeletion {
    fn from(c: FolderCandidate) -> Self {
        Self { mailbox: c.mailbox }
    }
}

impl Mutation for MailboxDeletion {
    fn describe(&self) -> String {
        format!("delete mailbox {}", self.mailbox)
    }

    fn apply<S: MailSession + ?Sized>(&self, session: &mut S) -> Result<Outcome, SessionError> {
        let status = session.select(&self.mailbox.name, false)?;
        if status.exists > 0 {
            info!("Marking {} messages for deletion", status.exists);
            session.store_deleted(MessageSet::AllOf(status.exists))?;
            session.expunge()?;
        }
        session.delete_mailbox(&self.mailbox.name)?;
        Ok(Outcome::Applied)
    }
}

pub fn write_candidates<W: Write>(out: &mut W, base: &str, candidates: &[FolderCandidate]) -> io::Result<()> {
    writeln!(out, "\n=== Folders to be deleted ===")?;
    writeln!(out, "Base folder: {}\n", base)?;
    let mut total = 0u64;
    for c in candidates {
        writeln!(out, "- {} ({} messages)", c.mailbox, c.messages)?;
        total += u64::from(c.messages);
    }
    writeln!(out, "\nTotal: {} folders, {} messages", candidates.len(), total)
}

pub fn write_details<W: Write>(out: &mut W, candidates: &[FolderCandidate]) -> io::Result<()> {
    writeln!(out, "\n=== Detailed Messages List ===")?;
    for c in candidates {
        writeln!(out, "\nFolder: {} ({} messages)", c.mailbox, c.messages)?;
        for (i, m) in c.listing.iter().enumerate() {
            writeln!(out, "{}) [{}] {}", i + 1, m.date, m.subject)?;
        }
        writeln!(out, "{}", "-".repeat(50))?;
    }
    Ok(())
}
