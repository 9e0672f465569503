//! Batched mailbox scanning.
//!
//! Each window of sequence numbers is fetched by a producer thread that
//! pushes messages into a bounded channel while this thread consumes them.
//! The producer's result is only inspected after the channel is drained,
//! because a fetch can fail after its last message was delivered.

use std::sync::mpsc::sync_channel;
use std::thread;

use log::{debug, info, warn};

use crate::domain::mailbox::MailboxRef;
use crate::domain::message::{FetchedMessage, MessageRecord};
use crate::error::{ErrorKind, SessionError};
use crate::fingerprint::Fingerprinter;
use crate::mail::decoders::extract_preview;
use crate::mail::session::{FetchFields, MailSession};

pub const DEFAULT_BATCH_SIZE: u32 = 100;
const CHANNEL_CAPACITY: usize = 10;
const PREVIEW_CHARS: usize = 140;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub exists: u32,
    pub delivered: u32,
    pub batches: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    batch_size: u32,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

/// Contiguous `[from, to]` windows covering `1..=total`.
pub fn windows(total: u32, batch_size: u32) -> Vec<(u32, u32)> {
    let batch = batch_size.max(1);
    let mut out = Vec::new();
    let mut from = 1u32;
    while from <= total {
        let to = from.saturating_add(batch - 1).min(total);
        out.push((from, to));
        if to == total {
            break;
        }
        from = to + 1;
    }
    out
}

impl Scanner {
    pub fn new(batch_size: u32) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Select `mailbox` read-only and hand every fetched message to `visit`,
    /// in delivery order.
    pub fn scan_mailbox<S, F>(
        &self,
        session: &mut S,
        mailbox: &MailboxRef,
        fields: FetchFields,
        mut visit: F,
    ) -> Result<ScanStats, SessionError>
    where
        S: MailSession + ?Sized,
        F: FnMut(FetchedMessage),
    {
        let status = session.select(&mailbox.name, true)?;
        let mut stats = ScanStats {
            exists: status.exists,
            ..ScanStats::default()
        };
        if status.exists == 0 {
            debug!("Empty folder: {}", mailbox);
            return Ok(stats);
        }

        info!("Found {} messages in {}", status.exists, mailbox);
        for (from, to) in windows(status.exists, self.batch_size) {
            let (tx, rx) = sync_channel::<FetchedMessage>(CHANNEL_CAPACITY);
            let producer_session = &mut *session;

            let fetched = thread::scope(|scope| {
                let producer = scope.spawn(move || producer_session.fetch_range(from, to, fields, &tx));

                for msg in rx.iter() {
                    stats.delivered += 1;
                    visit(msg);
                }

                producer
                    .join()
                    .unwrap_or_else(|_| Err(SessionError::new(ErrorKind::Protocol, "fetch thread panicked")))
            });

            stats.batches += 1;
            fetched.map_err(|e| {
                SessionError::new(e.kind, format!("fetching {}:{} of {}: {}", from, to, mailbox, e.message))
            })?;
            debug!("Progress: {}/{} in {}", to, status.exists, mailbox);
        }

        Ok(stats)
    }

    /// Scan one mailbox into fingerprinted records. Messages without a body,
    /// without a UID, or that cannot be fingerprinted are logged and skipped.
    pub fn collect_records<S>(
        &self,
        session: &mut S,
        mailbox: &MailboxRef,
        fingerprinter: &Fingerprinter,
    ) -> Result<Vec<MessageRecord>, SessionError>
    where
        S: MailSession + ?Sized,
    {
        let mut records = Vec::new();
        self.scan_mailbox(session, mailbox, FetchFields::Full, |msg| {
            if let Some(record) = to_record(mailbox, msg, fingerprinter) {
                records.push(record);
            }
        })?;
        Ok(records)
    }
}

fn to_record(
    mailbox: &MailboxRef,
    msg: FetchedMessage,
    fingerprinter: &Fingerprinter,
) -> Option<MessageRecord> {
    let subject = msg.subject.unwrap_or_default();
    let Some(body) = msg.body else {
        warn!("Warning: no body for message {} in {}", msg.sequence, mailbox);
        return None;
    };
    let Some(uid) = msg.uid else {
        warn!(
            "Skipping message {} in {} ({:?}): server sent no UID",
            msg.sequence, mailbox, subject
        );
        return None;
    };
    let fingerprint = match fingerprinter.fingerprint(&body) {
        Ok(fp) => fp,
        Err(e) => {
            warn!(
                "Skipping message UID {} in {} ({:?}): {}",
                uid, mailbox, subject, e
            );
            return None;
        }
    };

    Some(MessageRecord {
        mailbox: mailbox.clone(),
        sequence: msg.sequence,
        uid,
        subject,
        date: msg.date.unwrap_or_default(),
        size: msg.size.unwrap_or(body.len() as u32),
        preview: extract_preview(&body, PREVIEW_CHARS),
        fingerprint,
    })
}

/// Scan every mailbox in turn. A mailbox that fails to select or fetch is
/// logged and contributes nothing; the others are still scanned.
pub fn scan_all<S>(
    session: &mut S,
    mailboxes: &[MailboxRef],
    scanner: &Scanner,
    fingerprinter: &Fingerprinter,
) -> Vec<MessageRecord>
where
    S: MailSession + ?Sized,
{
    let mut all = Vec::new();
    for mailbox in mailboxes {
        info!("Scanning mailbox: {}", mailbox);
        match scanner.collect_records(session, mailbox, fingerprinter) {
            Ok(mut records) => {
                info!("Processed {} messages in {}", records.len(), mailbox);
                all.append(&mut records);
            }
            Err(e) => warn!("Error scanning {}: {}", mailbox, e),
        }
    }
    all
}
