//! Raw `.eml` backup of a mailbox hierarchy.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use crate::domain::mailbox::MailboxRef;
use crate::mail::session::{FetchFields, MailSession};
use crate::scan::scanner::Scanner;

const INVALID_PATH_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

pub fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if INVALID_PATH_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupStats {
    pub saved: u32,
    pub skipped: u32,
}

/// Writes one file per message under `root`. Directory creation and
/// file writes go through a single lock so concurrent writers never
/// interleave.
pub struct BackupWriter {
    root: PathBuf,
    lock: Mutex<()>,
}

impl BackupWriter {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("error creating directory {}", root.display()))?;
        info!("Using backup directory: {}", root.display());
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn mailbox_dir(&self, mailbox: &MailboxRef) -> PathBuf {
        let mut p = self.root.clone();
        for seg in mailbox.segments() {
            p.push(sanitize_segment(seg));
        }
        p
    }

    pub fn save(&self, dir: &Path, sequence: u32, raw: &[u8]) -> Result<PathBuf> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("backup writer lock poisoned"))?;

        fs::create_dir_all(dir)
            .with_context(|| format!("error creating directory {}", dir.display()))?;
        let stamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = dir.join(format!("{}_{}.eml", stamp, sequence));

        let mut f = fs::File::create(&path)
            .with_context(|| format!("error creating file {}", path.display()))?;
        f.write_all(raw)
            .with_context(|| format!("error writing message {}", path.display()))?;
        Ok(path)
    }

    pub fn backup_mailbox<S>(
        &self,
        session: &mut S,
        mailbox: &MailboxRef,
        scanner: &Scanner,
    ) -> Result<BackupStats>
    where
        S: MailSession + ?Sized,
    {
        info!("Processing mailbox: {}", mailbox);
        let dir = self.mailbox_dir(mailbox);
        let mut stats = BackupStats::default();

        scanner.scan_mailbox(session, mailbox, FetchFields::Full, |msg| {
            let Some(body) = msg.body else {
                warn!("Warning: no body for message {} in {}", msg.sequence, mailbox);
                stats.skipped += 1;
                return;
            };
            match self.save(&dir, msg.sequence, &body) {
                Ok(_) => stats.saved += 1,
                Err(e) => {
                    warn!("Error saving message {}: {:#}", msg.sequence, e);
                    stats.skipped += 1;
                }
            }
        })?;

        Ok(stats)
    }
}

/// Back up every mailbox in turn; a failing mailbox is logged and skipped.
pub fn run_backup<S>(
    session: &mut S,
    mailboxes: &[MailboxRef],
    writer: &BackupWriter,
    scanner: &Scanner,
) -> BackupStats
where
    S: MailSession + ?Sized,
{
    let mut total = BackupStats::default();
    for mailbox in mailboxes {
        match writer.backup_mailbox(session, mailbox, scanner) {
            Ok(stats) => {
                total.saved += stats.saved;
                total.skipped += stats.skipped;
            }
            Err(e) => warn!("Error backing up {}: {:#}", mailbox, e),
        }
    }
    info!("Backup completed: {} saved, {} skipped", total.saved, total.skipped);
    total
}
