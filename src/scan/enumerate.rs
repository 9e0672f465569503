use log::{debug, info};
use thiserror::Error;

use crate::domain::mailbox::MailboxRef;

/// Folder names that are skipped by default, matched case-insensitively as
/// substrings.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "trash",
    "corbeille",
    "papierkorb",
    "papelera",
    "cestino",
    "deleted",
    "supprim",
    "spam",
    "junk",
    "indésirable",
    "bulk mail",
];

/// Well-known trash folder names, compared case-insensitively.
pub const TRASH_NAMES: &[&str] = &[
    "Trash",
    "Corbeille",
    "Deleted Items",
    "Deleted Messages",
    "Papierkorb",
    "[Gmail]/Trash",
    "[Gmail]/Corbeille",
    "[Google Mail]/Trash",
    "INBOX.Trash",
    "INBOX/Trash",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnumerateError {
    #[error("no mailboxes found matching: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Default)]
pub struct MailboxFilter {
    pub exclude: Vec<String>,
    pub prefix: Option<String>,
}

impl MailboxFilter {
    pub fn is_excluded(&self, mailbox: &MailboxRef) -> bool {
        let name = mailbox.name.to_lowercase();
        self.exclude
            .iter()
            .any(|pat| !pat.is_empty() && name.contains(&pat.to_lowercase()))
    }

    pub fn matches_prefix(&self, mailbox: &MailboxRef) -> bool {
        match &self.prefix {
            Some(p) => mailbox.name.starts_with(p.as_str()),
            None => true,
        }
    }
}

/// Apply the exclusion and prefix rules, keeping server order.
pub fn select_mailboxes(
    all: Vec<MailboxRef>,
    filter: &MailboxFilter,
) -> Result<Vec<MailboxRef>, EnumerateError> {
    let total = all.len();
    let kept: Vec<MailboxRef> = all
        .into_iter()
        .filter(|m| {
            if filter.is_excluded(m) {
                debug!("Excluding mailbox {}", m);
                return false;
            }
            filter.matches_prefix(m)
        })
        .collect();

    if let Some(prefix) = &filter.prefix
        && kept.is_empty()
    {
        return Err(EnumerateError::NotFound(prefix.clone()));
    }

    info!("Selected {} of {} mailboxes", kept.len(), total);
    Ok(kept)
}

/// Locate the trash folder: a configured name must exist verbatim, otherwise
/// the first well-known name present on the server wins.
pub fn find_trash<'a>(all: &'a [MailboxRef], configured: Option<&str>) -> Option<&'a MailboxRef> {
    if let Some(name) = configured {
        return all.iter().find(|m| m.name == name);
    }
    all.iter()
        .find(|m| TRASH_NAMES.iter().any(|t| m.name.eq_ignore_ascii_case(t)))
}
