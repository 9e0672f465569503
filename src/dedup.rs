//! The scan → fingerprint → group → plan pipeline.

use log::info;

use crate::domain::mailbox::MailboxRef;
use crate::domain::message::{ActionKind, FingerprintGroup};
use crate::error::SetupError;
use crate::fingerprint::Fingerprinter;
use crate::group::group_duplicates;
use crate::mail::session::MailSession;
use crate::plan::{DecisionProvider, Plan, build_plan};
use crate::scan::enumerate::{MailboxFilter, find_trash, select_mailboxes};
use crate::scan::scanner::{Scanner, scan_all};

#[derive(Debug, Clone)]
pub struct DedupOptions {
    pub filter: MailboxFilter,
    pub scanner: Scanner,
    pub fingerprinter: Fingerprinter,
    /// Delete duplicates instead of moving them to the trash folder.
    pub delete: bool,
    pub trash_folder: Option<String>,
}

/// What setup resolved: the mailboxes to scan and the action to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupTarget {
    pub mailboxes: Vec<MailboxRef>,
    pub kind: ActionKind,
}

/// List the server's folders, locate the trash when it is needed and apply
/// the mailbox filter. Every failure here is fatal for the run.
pub fn prepare<S>(session: &mut S, opts: &DedupOptions) -> Result<DedupTarget, SetupError>
where
    S: MailSession + ?Sized,
{
    let all = session.list_mailboxes()?;

    let trash = match find_trash(&all, opts.trash_folder.as_deref()) {
        Some(t) => Some(t.name.clone()),
        None if opts.delete => None,
        None => {
            return Err(match &opts.trash_folder {
                Some(name) => SetupError::TrashMissing(name.clone()),
                None => SetupError::TrashNotFound,
            });
        }
    };

    let kind = match (&trash, opts.delete) {
        (Some(t), false) => {
            info!("Using trash folder: {}", t);
            ActionKind::MoveToTrash { trash: t.clone() }
        }
        _ => ActionKind::Delete,
    };

    let mut mailboxes = select_mailboxes(all, &opts.filter)?;
    if let Some(t) = &trash {
        mailboxes.retain(|m| &m.name != t);
    }

    Ok(DedupTarget { mailboxes, kind })
}

pub fn find_duplicates<S>(session: &mut S, mailboxes: &[MailboxRef], opts: &DedupOptions) -> Vec<FingerprintGroup>
where
    S: MailSession + ?Sized,
{
    let records = scan_all(session, mailboxes, &opts.scanner, &opts.fingerprinter);
    info!("Fingerprinted {} messages", records.len());
    let groups = group_duplicates(records);
    info!("Found {} groups of duplicates", groups.len());
    groups
}

/// Scan, group and decide. Nothing is mutated; the returned plan is
/// complete before any action runs.
pub fn plan_duplicates<S, P>(
    session: &mut S,
    target: &DedupTarget,
    opts: &DedupOptions,
    provider: &mut P,
) -> Plan
where
    S: MailSession + ?Sized,
    P: DecisionProvider + ?Sized,
{
    let groups = find_duplicates(session, &target.mailboxes, opts);
    build_plan(&groups, provider, &target.kind)
}
