//! Turning duplicate groups into a plan of actions.
//!
//! A [`DecisionProvider`] picks the survivor of each group; [`build_plan`]
//! turns every other member into a [`PlannedAction`]. The whole plan exists
//! before anything is executed.

use std::io::{self, BufRead, Write};

use log::{info, warn};
use serde::Serialize;

use crate::domain::message::{ActionKind, FingerprintGroup, PlannedAction};
use crate::prompt::read_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep the member at this index, act on the rest.
    Keep(usize),
    Skip,
    /// Stop looking at groups; execute what was decided so far.
    JumpToSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPosition {
    pub index: usize,
    pub total: usize,
}

pub trait DecisionProvider {
    fn present_group(&mut self, position: GroupPosition, group: &FingerprintGroup) -> Decision;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Manual,
    Automatic,
    DryRun,
}

impl Policy {
    pub fn from_flags(dry_run: bool, automatic: bool) -> Self {
        if dry_run {
            Policy::DryRun
        } else if automatic {
            Policy::Automatic
        } else {
            Policy::Manual
        }
    }

    pub fn executes(self) -> bool {
        self != Policy::DryRun
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub actions: Vec<PlannedAction>,
    pub resolved_groups: usize,
    pub skipped_groups: usize,
    pub stopped_early: bool,
}

pub fn build_plan<P>(groups: &[FingerprintGroup], provider: &mut P, kind: &ActionKind) -> Plan
where
    P: DecisionProvider + ?Sized,
{
    let mut plan = Plan {
        actions: Vec::new(),
        resolved_groups: 0,
        skipped_groups: 0,
        stopped_early: false,
    };

    let total = groups.len();
    for (index, group) in groups.iter().enumerate() {
        let decision = provider.present_group(GroupPosition { index, total }, group);
        let keep = match decision {
            Decision::Keep(i) if i < group.members.len() => i,
            Decision::Keep(i) => {
                warn!("Keep index {} out of range for group {}; skipping", i, group.fingerprint);
                plan.skipped_groups += 1;
                continue;
            }
            Decision::Skip => {
                plan.skipped_groups += 1;
                continue;
            }
            Decision::JumpToSummary => {
                info!("Stopping at group {}/{}", index + 1, total);
                plan.stopped_early = true;
                break;
            }
        };

        plan.resolved_groups += 1;
        plan.actions.extend(
            group
                .members
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != keep)
                .map(|(_, record)| PlannedAction {
                    record: record.clone(),
                    kind: kind.clone(),
                }),
        );
    }

    plan
}

pub fn write_group<W: Write>(out: &mut W, position: GroupPosition, group: &FingerprintGroup) -> io::Result<()> {
    let Some(first) = group.members.first() else {
        return Ok(());
    };
    writeln!(out, "\nProcessing group {}/{}", position.index + 1, position.total)?;
    writeln!(out, "\n=== Duplicate Group ===")?;
    writeln!(out, "Subject: {}", first.subject)?;
    writeln!(out, "Date: {}", first.date)?;
    writeln!(out, "Found {} copies:\n", group.members.len())?;
    for (i, m) in group.members.iter().enumerate() {
        writeln!(
            out,
            "{}) [{}] {} ({} KB) - {}",
            i + 1,
            m.mailbox,
            m.subject,
            m.size / 1024,
            m.date
        )?;
    }
    if let Some(preview) = &first.preview {
        writeln!(out, "\nPreview: {}", preview)?;
    }
    Ok(())
}

// Only the verb changes case; folder names are printed as the server spells them.
fn describe_kind(kind: &ActionKind, dry_run: bool) -> String {
    let (delete, move_to) = if dry_run { ("delete", "move to") } else { ("Delete", "Move to") };
    match kind {
        ActionKind::Delete => delete.to_string(),
        ActionKind::MoveToTrash { trash } => format!("{} {}", move_to, trash),
    }
}

/// Print every planned action. Dry runs use "Would ..." wording.
pub fn write_summary<W: Write>(out: &mut W, plan: &Plan, dry_run: bool) -> io::Result<()> {
    if dry_run {
        writeln!(out, "\n=== Dry Run Summary ===")?;
    } else {
        writeln!(out, "\n=== Summary of Actions ===")?;
    }
    writeln!(
        out,
        "Groups resolved: {}, skipped: {}{}",
        plan.resolved_groups,
        plan.skipped_groups,
        if plan.stopped_early { " (stopped early)" } else { "" }
    )?;
    writeln!(out, "Messages to act on: {}\n", plan.actions.len())?;
    for (i, a) in plan.actions.iter().enumerate() {
        let verb = describe_kind(&a.kind, dry_run);
        if dry_run {
            writeln!(
                out,
                "Would {}: [{}] UID {} {} ({})",
                verb,
                a.record.mailbox,
                a.record.uid,
                a.record.subject,
                a.record.date
            )?;
        } else {
            writeln!(
                out,
                "{}) {}: [{}] UID {} {} ({})",
                i + 1,
                verb,
                a.record.mailbox,
                a.record.uid,
                a.record.subject,
                a.record.date
            )?;
        }
    }
    Ok(())
}

/// Automatic policy: always keep the first copy. With an echo writer the
/// groups are printed as they are decided (used for dry runs).
pub struct KeepFirst<W: Write> {
    echo: Option<W>,
}

impl KeepFirst<io::Sink> {
    pub fn silent() -> Self {
        Self { echo: None }
    }
}

impl<W: Write> KeepFirst<W> {
    pub fn echo(out: W) -> Self {
        Self { echo: Some(out) }
    }
}

impl<W: Write> DecisionProvider for KeepFirst<W> {
    fn present_group(&mut self, position: GroupPosition, group: &FingerprintGroup) -> Decision {
        if let Some(out) = self.echo.as_mut()
            && let Err(e) = write_group(out, position, group)
        {
            warn!("could not print group: {}", e);
        }
        Decision::Keep(0)
    }
}

/// Manual policy: show the group and read the choice from a line of input.
pub struct PromptProvider<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptProvider<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, position: GroupPosition, group: &FingerprintGroup) -> io::Result<Decision> {
        write_group(&mut self.output, position, group)?;
        write!(
            self.output,
            "\nEnter number to keep (1-{}), 's' to skip, or 'q' to go to the summary: ",
            group.members.len()
        )?;
        self.output.flush()?;

        let Some(line) = read_line(&mut self.input)? else {
            return Ok(Decision::JumpToSummary);
        };
        let decision = parse_choice(&line, group.members.len());
        if decision == Decision::Skip && !line.eq_ignore_ascii_case("s") {
            writeln!(self.output, "Invalid choice {:?}; skipping this group", line)?;
        } else if decision == Decision::Skip {
            writeln!(self.output, "Skipping this group")?;
        }
        Ok(decision)
    }
}

impl<R: BufRead, W: Write> DecisionProvider for PromptProvider<R, W> {
    fn present_group(&mut self, position: GroupPosition, group: &FingerprintGroup) -> Decision {
        match self.ask(position, group) {
            Ok(d) => d,
            Err(e) => {
                warn!("prompt failed: {}; going to summary", e);
                Decision::JumpToSummary
            }
        }
    }
}

/// Interpret one line of prompt input for a group of `len` members.
pub fn parse_choice(line: &str, len: usize) -> Decision {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") {
        return Decision::JumpToSummary;
    }
    match line.parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Decision::Keep(n - 1),
        _ => Decision::Skip,
    }
}
