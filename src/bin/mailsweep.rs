use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use mailsweep::backup::{BackupWriter, run_backup};
use mailsweep::config::{Config, load_config};
use mailsweep::credentials;
use mailsweep::dedup::{DedupOptions, plan_duplicates, prepare};
use mailsweep::exec::{Executor, RetryPolicy, write_report};
use mailsweep::fingerprint::{Fingerprinter, Strategy};
use mailsweep::folders::{MailboxDeletion, find_deletion_candidates, write_candidates, write_details};
use mailsweep::mail::imap_client::{ImapClient, ImapSession};
use mailsweep::mail::session::{Connector, MailSession};
use mailsweep::order::deepest_first;
use mailsweep::plan::{KeepFirst, Policy, PromptProvider, write_summary};
use mailsweep::prompt::confirm;
use mailsweep::scan::enumerate::{MailboxFilter, select_mailboxes};
use mailsweep::scan::scanner::Scanner;

#[derive(Parser)]
#[command(name = "mailsweep")]
#[command(about = "Find and remove duplicate messages across IMAP folders", long_about = None)]
struct Cli {
    /// Read this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find duplicate messages and delete or move them to the trash
    Dedup {
        /// Report what would be done without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Keep the first copy of every group without asking
        #[arg(long)]
        auto: bool,

        /// Only scan folders whose name starts with this prefix
        #[arg(long)]
        folder: Option<String>,

        /// Delete duplicates instead of moving them to the trash folder
        #[arg(long)]
        delete: bool,

        #[arg(long, value_enum)]
        strategy: Option<Strategy>,

        #[arg(long)]
        batch_size: Option<u32>,

        /// Write the plan as JSON to this file
        #[arg(long)]
        plan_out: Option<PathBuf>,
    },

    /// Delete a folder, its subfolders and every message in them
    DeleteFolder {
        /// Exact folder name; `Projects` takes `Projects/Old` but not `ProjectsArchive`
        prefix: String,

        #[arg(long)]
        dry_run: bool,

        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Save every message as an .eml file
    Backup {
        #[arg(long)]
        dir: Option<PathBuf>,

        #[arg(long)]
        folder: Option<String>,
    },

    /// Store the IMAP password in the keyring
    SetPassword {
        #[arg(long)]
        user: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    ctrlc::set_handler(|| {
        eprintln!("\nOperation cancelled by user");
        std::process::exit(130);
    })?;

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetPassword { user } => {
            eprintln!("Paste password (end with Ctrl-D):");
            let mut password = String::new();
            io::stdin().read_to_string(&mut password)?;
            credentials::store_password(&user, password.trim())?;
            println!("Saved password for {}", user);
            Ok(())
        }

        Command::Dedup {
            dry_run,
            auto,
            folder,
            delete,
            strategy,
            batch_size,
            plan_out,
        } => {
            let cfg = config(cli.config.as_deref())?;
            let opts = DedupOptions {
                filter: MailboxFilter {
                    exclude: cfg.exclude.clone(),
                    prefix: folder,
                },
                scanner: Scanner::new(batch_size.unwrap_or(cfg.batch_size)),
                fingerprinter: Fingerprinter::new(strategy.unwrap_or(cfg.strategy)),
                delete,
                trash_folder: cfg.trash_folder.clone(),
            };
            run_dedup(&cfg, &opts, Policy::from_flags(dry_run, auto), plan_out.as_deref())
        }

        Command::DeleteFolder { prefix, dry_run, yes } => {
            let cfg = config(cli.config.as_deref())?;
            run_delete_folder(&cfg, &prefix, dry_run, yes)
        }

        Command::Backup { dir, folder } => {
            let cfg = config(cli.config.as_deref())?;
            let dir = dir.unwrap_or_else(|| PathBuf::from(&cfg.backup_dir));
            run_backup_command(&cfg, &dir, folder)
        }
    }
}

fn config(path: Option<&Path>) -> Result<Config> {
    load_config(path).map_err(|e| anyhow!("Configuration error: {e:#}"))
}

fn connect(cfg: &Config) -> Result<(ImapClient, ImapSession)> {
    let user = cfg.user()?;
    let password = credentials::password_for(user)?;
    let client = ImapClient::new(cfg.host()?, cfg.port, user, password);
    let session = client
        .connect()
        .with_context(|| format!("could not log in to {}", client.server))?;
    Ok((client, session))
}

fn logout<S: MailSession>(session: &mut S) {
    if let Err(e) = session.logout() {
        warn!("Logout failed: {}", e);
    }
}

fn run_dedup(cfg: &Config, opts: &DedupOptions, policy: Policy, plan_out: Option<&Path>) -> Result<()> {
    let (client, mut session) = connect(cfg)?;
    let target = prepare(&mut session, opts)?;

    let plan = match policy {
        Policy::Manual => {
            let mut provider = PromptProvider::new(io::stdin().lock(), io::stdout().lock());
            plan_duplicates(&mut session, &target, opts, &mut provider)
        }
        Policy::Automatic => plan_duplicates(&mut session, &target, opts, &mut KeepFirst::silent()),
        Policy::DryRun => {
            let mut provider = KeepFirst::echo(io::stdout().lock());
            plan_duplicates(&mut session, &target, opts, &mut provider)
        }
    };

    let mut out = io::stdout().lock();
    if let Some(path) = plan_out {
        let json = serde_json::to_string_pretty(&plan)?;
        fs::write(path, json).with_context(|| format!("writing plan to {}", path.display()))?;
        info!("Plan written to {}", path.display());
    }

    if plan.actions.is_empty() {
        writeln!(out, "\nNo actions to perform")?;
        logout(&mut session);
        return Ok(());
    }

    write_summary(&mut out, &plan, !policy.executes())?;

    if !policy.executes() {
        writeln!(out, "\nDry run - no changes made")?;
        logout(&mut session);
        return Ok(());
    }

    if policy == Policy::Manual && !confirm(&mut io::stdin().lock(), &mut out, "Proceed with these actions?")? {
        writeln!(out, "Operation cancelled")?;
        logout(&mut session);
        return Ok(());
    }

    let mut executor = Executor::new(client, session, RetryPolicy::from(&cfg.retry));
    let report = executor.run(&plan.actions);
    write_report(&mut out, &report)?;

    if let Some(mut session) = executor.into_session() {
        logout(&mut session);
    }
    Ok(())
}

fn run_delete_folder(cfg: &Config, prefix: &str, dry_run: bool, yes: bool) -> Result<()> {
    let (client, mut session) = connect(cfg)?;
    let scanner = Scanner::new(cfg.batch_size);
    let mut input = io::stdin().lock();
    let mut out = io::stdout().lock();

    let candidates = find_deletion_candidates(&mut session, prefix, false, &scanner)?;
    write_candidates(&mut out, prefix, &candidates)?;

    if dry_run {
        if confirm(&mut input, &mut out, "Show the messages in each folder?")? {
            let detailed = find_deletion_candidates(&mut session, prefix, true, &scanner)?;
            write_details(&mut out, &detailed)?;
        }
        writeln!(out, "\nDry run - no changes made")?;
        logout(&mut session);
        return Ok(());
    }

    let question = format!(
        "Delete these {} folders and all their messages? This cannot be undone",
        candidates.len()
    );
    if !yes && !confirm(&mut input, &mut out, &question)? {
        writeln!(out, "Operation cancelled")?;
        logout(&mut session);
        return Ok(());
    }

    let ordered: Vec<MailboxDeletion> = deepest_first(candidates).into_iter().map(Into::into).collect();
    let mut executor = Executor::new(client, session, RetryPolicy::from(&cfg.retry));
    let report = executor.run(&ordered);
    write_report(&mut out, &report)?;

    if let Some(mut session) = executor.into_session() {
        logout(&mut session);
    }
    Ok(())
}

fn run_backup_command(cfg: &Config, dir: &Path, folder: Option<String>) -> Result<()> {
    let (_client, mut session) = connect(cfg)?;
    let filter = MailboxFilter {
        exclude: Vec::new(),
        prefix: folder,
    };
    let mailboxes = select_mailboxes(session.list_mailboxes()?, &filter)?;

    let writer = BackupWriter::new(dir)?;
    let stats = run_backup(&mut session, &mailboxes, &writer, &Scanner::new(cfg.batch_size));
    println!(
        "Backup completed in {}: {} messages saved, {} skipped",
        dir.display(),
        stats.saved,
        stats.skipped
    );

    logout(&mut session);
    Ok(())
}
