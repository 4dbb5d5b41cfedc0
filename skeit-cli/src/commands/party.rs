//! `skeit party <op>`: one subcommand per lifecycle operation.

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use skeit_core::{BranchName, PartyName, PendingOp};
use skeit_party::{
    AbortOutcome, AddOutcome, ContinueOutcome, Party, PartyStatus, SyncReport,
};

/// Manage the active party of the current repository.
#[derive(Subcommand, Debug)]
pub enum PartyCommand {
    /// Start a party over the current branch plus the given branches.
    Start(StartArgs),

    /// Add a branch to the active party and sync.
    Add {
        /// Branch to merge into the view.
        branch: String,
    },

    /// Make a member the default branch that new work is replayed onto.
    Default {
        branch: String,
    },

    /// Move a commit made on the party branch onto one member branch.
    Move {
        /// Commit id or any revision naming it.
        commit: String,
        /// Default or member branch to receive it.
        branch: String,
    },

    /// Replay new commits onto the default branch and rebuild the view.
    Sync,

    /// Show branches, commit counts and unsynced work.
    Status(StatusArgs),

    /// Sync a last time, return to the default branch and drop the party.
    Finish,

    /// Resume an operation stopped by conflicts, once they are resolved.
    Continue,

    /// Abandon an operation stopped by conflicts.
    Abort,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Party name; the view is checked out as `party/<name>`.
    pub name: String,

    /// Member branches, merged in this order after the current branch.
    pub branches: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: PartyCommand) -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    tracing::debug!("opening repository at {}", cwd.display());
    let party = Party::open(&cwd)?;

    match cmd {
        PartyCommand::Start(args) => start(&party, args),
        PartyCommand::Add { branch } => add(&party, branch),
        PartyCommand::Default { branch } => set_default(&party, branch),
        PartyCommand::Move { commit, branch } => move_commit(&party, &commit, branch),
        PartyCommand::Sync => {
            let report = party.sync()?;
            print_sync(&report);
            Ok(())
        }
        PartyCommand::Status(args) => status(&party, args),
        PartyCommand::Finish => finish(&party),
        PartyCommand::Continue => resume(&party),
        PartyCommand::Abort => abort(&party),
    }
}

fn start(party: &Party, args: StartArgs) -> Result<()> {
    let members: Vec<BranchName> = args.branches.into_iter().map(BranchName::from).collect();
    let report = party.start(&PartyName::from(args.name), &members)?;
    println!(
        "✓ Started party '{}' on {}",
        report.name,
        report.branch.to_string().bold()
    );
    println!("  default: {}", report.record.default_branch);
    if !report.record.members.is_empty() {
        println!("  members: {}", join(&report.record.members));
    }
    Ok(())
}

fn add(party: &Party, branch: String) -> Result<()> {
    let branch = BranchName::from(branch);
    match party.add(&branch)? {
        AddOutcome::Added(report) => {
            println!("✓ Added '{branch}'");
            print_sync(&report);
        }
        AddOutcome::AlreadyMember => println!("'{branch}' is already part of the party"),
    }
    Ok(())
}

fn set_default(party: &Party, branch: String) -> Result<()> {
    let record = party.set_default(&BranchName::from(branch))?;
    println!("✓ Default branch is now '{}'", record.default_branch);
    println!("  merge order: {}", join(&record.merge_order()));
    println!("Run 'skeit party sync' to rebuild the view.");
    Ok(())
}

fn move_commit(party: &Party, commit: &str, branch: String) -> Result<()> {
    let report = party.move_commit(commit, &BranchName::from(branch))?;
    println!("✓ Moved {} onto '{}'", report.commit.short(), report.target);
    print_sync(&report.sync);
    Ok(())
}

fn finish(party: &Party) -> Result<()> {
    let report = party.finish()?;
    print_sync(&report.sync);
    println!(
        "✓ Finished party '{}'; back on '{}'",
        report.name, report.default_branch
    );
    Ok(())
}

fn resume(party: &Party) -> Result<()> {
    match party.continue_pending()? {
        ContinueOutcome::NothingPending => println!("Nothing to continue."),
        ContinueOutcome::Resumed { op, sync } => {
            println!("✓ Continued {op}");
            print_sync(&sync);
        }
    }
    Ok(())
}

fn abort(party: &Party) -> Result<()> {
    match party.abort_pending()? {
        AbortOutcome::NothingPending => println!("Nothing to abort."),
        AbortOutcome::Aborted(op) => println!("✓ Aborted {op}"),
    }
    Ok(())
}

fn print_sync(report: &SyncReport) {
    for commit in &report.replayed {
        println!("  {} {}", commit.id.short().green(), commit.summary);
    }
    for commit in &report.skipped {
        println!(
            "  {} {} {}",
            commit.id.short().bright_black(),
            commit.summary,
            "(already applied)".bright_black()
        );
    }
    println!(
        "✓ Synced party '{}': {} replayed, view at {}",
        report.party,
        report.replayed.len(),
        report.view.short()
    );
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StatusJson {
    party: String,
    branch: String,
    default_branch: String,
    branches: Vec<BranchJson>,
    unique: Vec<CommitJson>,
    pending: Option<PendingOp>,
    worktree: Option<String>,
}

#[derive(Serialize)]
struct BranchJson {
    branch: String,
    default: bool,
    commits: usize,
}

#[derive(Serialize)]
struct CommitJson {
    id: String,
    committed_at: String,
    summary: String,
}

#[derive(Tabled)]
struct BranchRow {
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "role")]
    role: &'static str,
    #[tabled(rename = "commits")]
    commits: usize,
}

fn status(party: &Party, args: StatusArgs) -> Result<()> {
    let status = party.status()?;
    if args.json {
        return print_json(status);
    }
    print_table(&status);
    Ok(())
}

fn print_json(status: PartyStatus) -> Result<()> {
    let payload = StatusJson {
        party: status.name.0,
        branch: status.branch.0,
        default_branch: status.default_branch.0,
        branches: status
            .branches
            .into_iter()
            .map(|b| BranchJson {
                branch: b.branch.0,
                default: b.is_default,
                commits: b.commits,
            })
            .collect(),
        unique: status
            .unique
            .into_iter()
            .map(|c| CommitJson {
                id: c.id.0,
                committed_at: c.committed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                summary: c.summary,
            })
            .collect(),
        pending: status.pending,
        worktree: status.worktree.map(|p| p.display().to_string()),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(status: &PartyStatus) {
    println!(
        "Party {} on {} | {} unique commit(s)",
        status.name.to_string().bold(),
        status.branch,
        status.unique.len(),
    );

    let rows: Vec<BranchRow> = status
        .branches
        .iter()
        .map(|b| BranchRow {
            branch: b.branch.0.clone(),
            role: if b.is_default { "default" } else { "member" },
            commits: b.commits,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if !status.unique.is_empty() {
        println!("{}", "Unique commits:".bold());
        for commit in &status.unique {
            println!("  {} {}", commit.id.short().yellow(), commit.summary);
        }
    }
    if let Some(op) = &status.pending {
        println!("{} {op}", "Paused:".red().bold());
        if let Some(worktree) = &status.worktree {
            println!("  resolve in {}", worktree.display());
        }
        println!("Run 'skeit party continue' or 'skeit party abort'.");
    } else if !status.unique.is_empty() {
        println!("Run 'skeit party sync' to replay them onto '{}'.", status.default_branch);
    }
}

fn join(branches: &[BranchName]) -> String {
    branches
        .iter()
        .map(BranchName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
