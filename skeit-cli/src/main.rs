//! skeit: merged views over several git branches.
//!
//! # Usage
//!
//! ```text
//! skeit party start <name> [branch...]
//! skeit party add <branch>
//! skeit party default <branch>
//! skeit party move <commit> <branch>
//! skeit party sync
//! skeit party status [--json]
//! skeit party finish
//! skeit party continue
//! skeit party abort
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::party::PartyCommand;
use skeit_party::PartyError;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "skeit",
    version,
    about = "Work on several branches at once through one merged checkout",
    long_about = None,
)]
struct Cli {
    /// Only print warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print every git invocation.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the active party of the current repository.
    Party {
        #[command(subcommand)]
        command: PartyCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let result: Result<()> = match cli.command {
        Commands::Party { command } => commands::party::run(command),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise `info`, lowered by `-q` and raised by `-v`.
fn init_logging(quiet: bool, verbose: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn report_error(err: &anyhow::Error) {
    let Some(party_err) = err.downcast_ref::<PartyError>() else {
        eprintln!("{} {err:#}", "error:".red().bold());
        return;
    };
    eprintln!(
        "{} [{}] {err:#}",
        "error:".red().bold(),
        party_err.kind().yellow()
    );
    match party_err {
        PartyError::Conflict { worktree, .. } => {
            eprintln!("Resolve the conflicts in {} and stage them, then run:", worktree.display());
            eprintln!("  skeit party continue    (or 'skeit party abort' to give up)");
        }
        PartyError::Paused { .. } => {
            eprintln!("Run 'skeit party continue' or 'skeit party abort' first.");
        }
        PartyError::DirtyWorkingTree { .. } => {
            eprintln!("Commit or stash your changes first.");
        }
        PartyError::NoActiveParty => {
            eprintln!("Run: skeit party start <name> [branch...]");
        }
        PartyError::NotOnPartyBranch { branch, .. } => {
            eprintln!("Run: git checkout {branch}");
        }
        _ => {}
    }
}
