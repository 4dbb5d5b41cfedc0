//! Error types for skeit-party.

use std::path::PathBuf;

use thiserror::Error;

use skeit_core::{BranchName, ConflictKind, GitError, PartyName};

/// All errors a party command can end with.
///
/// Every precondition failure is raised before the first mutating call.
/// `Conflict` is the only variant that can follow a partial mutation; the
/// auxiliary worktree is then left mid-operation for manual resolution.
#[derive(Debug, Error)]
pub enum PartyError {
    /// Staged or unstaged changes in the primary working tree.
    #[error("working tree at {} has staged or unstaged changes", worktree.display())]
    DirtyWorkingTree { worktree: PathBuf },

    #[error("{what} '{name}' not found")]
    NotFound { what: &'static str, name: String },

    #[error("{what} '{name}' already exists")]
    AlreadyExists { what: &'static str, name: String },

    /// A merge or cherry-pick halted; `subject` is the branch or commit.
    #[error("{kind} of '{subject}' stopped on conflicts in {}", worktree.display())]
    Conflict {
        kind: ConflictKind,
        subject: String,
        worktree: PathBuf,
    },

    #[error("no active party")]
    NoActiveParty,

    /// The primary worktree is not on the active party's branch.
    #[error("'{branch}' is not checked out; HEAD is on {current}")]
    NotOnPartyBranch { branch: BranchName, current: String },

    /// The active party has an unfinished operation recorded.
    #[error("party '{party}' has an unfinished {op}")]
    Paused { party: PartyName, op: String },

    /// The auxiliary worktree cannot take a new build.
    #[error("auxiliary worktree {} is busy: {reason}", worktree.display())]
    AuxiliaryBusy { worktree: PathBuf, reason: String },

    #[error("invalid party name '{0}'")]
    InvalidName(String),

    /// Adapter failure that has no party-level meaning.
    #[error(transparent)]
    Git(GitError),
}

impl PartyError {
    /// Stable failure-kind label surfaced to the operator.
    pub fn kind(&self) -> &'static str {
        match self {
            PartyError::DirtyWorkingTree { .. } => "DirtyWorkingTree",
            PartyError::NotFound { .. } => "NotFound",
            PartyError::AlreadyExists { .. } => "AlreadyExists",
            PartyError::Conflict { .. } => "Conflict",
            PartyError::NoActiveParty => "NoActiveParty",
            PartyError::NotOnPartyBranch { .. } => "NotOnPartyBranch",
            PartyError::Paused { .. } => "Paused",
            PartyError::AuxiliaryBusy { .. } => "AuxiliaryBusy",
            PartyError::InvalidName(_) => "InvalidName",
            PartyError::Git(_) => "Unknown",
        }
    }
}

impl From<GitError> for PartyError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotFound { what, name } => PartyError::NotFound { what, name },
            GitError::AlreadyExists { what, name } => PartyError::AlreadyExists { what, name },
            GitError::DirtyWorkingTree { worktree } => PartyError::DirtyWorkingTree { worktree },
            GitError::Conflict {
                kind,
                subject,
                worktree,
            } => PartyError::Conflict {
                kind,
                subject,
                worktree,
            },
            other => PartyError::Git(other),
        }
    }
}

pub(crate) fn not_found(what: &'static str, name: impl Into<String>) -> PartyError {
    PartyError::NotFound {
        what,
        name: name.into(),
    }
}
