//! Error types for skeit-core.

use std::path::PathBuf;

use thiserror::Error;

/// Which kind of git operation halted on conflict markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Merge,
    CherryPick,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Merge => write!(f, "merge"),
            ConflictKind::CherryPick => write!(f, "cherry-pick"),
        }
    }
}

/// All errors that can arise from VCS adapter and config store calls.
#[derive(Debug, Error)]
pub enum GitError {
    /// A branch, commit or worktree the caller named does not exist.
    #[error("{what} '{name}' not found")]
    NotFound { what: &'static str, name: String },

    /// A merge or cherry-pick stopped with conflicts in `worktree`.
    #[error("{kind} of '{subject}' stopped on conflicts in {}", worktree.display())]
    Conflict {
        kind: ConflictKind,
        subject: String,
        worktree: PathBuf,
    },

    /// The working tree at `worktree` has staged or unstaged changes.
    #[error("working tree at {} has uncommitted changes", worktree.display())]
    DirtyWorkingTree { worktree: PathBuf },

    /// A branch or worktree with this name already exists.
    #[error("{what} '{name}' already exists")]
    AlreadyExists { what: &'static str, name: String },

    /// git exited non-zero for a reason the adapter does not classify.
    #[error("`git {args}` failed: {stderr}")]
    Command { args: String, stderr: String },

    /// Spawning git failed (not installed, cwd missing, ...).
    #[error("could not run git in {}: {source}", cwd.display())]
    Io {
        cwd: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// git printed something the adapter could not parse.
    #[error("unexpected git output for {context}: {output}")]
    Unparsable { context: &'static str, output: String },

    /// A value cannot be stored under `key` without losing information.
    #[error("cannot store '{value}' in {key}")]
    InvalidConfigValue { key: String, value: String },

    /// A stored pending-operation record is not valid JSON.
    #[error("corrupt config value for {key}: {source}")]
    CorruptConfig {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience constructor for [`GitError::NotFound`].
pub(crate) fn not_found(what: &'static str, name: impl Into<String>) -> GitError {
    GitError::NotFound {
        what,
        name: name.into(),
    }
}
