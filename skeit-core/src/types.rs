//! Domain types for parties.
//!
//! Names are newtypes so a branch can never be passed where a party name is
//! expected. All types are serializable via serde; [`PendingOp`] is persisted
//! as JSON inside git config while an operation is paused.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every party branch in the primary working tree.
pub const PARTY_BRANCH_PREFIX: &str = "party/";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a party.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyName(pub String);

impl PartyName {
    /// The branch that carries the merged view: `party/<name>`.
    pub fn branch(&self) -> BranchName {
        BranchName(format!("{PARTY_BRANCH_PREFIX}{}", self.0))
    }
}

impl fmt::Display for PartyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PartyName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PartyName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A local branch name, without the `refs/heads/` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchName(pub String);

impl BranchName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified ref, `refs/heads/<name>`.
    pub fn full_ref(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A full commit object id as printed by git.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl CommitId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex digits, for operator-facing messages.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A non-merge commit as listed by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub committed_at: DateTime<Utc>,
    pub summary: String,
}

/// Persistent description of one party.
///
/// `members` never contains `default_branch`; the default is implicitly
/// member #0 and the merge order is `default_branch` followed by `members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRecord {
    pub default_branch: BranchName,
    #[serde(default)]
    pub members: Vec<BranchName>,
}

impl PartyRecord {
    /// Build a record, dropping duplicates and any repeat of the default.
    pub fn new(default_branch: BranchName, members: impl IntoIterator<Item = BranchName>) -> Self {
        let mut record = Self {
            default_branch,
            members: Vec::new(),
        };
        for member in members {
            record.push_member(member);
        }
        record
    }

    /// The merge order: default first, then members as listed.
    pub fn merge_order(&self) -> Vec<BranchName> {
        std::iter::once(self.default_branch.clone())
            .chain(self.members.iter().cloned())
            .collect()
    }

    /// True when `branch` is the default or a listed member.
    pub fn contains(&self, branch: &BranchName) -> bool {
        self.default_branch == *branch || self.members.contains(branch)
    }

    /// Append `branch` unless it is already part of the party.
    /// Returns whether the member list changed.
    pub fn push_member(&mut self, branch: BranchName) -> bool {
        if self.contains(&branch) {
            return false;
        }
        self.members.push(branch);
        true
    }

    /// Make `branch` (an existing member) the default. The previous default
    /// becomes the first member so it stays merged right after the new sink.
    /// Returns `false` when `branch` is not a member.
    pub fn reassign_default(&mut self, branch: &BranchName) -> bool {
        if self.default_branch == *branch {
            return true;
        }
        let Some(pos) = self.members.iter().position(|m| m == branch) else {
            return false;
        };
        self.members.remove(pos);
        let previous = std::mem::replace(&mut self.default_branch, branch.clone());
        self.members.insert(0, previous);
        true
    }
}

/// Operation left paused in the auxiliary worktree by a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PendingOp {
    /// Replaying unique commits onto the default branch; `remaining` are the
    /// commits not yet picked, `conflicted` the one that stopped the replay.
    Replay {
        remaining: Vec<CommitId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conflicted: Option<CommitId>,
    },
    /// Moving a commit onto a member branch whose tip was `base` before the pick.
    Move {
        commit: CommitId,
        target: BranchName,
        base: CommitId,
    },
    /// Building the merged view; `remaining` are the branches not yet merged.
    Build { remaining: Vec<BranchName> },
}

impl PendingOp {
    pub fn label(&self) -> &'static str {
        match self {
            PendingOp::Replay { .. } => "replay",
            PendingOp::Move { .. } => "move",
            PendingOp::Build { .. } => "build",
        }
    }
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingOp::Replay { remaining, .. } => write!(
                f,
                "replay onto default branch ({} commit(s) remaining)",
                remaining.len()
            ),
            PendingOp::Move { commit, target, .. } => {
                write!(f, "move of {} onto '{}'", commit.short(), target)
            }
            PendingOp::Build { remaining } => {
                write!(f, "merged-view build ({} merge(s) remaining)", remaining.len())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
