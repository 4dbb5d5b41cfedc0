//! Party configuration in repository-local git config.
//!
//! # Key layout
//!
//! ```text
//! party.active              name of the active party (at most one)
//! party.worktree            optional override of the auxiliary worktree path
//! party.<name>.default      default (sink) branch
//! party.<name>.branches     ordered member list, comma-separated, default excluded
//! party.<name>.pending      JSON PendingOp while an operation is paused
//! ```
//!
//! Each write is a single `git config` invocation. A config record may exist
//! without its `party/<name>` branch (and vice versa) while `start` is in
//! flight, so nothing here checks branches.

use std::path::PathBuf;

use crate::error::GitError;
use crate::git::Git;
use crate::types::{BranchName, PartyName, PartyRecord, PendingOp};

const ACTIVE_KEY: &str = "party.active";
const WORKTREE_KEY: &str = "party.worktree";
const MEMBER_SEP: char = ',';

/// Tunables read from git config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartySettings {
    /// Where to keep the auxiliary worktree instead of the default sibling dir.
    pub worktree: Option<PathBuf>,
}

/// Reads and writes party state through a [`Git`] bound to the primary worktree.
#[derive(Debug, Clone)]
pub struct PartyStore {
    git: Git,
}

impl PartyStore {
    pub fn new(git: Git) -> Self {
        Self { git }
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    // -----------------------------------------------------------------------
    // Active party
    // -----------------------------------------------------------------------

    pub fn get_active(&self) -> Result<Option<PartyName>, GitError> {
        Ok(self
            .git
            .config_get(ACTIVE_KEY)?
            .filter(|v| !v.trim().is_empty())
            .map(PartyName::from))
    }

    pub fn set_active(&self, name: &PartyName) -> Result<(), GitError> {
        self.git.config_set(ACTIVE_KEY, &name.0)
    }

    pub fn clear_active(&self) -> Result<(), GitError> {
        self.git.config_unset(ACTIVE_KEY)
    }

    // -----------------------------------------------------------------------
    // Party records
    // -----------------------------------------------------------------------

    /// Load a party; `None` when no default branch is recorded for it.
    pub fn get(&self, name: &PartyName) -> Result<Option<PartyRecord>, GitError> {
        let Some(default_branch) = self.git.config_get(&key(name, "default"))? else {
            return Ok(None);
        };
        let members = self
            .git
            .config_get(&key(name, "branches"))?
            .map(|raw| split_members(&raw))
            .unwrap_or_default();
        Ok(Some(PartyRecord::new(
            BranchName::from(default_branch),
            members,
        )))
    }

    /// Store a party record, replacing any previous one.
    pub fn put(&self, name: &PartyName, record: &PartyRecord) -> Result<(), GitError> {
        let branches_key = key(name, "branches");
        let joined = join_members(&record.members).ok_or_else(|| GitError::InvalidConfigValue {
            key: branches_key.clone(),
            value: record
                .members
                .iter()
                .map(BranchName::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        })?;
        self.git
            .config_set(&key(name, "default"), record.default_branch.as_str())?;
        self.git.config_set(&branches_key, &joined)
    }

    /// Remove every key of `name`, including a pending operation.
    pub fn delete(&self, name: &PartyName) -> Result<(), GitError> {
        for field in ["default", "branches", "pending"] {
            self.git.config_unset(&key(name, field))?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Paused operations
    // -----------------------------------------------------------------------

    pub fn pending(&self, name: &PartyName) -> Result<Option<PendingOp>, GitError> {
        let pending_key = key(name, "pending");
        let Some(raw) = self.git.config_get(&pending_key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| GitError::CorruptConfig {
                key: pending_key,
                source,
            })
    }

    pub fn set_pending(&self, name: &PartyName, op: &PendingOp) -> Result<(), GitError> {
        let pending_key = key(name, "pending");
        let json = serde_json::to_string(op).map_err(|source| GitError::CorruptConfig {
            key: pending_key.clone(),
            source,
        })?;
        self.git.config_set(&pending_key, &json)
    }

    pub fn clear_pending(&self, name: &PartyName) -> Result<(), GitError> {
        self.git.config_unset(&key(name, "pending"))
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    pub fn settings(&self) -> Result<PartySettings, GitError> {
        let worktree = self
            .git
            .config_get(WORKTREE_KEY)?
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Ok(PartySettings { worktree })
    }
}

fn key(name: &PartyName, field: &str) -> String {
    format!("party.{}.{field}", name.0)
}

fn split_members(raw: &str) -> Vec<BranchName> {
    raw.split(MEMBER_SEP)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(BranchName::from)
        .collect()
}

/// `None` if a member name would not survive the round trip.
fn join_members(members: &[BranchName]) -> Option<String> {
    if members
        .iter()
        .any(|m| m.0.contains(MEMBER_SEP) || m.0.trim() != m.0)
    {
        return None;
    }
    Some(
        members
            .iter()
            .map(BranchName::as_str)
            .collect::<Vec<_>>()
            .join(","),
    )
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
