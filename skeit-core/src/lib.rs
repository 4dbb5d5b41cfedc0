//! skeit core library: domain types, the git adapter, party configuration.
//!
//! - [`types`]: newtypes and party records
//! - [`error`]: [`GitError`]
//! - [`git`]: [`Git`], the command-line VCS adapter
//! - [`config`]: [`PartyStore`], party state kept in repository-local git config

pub mod config;
pub mod error;
pub mod git;
pub mod types;

pub use config::{PartySettings, PartyStore};
pub use error::{ConflictKind, GitError};
pub use git::{Git, WorktreeInfo};
pub use types::{BranchName, Commit, CommitId, PartyName, PartyRecord, PendingOp};
