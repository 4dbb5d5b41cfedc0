//! Merged-view builder.
//!
//! A merged view of `[default, m1, .., mk]` is built in the auxiliary
//! worktree by detaching at `default` and merging each member in order with
//! `--no-ff`, so every member shows up as its own merge commit even when a
//! fast-forward would do. Views are disposable: every build produces a fresh
//! commit and the party branch is force-moved to it.

use skeit_core::{BranchName, CommitId};

use crate::error::PartyError;
use crate::worktree::AuxLease;

/// Build a view from scratch. `order[0]` is the default branch.
///
/// A conflicting merge fails with [`PartyError::Conflict`] and leaves the
/// merge paused in the auxiliary worktree.
pub fn build_view(lease: &AuxLease<'_>, order: &[BranchName]) -> Result<CommitId, PartyError> {
    let (base, members) = order.split_first().ok_or(PartyError::NotFound {
        what: "branch",
        name: "default".to_string(),
    })?;
    tracing::debug!("building view on '{base}' with {} member(s)", members.len());
    lease.git().checkout_detached(&base.full_ref())?;
    merge_members(lease, members)
}

/// Merge `members` in order onto the current HEAD and return the result.
pub fn merge_members(lease: &AuxLease<'_>, members: &[BranchName]) -> Result<CommitId, PartyError> {
    for member in members {
        tracing::debug!("merging '{member}'");
        lease.git().merge_no_ff(member)?;
    }
    Ok(lease.git().head()?)
}

/// Branches still to merge after a conflict on `conflicted`.
pub fn remaining_after(order: &[BranchName], conflicted: &str) -> Vec<BranchName> {
    order
        .iter()
        .position(|b| b.as_str() == conflicted)
        .map(|pos| order[pos + 1..].to_vec())
        .unwrap_or_default()
}
