//! Sync engine: keep `party/<name>` and its source branches consistent.
//!
//! ## Protocol
//!
//! 1. Collect the unique commits of the party branch: non-merge commits not
//!    reachable from the default branch or any member, oldest first.
//! 2. Drop those whose change already exists on a party branch under
//!    another id (a finished `move`, or a replay cut short earlier), and
//!    those the caller excludes explicitly.
//! 3. Attach the default branch in the auxiliary worktree and cherry-pick
//!    the rest onto it.
//! 4. Rebuild the merged view from the current branch tips.
//! 5. Force-move `party/<name>` to the view and check it out.
//!
//! A `pending` record is written before step 3 and cleared after step 5,
//! so an interrupted run is visible to the next command. It names the
//! commit or merge that conflicted and what was still to do, which is what
//! `continue` resumes from.

use std::collections::HashSet;

use skeit_core::{BranchName, Commit, CommitId, ConflictKind, Git, PartyName, PartyStore, PendingOp};

use crate::builder;
use crate::error::PartyError;
use crate::state::ActiveParty;
use crate::worktree::{AuxLease, AuxWorktree};

/// What a sync did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub party: PartyName,
    /// Commits cherry-picked onto the default branch, in replay order.
    pub replayed: Vec<Commit>,
    /// Unique commits not replayed because their change already exists on
    /// a party branch.
    pub skipped: Vec<Commit>,
    /// The new tip of `party/<name>`.
    pub view: CommitId,
}

/// Non-merge commits on the party branch reachable from no party branch,
/// oldest first. Empty when the party branch does not exist yet. Deleted
/// members are left out, so their commits count as unique.
pub fn unique_commits(git: &Git, party: &ActiveParty) -> Result<Vec<Commit>, PartyError> {
    let branch = party.branch();
    if !git.branch_exists(&branch)? {
        return Ok(Vec::new());
    }
    Ok(git.list_commits(&branch, &existing_branches(git, party)?)?)
}

/// Ids of party-branch commits whose change is already on some party branch.
fn applied_elsewhere(git: &Git, party: &ActiveParty) -> Result<HashSet<CommitId>, PartyError> {
    let head = party.branch();
    let mut applied = HashSet::new();
    for upstream in existing_branches(git, party)? {
        applied.extend(git.patch_equivalents(&upstream, &head)?);
    }
    Ok(applied)
}

fn existing_branches(git: &Git, party: &ActiveParty) -> Result<Vec<BranchName>, PartyError> {
    let mut existing = Vec::new();
    for branch in party.record.merge_order() {
        if git.branch_exists(&branch)? {
            existing.push(branch);
        } else {
            tracing::warn!("party branch '{branch}' no longer exists");
        }
    }
    Ok(existing)
}

/// Run the full protocol for `party`. Commits in `exclude` are never
/// replayed. The caller has checked that the primary working tree is clean.
pub(crate) fn run(
    store: &PartyStore,
    aux: &AuxWorktree,
    party: &ActiveParty,
    exclude: &[CommitId],
) -> Result<SyncReport, PartyError> {
    let git = store.git();
    let unique = unique_commits(git, party)?;
    let (replay, skipped): (Vec<Commit>, Vec<Commit>) = if unique.is_empty() {
        (unique, Vec::new())
    } else {
        let applied = applied_elsewhere(git, party)?;
        unique
            .into_iter()
            .partition(|c| !applied.contains(&c.id) && !exclude.contains(&c.id))
    };
    for commit in &skipped {
        tracing::info!(
            "skipping {} ({}): already on a party branch",
            commit.id.short(),
            commit.summary
        );
    }

    let view = {
        let lease = aux.acquire()?;
        replay_onto_default(&lease, store, party, &replay)?;
        rebuild(&lease, store, party)?
    };
    complete(store, party, &view)?;

    Ok(SyncReport {
        party: party.name.clone(),
        replayed: replay,
        skipped,
        view,
    })
}

fn replay_onto_default(
    lease: &AuxLease<'_>,
    store: &PartyStore,
    party: &ActiveParty,
    commits: &[Commit],
) -> Result<(), PartyError> {
    if commits.is_empty() {
        return Ok(());
    }
    let default_branch = &party.record.default_branch;
    tracing::info!(
        "replaying {} commit(s) onto '{default_branch}'",
        commits.len()
    );
    let ids: Vec<CommitId> = commits.iter().map(|c| c.id.clone()).collect();
    store.set_pending(
        &party.name,
        &PendingOp::Replay {
            remaining: ids.clone(),
            conflicted: None,
        },
    )?;

    lease.git().checkout(default_branch)?;
    for (i, commit) in commits.iter().enumerate() {
        tracing::debug!("cherry-picking {} {}", commit.id.short(), commit.summary);
        if let Err(err) = lease.git().cherry_pick(&commit.id) {
            let err = PartyError::from(err);
            if matches!(err, PartyError::Conflict { .. }) {
                let op = PendingOp::Replay {
                    remaining: ids[i + 1..].to_vec(),
                    conflicted: Some(commit.id.clone()),
                };
                if let Err(e) = store.set_pending(&party.name, &op) {
                    tracing::warn!("could not record paused replay: {e}");
                }
            }
            return Err(err);
        }
    }
    Ok(())
}

/// Build the view for `party`, recording which merges remain if one conflicts.
pub(crate) fn rebuild(
    lease: &AuxLease<'_>,
    store: &PartyStore,
    party: &ActiveParty,
) -> Result<CommitId, PartyError> {
    let order = party.record.merge_order();
    store.set_pending(
        &party.name,
        &PendingOp::Build {
            remaining: order[1..].to_vec(),
        },
    )?;
    tracing::info!("rebuilding merged view of {} branch(es)", order.len());
    builder::build_view(lease, &order).map_err(|err| record_merge_conflict(store, party, &order, err))
}

/// Finish a build whose conflicted merge the operator has committed:
/// merge the branches still listed as remaining.
pub(crate) fn resume_build(
    lease: &AuxLease<'_>,
    store: &PartyStore,
    party: &ActiveParty,
    remaining: &[BranchName],
) -> Result<CommitId, PartyError> {
    builder::merge_members(lease, remaining)
        .map_err(|err| record_merge_conflict(store, party, remaining, err))
}

fn record_merge_conflict(
    store: &PartyStore,
    party: &ActiveParty,
    order: &[BranchName],
    err: PartyError,
) -> PartyError {
    if let PartyError::Conflict {
        kind: ConflictKind::Merge,
        subject,
        ..
    } = &err
    {
        let op = PendingOp::Build {
            remaining: builder::remaining_after(order, subject),
        };
        if let Err(e) = store.set_pending(&party.name, &op) {
            tracing::warn!("could not record paused build: {e}");
        }
    }
    err
}

/// Repoint the party branch at `view` and clear the pending record.
pub(crate) fn complete(
    store: &PartyStore,
    party: &ActiveParty,
    view: &CommitId,
) -> Result<(), PartyError> {
    repoint(store.git(), party, view)?;
    store.clear_pending(&party.name)?;
    tracing::info!("party '{}' now at {}", party.name, view.short());
    Ok(())
}

/// Point `party/<name>` at `view` and check it out in the primary worktree.
fn repoint(git: &Git, party: &ActiveParty, view: &CommitId) -> Result<(), PartyError> {
    let branch = party.branch();
    if git.current_branch()?.as_ref() == Some(&branch) {
        git.checkout_detached("HEAD")?;
    }
    git.force_branch(&branch, view)?;
    git.checkout(&branch)?;
    Ok(())
}
