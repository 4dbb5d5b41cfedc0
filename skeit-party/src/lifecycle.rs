//! Party lifecycle: one method per operator command.
//!
//! Every method loads [`PartyState`] fresh, runs all of its precondition
//! checks, and only then starts mutating branches, config or the auxiliary
//! worktree.

use std::path::{Path, PathBuf};

use skeit_core::{
    BranchName, Commit, CommitId, ConflictKind, Git, PartyName, PartyRecord, PartyStore, PendingOp,
};

use crate::error::{not_found, PartyError};
use crate::state::{ActiveParty, PartyState};
use crate::sync::{self, SyncReport};
use crate::worktree::AuxWorktree;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    pub name: PartyName,
    pub branch: BranchName,
    pub record: PartyRecord,
    pub view: CommitId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(SyncReport),
    /// The branch was already the default or a member; nothing changed.
    AlreadyMember,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub commit: CommitId,
    pub target: BranchName,
    pub sync: SyncReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishReport {
    pub name: PartyName,
    pub default_branch: BranchName,
    pub sync: SyncReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinueOutcome {
    NothingPending,
    Resumed { op: PendingOp, sync: SyncReport },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortOutcome {
    NothingPending,
    Aborted(PendingOp),
}

/// Commit count for one party branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchStatus {
    pub branch: BranchName,
    pub is_default: bool,
    /// Default branch: all non-merge commits. Member: non-merge commits not
    /// on the default branch.
    pub commits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyStatus {
    pub name: PartyName,
    pub branch: BranchName,
    pub default_branch: BranchName,
    pub branches: Vec<BranchStatus>,
    pub unique: Vec<Commit>,
    pub pending: Option<PendingOp>,
    pub worktree: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Party commands for one repository.
#[derive(Debug, Clone)]
pub struct Party {
    store: PartyStore,
}

impl Party {
    /// Bind to the repository containing `start`.
    pub fn open(start: &Path) -> Result<Self, PartyError> {
        Ok(Self::new(PartyStore::new(Git::discover(start)?)))
    }

    pub fn new(store: PartyStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PartyStore {
        &self.store
    }

    fn git(&self) -> &Git {
        self.store.git()
    }

    pub fn state(&self) -> Result<PartyState, PartyError> {
        PartyState::load(&self.store)
    }

    /// Create party `name` over the current branch plus `members`, build its
    /// view and check out `party/<name>`.
    pub fn start(&self, name: &PartyName, members: &[BranchName]) -> Result<StartReport, PartyError> {
        self.state()?.require_none()?;
        self.ensure_clean()?;
        let default_branch = self
            .git()
            .current_branch()?
            .ok_or_else(|| not_found("current branch", "HEAD (detached)"))?;
        let branch = name.branch();
        if name.0.trim().is_empty() || !self.git().check_ref_format(&branch)? {
            return Err(PartyError::InvalidName(name.0.clone()));
        }
        for member in members {
            if !self.git().branch_exists(member)? {
                return Err(not_found("branch", member.as_str()));
            }
            if member.as_str().contains(',') {
                return Err(PartyError::InvalidName(member.0.clone()));
            }
        }
        if self.git().branch_exists(&branch)? {
            return Err(PartyError::AlreadyExists {
                what: "branch",
                name: branch.0,
            });
        }
        if let Some(aux) = AuxWorktree::open(&self.store)? {
            aux.ensure_idle()?;
        }

        let party = ActiveParty {
            name: name.clone(),
            record: PartyRecord::new(default_branch, members.iter().cloned()),
        };
        tracing::info!(
            "creating party '{}' with branches: {}",
            name,
            join_branches(&party.record.merge_order())
        );
        self.store.put(name, &party.record)?;
        self.store.set_active(name)?;

        let aux = AuxWorktree::ensure(&self.store)?;
        let view = {
            let lease = aux.acquire()?;
            sync::rebuild(&lease, &self.store, &party)?
        };
        self.git().create_branch(&branch, &view)?;
        sync::complete(&self.store, &party, &view)?;

        Ok(StartReport {
            name: party.name,
            branch,
            record: party.record,
            view,
        })
    }

    /// Append `branch` to the active party and sync.
    pub fn add(&self, branch: &BranchName) -> Result<AddOutcome, PartyError> {
        let mut party = self.state()?.require_idle()?;
        if !self.git().branch_exists(branch)? {
            return Err(not_found("branch", branch.as_str()));
        }
        self.ensure_clean()?;
        self.ensure_checked_out(&party)?;
        if !party.record.push_member(branch.clone()) {
            return Ok(AddOutcome::AlreadyMember);
        }
        self.store.put(&party.name, &party.record)?;
        tracing::info!("added '{branch}' to party '{}'", party.name);

        let aux = AuxWorktree::ensure(&self.store)?;
        Ok(AddOutcome::Added(sync::run(&self.store, &aux, &party, &[])?))
    }

    /// Make `branch`, already a member, the default branch. The view is
    /// rebuilt in the new order by the next sync.
    pub fn set_default(&self, branch: &BranchName) -> Result<PartyRecord, PartyError> {
        let mut party = self.state()?.require_idle()?;
        if !self.git().branch_exists(branch)? {
            return Err(not_found("branch", branch.as_str()));
        }
        if !party.record.reassign_default(branch) {
            return Err(not_found("party member", branch.as_str()));
        }
        self.store.put(&party.name, &party.record)?;
        Ok(party.record)
    }

    /// Cherry-pick `commit` onto member `target`, then sync. The moved commit
    /// is found on `target` and is no longer replayed onto the default branch.
    pub fn move_commit(&self, commit: &str, target: &BranchName) -> Result<MoveReport, PartyError> {
        let party = self.state()?.require_idle()?;
        self.ensure_clean()?;
        self.ensure_checked_out(&party)?;
        if !party.record.contains(target) {
            return Err(not_found("party member", target.as_str()));
        }
        let commit = self.git().resolve_commit(commit)?;
        let base = self.git().resolve_commit(&target.full_ref())?;

        let aux = AuxWorktree::ensure(&self.store)?;
        {
            let lease = aux.acquire()?;
            self.store.set_pending(
                &party.name,
                &PendingOp::Move {
                    commit: commit.clone(),
                    target: target.clone(),
                    base,
                },
            )?;
            tracing::info!("moving {} onto '{target}'", commit.short());
            lease.git().checkout(target)?;
            lease.git().cherry_pick(&commit)?;
        }

        let sync = sync::run(&self.store, &aux, &party, std::slice::from_ref(&commit))?;
        Ok(MoveReport {
            commit,
            target: target.clone(),
            sync,
        })
    }

    /// Replay unique commits onto the default branch and rebuild the view.
    /// On a paused party this resumes the paused operation instead, as
    /// [`Party::continue_pending`] does.
    pub fn sync(&self) -> Result<SyncReport, PartyError> {
        let party = match self.state()? {
            PartyState::Paused { .. } => {
                return match self.continue_pending()? {
                    ContinueOutcome::Resumed { sync, .. } => Ok(sync),
                    ContinueOutcome::NothingPending => self.sync(),
                };
            }
            state => state.require_idle()?,
        };
        self.ensure_clean()?;
        self.ensure_checked_out(&party)?;
        let aux = AuxWorktree::ensure(&self.store)?;
        sync::run(&self.store, &aux, &party, &[])
    }

    /// Read-only summary of the active party.
    pub fn status(&self) -> Result<PartyStatus, PartyError> {
        let (party, pending) = self.state()?.require_active()?;
        let default_branch = party.record.default_branch.clone();

        let mut branches = Vec::new();
        for branch in party.record.merge_order() {
            let is_default = branch == default_branch;
            let commits = if !self.git().branch_exists(&branch)? {
                0
            } else if is_default {
                self.git().count_commits(&branch, &[])?
            } else {
                self.git()
                    .count_commits(&branch, std::slice::from_ref(&default_branch))?
            };
            branches.push(BranchStatus {
                branch,
                is_default,
                commits,
            });
        }

        let unique = sync::unique_commits(self.git(), &party)?;
        let worktree = AuxWorktree::open(&self.store)?.map(|aux| aux.path().to_path_buf());
        Ok(PartyStatus {
            branch: party.branch(),
            name: party.name,
            default_branch,
            branches,
            unique,
            pending,
            worktree,
        })
    }

    /// Sync one last time, return to the default branch and remove all
    /// party state.
    pub fn finish(&self) -> Result<FinishReport, PartyError> {
        let party = self.state()?.require_idle()?;
        self.ensure_clean()?;
        self.ensure_checked_out(&party)?;
        let aux = AuxWorktree::ensure(&self.store)?;
        let sync = sync::run(&self.store, &aux, &party, &[])?;

        let default_branch = party.record.default_branch.clone();
        tracing::info!("checking out default branch '{default_branch}'");
        self.git().checkout(&default_branch)?;
        self.git().delete_branch(&party.branch())?;
        aux.remove(self.git())?;
        self.store.delete(&party.name)?;
        self.store.clear_active()?;

        Ok(FinishReport {
            name: party.name,
            default_branch,
            sync,
        })
    }

    /// Resume the operation recorded as pending, after the operator resolved
    /// its conflicts in the auxiliary worktree. A paused merge or cherry-pick
    /// is concluded here; one the operator already committed is picked up
    /// where it left off.
    pub fn continue_pending(&self) -> Result<ContinueOutcome, PartyError> {
        let (party, pending) = self.state()?.require_active()?;
        let Some(op) = pending else {
            return Ok(ContinueOutcome::NothingPending);
        };
        self.ensure_clean()?;
        // A build paused by `start` has no party branch yet.
        if self.git().branch_exists(&party.branch())? {
            self.ensure_checked_out(&party)?;
        }
        let aux = AuxWorktree::ensure(&self.store)?;
        let in_progress = aux.in_progress()?;
        if let Some(kind) = in_progress {
            ensure_resolved(&aux, kind)?;
        }
        tracing::info!("continuing {op}");

        let sync = match &op {
            PendingOp::Replay { conflicted, .. } => match in_progress {
                Some(ConflictKind::CherryPick) => {
                    let picked = aux.git().resolve_commit("CHERRY_PICK_HEAD")?;
                    aux.git().continue_cherry_pick()?;
                    sync::run(&self.store, &aux, &party, &[picked])?
                }
                Some(ConflictKind::Merge) => {
                    aux.git().abort_merge()?;
                    sync::run(&self.store, &aux, &party, conflicted.as_slice())?
                }
                None => sync::run(&self.store, &aux, &party, conflicted.as_slice())?,
            },
            PendingOp::Move {
                commit,
                target,
                base,
            } => {
                match in_progress {
                    Some(ConflictKind::CherryPick) => aux.git().continue_cherry_pick()?,
                    Some(ConflictKind::Merge) => aux.git().abort_merge()?,
                    None => {}
                }
                if self.git().resolve_commit(&target.full_ref())? == *base {
                    tracing::info!("redoing move of {} onto '{target}'", commit.short());
                    let lease = aux.acquire()?;
                    lease.git().checkout(target)?;
                    lease.git().cherry_pick(commit)?;
                }
                sync::run(&self.store, &aux, &party, std::slice::from_ref(commit))?
            }
            PendingOp::Build { remaining } => {
                let view = match in_progress {
                    Some(ConflictKind::Merge) => {
                        aux.git().conclude_merge()?;
                        let lease = aux.acquire()?;
                        sync::resume_build(&lease, &self.store, &party, remaining)?
                    }
                    Some(ConflictKind::CherryPick) => {
                        aux.git().abort_cherry_pick()?;
                        let lease = aux.acquire()?;
                        sync::rebuild(&lease, &self.store, &party)?
                    }
                    None => {
                        let lease = aux.acquire()?;
                        if partial_view_in_place(lease.git(), &party, remaining)? {
                            sync::resume_build(&lease, &self.store, &party, remaining)?
                        } else {
                            sync::rebuild(&lease, &self.store, &party)?
                        }
                    }
                };
                sync::complete(&self.store, &party, &view)?;
                SyncReport {
                    party: party.name.clone(),
                    replayed: Vec::new(),
                    skipped: Vec::new(),
                    view,
                }
            }
        };

        Ok(ContinueOutcome::Resumed { op, sync })
    }

    /// Abandon the pending operation: abort any paused merge or cherry-pick
    /// in the auxiliary worktree and forget the pending record.
    pub fn abort_pending(&self) -> Result<AbortOutcome, PartyError> {
        let (party, pending) = self.state()?.require_active()?;
        let Some(op) = pending else {
            return Ok(AbortOutcome::NothingPending);
        };
        if let Some(aux) = AuxWorktree::open(&self.store)? {
            match aux.in_progress()? {
                Some(ConflictKind::CherryPick) => aux.git().abort_cherry_pick()?,
                Some(ConflictKind::Merge) => aux.git().abort_merge()?,
                None => {}
            }
            aux.git().checkout_detached("HEAD")?;
        }
        self.store.clear_pending(&party.name)?;
        tracing::info!("aborted {op} for party '{}'", party.name);
        Ok(AbortOutcome::Aborted(op))
    }

    fn ensure_clean(&self) -> Result<(), PartyError> {
        Ok(self.git().ensure_clean()?)
    }

    /// The primary worktree must be on `party/<name>` before anything that
    /// replays onto or repoints party branches.
    fn ensure_checked_out(&self, party: &ActiveParty) -> Result<(), PartyError> {
        let branch = party.branch();
        let current = self.git().current_branch()?;
        if current.as_ref() == Some(&branch) {
            return Ok(());
        }
        Err(PartyError::NotOnPartyBranch {
            branch,
            current: current.map_or_else(|| "a detached commit".to_string(), |b| format!("'{b}'")),
        })
    }
}

/// Whether the detached auxiliary HEAD already merges every branch ahead of
/// `remaining`, as left by a conflicted merge the operator committed.
fn partial_view_in_place(
    aux: &Git,
    party: &ActiveParty,
    remaining: &[BranchName],
) -> Result<bool, PartyError> {
    if aux.current_branch()?.is_some() {
        return Ok(false);
    }
    let order = party.record.merge_order();
    let merged = &order[..order.len().saturating_sub(remaining.len())];
    for branch in merged {
        if !aux.is_ancestor(&branch.full_ref(), "HEAD")? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `Conflict` while the paused operation still has unmerged paths.
fn ensure_resolved(aux: &AuxWorktree, kind: ConflictKind) -> Result<(), PartyError> {
    let unmerged = aux.git().unmerged_paths()?;
    if unmerged.is_empty() {
        return Ok(());
    }
    let head = match kind {
        ConflictKind::Merge => "MERGE_HEAD",
        ConflictKind::CherryPick => "CHERRY_PICK_HEAD",
    };
    tracing::warn!("{} path(s) still unmerged", unmerged.len());
    Err(PartyError::Conflict {
        kind,
        subject: aux.git().resolve_commit(head)?.0,
        worktree: aux.path().to_path_buf(),
    })
}

fn join_branches(branches: &[BranchName]) -> String {
    branches
        .iter()
        .map(BranchName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
