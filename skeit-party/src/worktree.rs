//! The auxiliary worktree: one detached checkout per repository where merged
//! views are built and commits are replayed, out of the operator's way.
//!
//! Default location is a hidden sibling of the repository root,
//! `<parent>/.<repo>-party`; `party.worktree` in git config overrides it.
//!
//! Work inside it goes through an [`AuxLease`]. Acquiring a lease fails while
//! a merge or cherry-pick is paused there; dropping one detaches HEAD so no
//! branch stays checked out in the auxiliary worktree, unless an operation is
//! paused, which is left untouched for the operator.

use std::path::{Path, PathBuf};

use skeit_core::{ConflictKind, Git, PartyStore};

use crate::error::PartyError;

/// Handle to the auxiliary worktree.
#[derive(Debug, Clone)]
pub struct AuxWorktree {
    git: Git,
}

impl AuxWorktree {
    /// Where the worktree lives (or would live) for this repository.
    pub fn locate(store: &PartyStore) -> Result<PathBuf, PartyError> {
        if let Some(path) = store.settings()?.worktree {
            return Ok(path);
        }
        Ok(default_path(store.git().dir()))
    }

    /// The registered auxiliary worktree, if there is one.
    pub fn open(store: &PartyStore) -> Result<Option<Self>, PartyError> {
        let path = Self::locate(store)?;
        let registered = store
            .git()
            .worktrees()?
            .into_iter()
            .any(|wt| same_path(&wt.path, &path));
        Ok(registered.then(|| Self {
            git: store.git().at(path),
        }))
    }

    /// Open the auxiliary worktree, creating it detached at HEAD if missing.
    pub fn ensure(store: &PartyStore) -> Result<Self, PartyError> {
        if let Some(aux) = Self::open(store)? {
            return Ok(aux);
        }
        let path = Self::locate(store)?;
        store.git().prune_worktrees()?;
        tracing::info!("creating auxiliary worktree at {}", path.display());
        store.git().add_worktree_detached(&path, "HEAD")?;
        Ok(Self {
            git: store.git().at(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.git.dir()
    }

    /// Adapter running inside the auxiliary worktree. Prefer a lease for
    /// anything that moves HEAD.
    pub fn git(&self) -> &Git {
        &self.git
    }

    pub fn in_progress(&self) -> Result<Option<ConflictKind>, PartyError> {
        Ok(self.git.operation_in_progress()?)
    }

    /// Fail unless the worktree can take new work.
    pub fn ensure_idle(&self) -> Result<(), PartyError> {
        if let Some(kind) = self.in_progress()? {
            return Err(PartyError::AuxiliaryBusy {
                worktree: self.path().to_path_buf(),
                reason: format!("a {kind} is in progress"),
            });
        }
        if self.git.is_dirty()? {
            return Err(PartyError::AuxiliaryBusy {
                worktree: self.path().to_path_buf(),
                reason: "it has uncommitted changes".to_string(),
            });
        }
        Ok(())
    }

    /// Take the worktree for a build or replay.
    pub fn acquire(&self) -> Result<AuxLease<'_>, PartyError> {
        self.ensure_idle()?;
        Ok(AuxLease { aux: self })
    }

    /// Force-remove the worktree and prune its registration.
    pub fn remove(self, primary: &Git) -> Result<(), PartyError> {
        tracing::info!("removing auxiliary worktree {}", self.path().display());
        primary.remove_worktree(self.path())?;
        primary.prune_worktrees()?;
        Ok(())
    }
}

/// Scoped use of the auxiliary worktree; see the module docs.
#[derive(Debug)]
pub struct AuxLease<'a> {
    aux: &'a AuxWorktree,
}

impl AuxLease<'_> {
    pub fn git(&self) -> &Git {
        &self.aux.git
    }

    pub fn path(&self) -> &Path {
        self.aux.path()
    }
}

impl Drop for AuxLease<'_> {
    fn drop(&mut self) {
        match self.aux.git.operation_in_progress() {
            Ok(None) => {
                if let Err(e) = self.aux.git.checkout_detached("HEAD") {
                    tracing::warn!(
                        "could not detach auxiliary worktree {}: {e}",
                        self.path().display()
                    );
                }
            }
            Ok(Some(kind)) => {
                tracing::debug!("leaving paused {kind} in {}", self.path().display());
            }
            Err(e) => tracing::warn!(
                "could not inspect auxiliary worktree {}: {e}",
                self.path().display()
            ),
        }
    }
}

/// `<parent of repo root>/.<repo name>-party`.
pub fn default_path(repo_root: &Path) -> PathBuf {
    let name = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repo".to_string());
    let parent = repo_root
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    parent.join(format!(".{name}-party"))
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
