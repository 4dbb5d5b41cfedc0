//! Thin adapter over the `git` command line.
//!
//! # Invocation model
//!
//! Every primitive spawns one `git` process with captured output, in the
//! directory the [`Git`] value is bound to. [`Git::discover`] binds to the
//! primary working tree root; [`Git::at`] rebinds the same adapter to another
//! worktree (the auxiliary one). Nothing here retries or rolls back: a merge
//! or cherry-pick that stops on conflicts is reported as
//! [`GitError::Conflict`] and left exactly as git left it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, Utc};

use crate::error::{not_found, ConflictKind, GitError};
use crate::types::{BranchName, Commit, CommitId};

/// Field separator for `git log --format` output.
const FIELD_SEP: char = '\x1f';

/// One entry of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub head: Option<CommitId>,
    /// `None` when HEAD is detached.
    pub branch: Option<BranchName>,
}

/// A git adapter bound to one working directory.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    /// Bind to the top level of the repository containing `start`.
    pub fn discover(start: &Path) -> Result<Self, GitError> {
        let probe = Self {
            dir: start.to_path_buf(),
        };
        let top = probe.run(&["rev-parse", "--show-toplevel"])?;
        if top.is_empty() {
            return Err(GitError::Unparsable {
                context: "rev-parse --show-toplevel",
                output: top,
            });
        }
        Ok(Self {
            dir: PathBuf::from(top),
        })
    }

    /// The same adapter, operating inside `dir` (another worktree of this repo).
    pub fn at(&self, dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory git is run in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // -----------------------------------------------------------------------
    // Refs and commits
    // -----------------------------------------------------------------------

    /// Branch HEAD is attached to, or `None` when detached.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let out = self.output(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        if !out.status.success() {
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&out.stdout).trim().to_string();
        Ok((!name.is_empty()).then(|| BranchName::from(name)))
    }

    pub fn branch_exists(&self, branch: &BranchName) -> Result<bool, GitError> {
        self.probe(&["rev-parse", "--verify", "-q", &branch.full_ref()])
    }

    /// Resolve any revision to a full commit id.
    pub fn resolve_commit(&self, rev: &str) -> Result<CommitId, GitError> {
        let peeled = format!("{rev}^{{commit}}");
        let out = self.output(&["rev-parse", "--verify", "-q", &peeled])?;
        if !out.status.success() {
            return Err(not_found("commit", rev));
        }
        Ok(CommitId::from(
            String::from_utf8_lossy(&out.stdout).trim().to_string(),
        ))
    }

    pub fn head(&self) -> Result<CommitId, GitError> {
        self.resolve_commit("HEAD")
    }

    /// Whether `ancestor` is reachable from `rev` (or is `rev`).
    pub fn is_ancestor(&self, ancestor: &str, rev: &str) -> Result<bool, GitError> {
        let args = ["merge-base", "--is-ancestor", ancestor, rev];
        let out = self.output(&args)?;
        match out.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_error(&args, &out)),
        }
    }

    /// Create `branch` at `at`; fails with `AlreadyExists` if it is present.
    pub fn create_branch(&self, branch: &BranchName, at: &CommitId) -> Result<(), GitError> {
        if self.branch_exists(branch)? {
            return Err(GitError::AlreadyExists {
                what: "branch",
                name: branch.0.clone(),
            });
        }
        self.run(&["branch", branch.as_str(), at.as_str()])?;
        Ok(())
    }

    /// Point `branch` at `at`, creating it if needed.
    pub fn force_branch(&self, branch: &BranchName, at: &CommitId) -> Result<(), GitError> {
        self.run(&["branch", "-f", branch.as_str(), at.as_str()])?;
        Ok(())
    }

    pub fn delete_branch(&self, branch: &BranchName) -> Result<(), GitError> {
        if !self.branch_exists(branch)? {
            return Err(not_found("branch", branch.as_str()));
        }
        self.run(&["branch", "-D", branch.as_str()])?;
        Ok(())
    }

    /// Attach HEAD to `branch`.
    pub fn checkout(&self, branch: &BranchName) -> Result<(), GitError> {
        if !self.branch_exists(branch)? {
            return Err(not_found("branch", branch.as_str()));
        }
        self.run(&["checkout", "-q", branch.as_str()])?;
        Ok(())
    }

    /// Detach HEAD at `rev` (a branch name or commit id).
    pub fn checkout_detached(&self, rev: &str) -> Result<(), GitError> {
        self.run(&["checkout", "-q", "--detach", rev])?;
        Ok(())
    }

    /// Check `refs/heads/<branch>` is a legal ref name.
    pub fn check_ref_format(&self, branch: &BranchName) -> Result<bool, GitError> {
        self.probe(&["check-ref-format", &branch.full_ref()])
    }

    // -----------------------------------------------------------------------
    // Merge / cherry-pick
    // -----------------------------------------------------------------------

    /// Merge `branch` into HEAD, always producing a merge commit.
    pub fn merge_no_ff(&self, branch: &BranchName) -> Result<(), GitError> {
        let out = self.output(&["merge", "--no-ff", "--no-edit", "-q", branch.as_str()])?;
        if out.status.success() {
            return Ok(());
        }
        if self.operation_in_progress()? == Some(ConflictKind::Merge) {
            return Err(GitError::Conflict {
                kind: ConflictKind::Merge,
                subject: branch.0.clone(),
                worktree: self.dir.clone(),
            });
        }
        Err(command_error(&["merge", branch.as_str()], &out))
    }

    /// Apply `commit` on top of HEAD.
    pub fn cherry_pick(&self, commit: &CommitId) -> Result<(), GitError> {
        let out = self.output(&["cherry-pick", commit.as_str()])?;
        if out.status.success() {
            return Ok(());
        }
        if self.operation_in_progress()? == Some(ConflictKind::CherryPick) {
            return Err(GitError::Conflict {
                kind: ConflictKind::CherryPick,
                subject: commit.0.clone(),
                worktree: self.dir.clone(),
            });
        }
        Err(command_error(&["cherry-pick", commit.as_str()], &out))
    }

    /// Commit a cherry-pick whose conflicts the operator resolved.
    pub fn continue_cherry_pick(&self) -> Result<(), GitError> {
        self.run(&["cherry-pick", "--continue"])?;
        Ok(())
    }

    /// Commit a merge whose conflicts the operator resolved.
    pub fn conclude_merge(&self) -> Result<(), GitError> {
        self.run(&["commit", "--no-edit", "-q"])?;
        Ok(())
    }

    pub fn abort_cherry_pick(&self) -> Result<(), GitError> {
        self.run(&["cherry-pick", "--abort"])?;
        Ok(())
    }

    pub fn abort_merge(&self) -> Result<(), GitError> {
        self.run(&["merge", "--abort"])?;
        Ok(())
    }

    /// The merge or cherry-pick currently paused in this worktree, if any.
    pub fn operation_in_progress(&self) -> Result<Option<ConflictKind>, GitError> {
        if self.probe(&["rev-parse", "-q", "--verify", "MERGE_HEAD"])? {
            return Ok(Some(ConflictKind::Merge));
        }
        if self.probe(&["rev-parse", "-q", "--verify", "CHERRY_PICK_HEAD"])? {
            return Ok(Some(ConflictKind::CherryPick));
        }
        Ok(None)
    }

    /// Paths still marked as conflicted in the index.
    pub fn unmerged_paths(&self) -> Result<Vec<PathBuf>, GitError> {
        let stdout = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    // -----------------------------------------------------------------------
    // History queries
    // -----------------------------------------------------------------------

    /// Non-merge commits reachable from `tip` but from none of `exclude`,
    /// oldest first. Parents always precede their children.
    pub fn list_commits(
        &self,
        tip: &BranchName,
        exclude: &[BranchName],
    ) -> Result<Vec<Commit>, GitError> {
        let format = format!("--format=%H{FIELD_SEP}%ct{FIELD_SEP}%s");
        let mut args: Vec<String> = vec![
            "log".into(),
            "--no-merges".into(),
            "--date-order".into(),
            "--reverse".into(),
            format,
            tip.full_ref(),
        ];
        args.extend(exclude.iter().map(|b| format!("^{}", b.full_ref())));
        args.push("--".into());

        let stdout = self.run_owned(&args)?;
        stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(parse_log_line)
            .collect()
    }

    /// Count of non-merge commits reachable from `tip` but from none of `exclude`.
    pub fn count_commits(&self, tip: &BranchName, exclude: &[BranchName]) -> Result<usize, GitError> {
        let mut args: Vec<String> = vec![
            "rev-list".into(),
            "--count".into(),
            "--no-merges".into(),
            tip.full_ref(),
        ];
        args.extend(exclude.iter().map(|b| format!("^{}", b.full_ref())));
        args.push("--".into());

        let stdout = self.run_owned(&args)?;
        stdout.trim().parse().map_err(|_| GitError::Unparsable {
            context: "rev-list --count",
            output: stdout,
        })
    }

    /// Commits of `head` whose change is already present on `upstream`
    /// under a different id (`git cherry` marks them with `-`).
    pub fn patch_equivalents(
        &self,
        upstream: &BranchName,
        head: &BranchName,
    ) -> Result<HashSet<CommitId>, GitError> {
        let stdout = self.run(&["cherry", &upstream.full_ref(), &head.full_ref()])?;
        Ok(parse_cherry(&stdout))
    }

    // -----------------------------------------------------------------------
    // Worktrees
    // -----------------------------------------------------------------------

    pub fn worktrees(&self) -> Result<Vec<WorktreeInfo>, GitError> {
        let stdout = self.run(&["worktree", "list", "--porcelain"])?;
        Ok(parse_worktrees(&stdout))
    }

    /// Register a new worktree at `path` with HEAD detached at `rev`.
    pub fn add_worktree_detached(&self, path: &Path, rev: &str) -> Result<(), GitError> {
        let path_str = path.to_string_lossy();
        self.run(&["worktree", "add", "--detach", &path_str, rev])?;
        Ok(())
    }

    pub fn remove_worktree(&self, path: &Path) -> Result<(), GitError> {
        let path_str = path.to_string_lossy();
        self.run(&["worktree", "remove", "--force", &path_str])?;
        Ok(())
    }

    pub fn prune_worktrees(&self) -> Result<(), GitError> {
        self.run(&["worktree", "prune"])?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Config and working-tree state
    // -----------------------------------------------------------------------

    /// Read a repository-local config value.
    pub fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        let out = self.output(&["config", "--local", "--get", key])?;
        match out.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&out.stdout).trim_end().to_string(),
            )),
            Some(1) => Ok(None),
            _ => Err(command_error(&["config", "--get", key], &out)),
        }
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.run(&["config", "--local", key, value])?;
        Ok(())
    }

    /// Remove a repository-local config value; absent keys are not an error.
    pub fn config_unset(&self, key: &str) -> Result<(), GitError> {
        let out = self.output(&["config", "--local", "--unset", key])?;
        match out.status.code() {
            Some(0) | Some(5) => Ok(()),
            _ => Err(command_error(&["config", "--unset", key], &out)),
        }
    }

    /// True when the index or tracked files differ from HEAD.
    /// Untracked files do not count.
    pub fn is_dirty(&self) -> Result<bool, GitError> {
        let stdout = self.run(&["status", "--porcelain"])?;
        Ok(porcelain_is_dirty(&stdout))
    }

    /// `Err(DirtyWorkingTree)` when [`Git::is_dirty`].
    pub fn ensure_clean(&self) -> Result<(), GitError> {
        if self.is_dirty()? {
            return Err(GitError::DirtyWorkingTree {
                worktree: self.dir.clone(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Process plumbing
    // -----------------------------------------------------------------------

    fn output(&self, args: &[&str]) -> Result<Output, GitError> {
        tracing::debug!("git {} (in {})", args.join(" "), self.dir.display());
        Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .env("GIT_EDITOR", "true")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .output()
            .map_err(|source| GitError::Io {
                cwd: self.dir.clone(),
                source,
            })
    }

    fn probe(&self, args: &[&str]) -> Result<bool, GitError> {
        Ok(self.output(args)?.status.success())
    }

    /// Run and return trimmed stdout, or `GitError::Command` on failure.
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let out = self.output(args)?;
        if !out.status.success() {
            return Err(command_error(args, &out));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn run_owned(&self, args: &[String]) -> Result<String, GitError> {
        let borrowed: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&borrowed)
    }
}

fn command_error(args: &[&str], out: &Output) -> GitError {
    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    let stderr = if stderr.is_empty() {
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    } else {
        stderr
    };
    GitError::Command {
        args: args.join(" "),
        stderr,
    }
}

// ---------------------------------------------------------------------------
// Output parsers
// ---------------------------------------------------------------------------

fn parse_log_line(line: &str) -> Result<Commit, GitError> {
    let unparsable = || GitError::Unparsable {
        context: "git log",
        output: line.to_string(),
    };
    let mut fields = line.splitn(3, FIELD_SEP);
    let id = fields.next().filter(|s| !s.is_empty()).ok_or_else(unparsable)?;
    let secs: i64 = fields
        .next()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(unparsable)?;
    let committed_at: DateTime<Utc> = DateTime::from_timestamp(secs, 0).ok_or_else(unparsable)?;
    let summary = fields.next().unwrap_or_default().to_string();
    Ok(Commit {
        id: CommitId::from(id),
        committed_at,
        summary,
    })
}

fn parse_cherry(stdout: &str) -> HashSet<CommitId> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("- "))
        .map(|id| CommitId::from(id.trim()))
        .collect()
}

fn parse_worktrees(stdout: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    let mut current: Option<WorktreeInfo> = None;
    for line in stdout.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            worktrees.extend(current.take());
            current = Some(WorktreeInfo {
                path: PathBuf::from(path),
                head: None,
                branch: None,
            });
        } else if let Some(wt) = current.as_mut() {
            if let Some(head) = line.strip_prefix("HEAD ") {
                wt.head = Some(CommitId::from(head));
            } else if let Some(branch) = line.strip_prefix("branch ") {
                let short = branch.strip_prefix("refs/heads/").unwrap_or(branch);
                wt.branch = Some(BranchName::from(short));
            }
        }
    }
    worktrees.extend(current);
    worktrees
}

fn porcelain_is_dirty(stdout: &str) -> bool {
    stdout.lines().any(|line| {
        let mut cols = line.chars();
        let (Some(index), Some(tree)) = (cols.next(), cols.next()) else {
            return false;
        };
        "MADRCU".contains(index) || "MDU".contains(tree)
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
