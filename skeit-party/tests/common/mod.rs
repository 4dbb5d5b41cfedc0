//! Fixture repositories for party integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use skeit_core::{BranchName, PartyName};
use skeit_party::Party;
use tempfile::TempDir;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn sh_git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_EDITOR", "true")
        .output()
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// Whether `git <args>` exits zero.
pub fn git_ok(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git")
        .status
        .success()
}

pub fn commit_file(repo: &Path, file: &str, content: &str, msg: &str) -> String {
    fs::write(repo.join(file), content).expect("write file");
    sh_git(repo, &["add", file]);
    sh_git(repo, &["commit", "-q", "-m", msg]);
    sh_git(repo, &["rev-parse", "HEAD"])
}

/// Non-merge commits reachable from `rev`.
pub fn count(repo: &Path, rev: &str) -> usize {
    sh_git(repo, &["rev-list", "--count", "--no-merges", rev, "--"])
        .parse()
        .expect("count")
}

pub fn branch_exists(repo: &Path, branch: &str) -> bool {
    git_ok(
        repo,
        &["rev-parse", "--verify", "-q", &format!("refs/heads/{branch}")],
    )
}

pub fn is_ancestor(repo: &Path, ancestor: &str, rev: &str) -> bool {
    git_ok(repo, &["merge-base", "--is-ancestor", ancestor, rev])
}

pub fn b(name: &str) -> BranchName {
    BranchName::from(name)
}

pub fn p(name: &str) -> PartyName {
    PartyName::from(name)
}

/// A repository with the party test layout.
pub struct Fixture {
    // Held for its Drop; the auxiliary worktree lives inside it too.
    pub tmp: TempDir,
    pub repo: PathBuf,
}

impl Fixture {
    /// `main` with three commits, `feature1` and `feature2` each with three
    /// commits of their own on top of it. `main` is checked out.
    pub fn three_branches() -> Self {
        init_logging();
        let tmp = TempDir::new().expect("tempdir");
        let repo = tmp.path().join("repo");
        fs::create_dir_all(&repo).expect("mkdir repo");
        sh_git(&repo, &["init", "-q"]);
        sh_git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        sh_git(&repo, &["config", "user.name", "Test"]);
        sh_git(&repo, &["config", "user.email", "test@example.com"]);
        sh_git(&repo, &["config", "commit.gpgsign", "false"]);

        commit_file(&repo, "shared.txt", "base\n", "main 1");
        commit_file(&repo, "main.txt", "m2\n", "main 2");
        commit_file(&repo, "main.txt", "m3\n", "main 3");

        for feature in ["feature1", "feature2"] {
            sh_git(&repo, &["checkout", "-q", "-b", feature, "main"]);
            for i in 1..=3 {
                commit_file(
                    &repo,
                    &format!("{feature}.txt"),
                    &format!("{feature} {i}\n"),
                    &format!("{feature} {i}"),
                );
            }
        }
        sh_git(&repo, &["checkout", "-q", "main"]);
        Self { tmp, repo }
    }

    pub fn party(&self) -> Party {
        Party::open(&self.repo).expect("open party")
    }

    pub fn current_branch(&self) -> String {
        sh_git(&self.repo, &["symbolic-ref", "--short", "HEAD"])
    }

    pub fn config(&self, key: &str) -> Option<String> {
        let out = Command::new("git")
            .args(["config", "--local", "--get", key])
            .current_dir(&self.repo)
            .output()
            .expect("spawn git");
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Commit directly on `branch`, then return to the party branch.
    pub fn commit_on(&self, branch: &str, file: &str, content: &str, msg: &str) {
        let back = self.current_branch();
        sh_git(&self.repo, &["checkout", "-q", branch]);
        commit_file(&self.repo, file, content, msg);
        sh_git(&self.repo, &["checkout", "-q", &back]);
    }
}
