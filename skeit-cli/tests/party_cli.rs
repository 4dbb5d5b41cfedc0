use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn skeit(repo: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("skeit"));
    cmd.current_dir(repo).env_remove("RUST_LOG");
    cmd
}

fn sh_git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn commit_file(repo: &Path, file: &str, content: &str, msg: &str) {
    fs::write(repo.join(file), content).expect("write file");
    sh_git(repo, &["add", file]);
    sh_git(repo, &["commit", "-q", "-m", msg]);
}

/// `main`, `feature1` and `feature2` with three commits each of their own.
fn fixture() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().expect("tempdir");
    let repo = tmp.path().join("repo");
    fs::create_dir_all(&repo).expect("mkdir repo");
    sh_git(&repo, &["init", "-q"]);
    sh_git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    sh_git(&repo, &["config", "user.name", "Test"]);
    sh_git(&repo, &["config", "user.email", "test@example.com"]);
    sh_git(&repo, &["config", "commit.gpgsign", "false"]);
    for i in 1..=3 {
        commit_file(&repo, "main.txt", &format!("main {i}\n"), &format!("main {i}"));
    }
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
    (tmp, repo)
}

fn status_json(repo: &Path) -> Value {
    let assert = skeit(repo)
        .args(["party", "status", "--json"])
        .assert()
        .success();
    serde_json::from_slice(&assert.get_output().stdout).expect("status json")
}

fn commit_counts(status: &Value) -> Vec<u64> {
    status["branches"]
        .as_array()
        .expect("branches")
        .iter()
        .map(|b| b["commits"].as_u64().expect("commits"))
        .collect()
}

#[test]
fn party_round_trip_through_cli() {
    let (_tmp, repo) = fixture();

    skeit(&repo)
        .args(["party", "start", "party1", "feature1", "feature2"])
        .assert()
        .success()
        .stdout(contains("Started party 'party1'"))
        .stdout(contains("party/party1"));

    let status = status_json(&repo);
    assert_eq!(status["party"], "party1");
    assert_eq!(status["default_branch"], "main");
    assert_eq!(commit_counts(&status), vec![3, 3, 3]);
    assert_eq!(status["branches"][0]["default"], true);
    assert_eq!(status["unique"].as_array().expect("unique").len(), 0);
    assert!(status["pending"].is_null());

    commit_file(&repo, "work.txt", "one\n", "work 1");
    commit_file(&repo, "work.txt", "one\ntwo\n", "work 2");
    let status = status_json(&repo);
    let unique: Vec<&str> = status["unique"]
        .as_array()
        .expect("unique")
        .iter()
        .map(|c| c["summary"].as_str().expect("summary"))
        .collect();
    assert_eq!(unique, vec!["work 1", "work 2"]);

    skeit(&repo)
        .args(["party", "status"])
        .assert()
        .success()
        .stdout(contains("feature2"))
        .stdout(contains("Unique commits:"))
        .stdout(contains("skeit party sync"));

    skeit(&repo)
        .args(["party", "sync"])
        .assert()
        .success()
        .stdout(contains("2 replayed"));
    let status = status_json(&repo);
    assert_eq!(commit_counts(&status), vec![5, 3, 3]);
    assert_eq!(status["unique"].as_array().expect("unique").len(), 0);

    skeit(&repo)
        .args(["party", "finish"])
        .assert()
        .success()
        .stdout(contains("Finished party 'party1'"));
    assert_eq!(sh_git(&repo, &["rev-list", "--count", "main"]), "5");
    assert_eq!(sh_git(&repo, &["symbolic-ref", "--short", "HEAD"]), "main");
    assert_eq!(
        sh_git(&repo, &["branch", "--list", "party/*"]),
        "",
        "party branch left behind"
    );

    skeit(&repo)
        .args(["party", "status"])
        .assert()
        .failure()
        .stderr(contains("NoActiveParty"))
        .stderr(contains("skeit party start"));
}

#[test]
fn start_on_existing_branch_fails_with_kind() {
    let (_tmp, repo) = fixture();
    sh_git(&repo, &["branch", "party/party1", "main"]);
    skeit(&repo)
        .args(["party", "start", "party1", "feature1"])
        .assert()
        .failure()
        .stderr(contains("AlreadyExists"));
    assert_eq!(sh_git(&repo, &["symbolic-ref", "--short", "HEAD"]), "main");
}

#[test]
fn dirty_tree_is_reported() {
    let (_tmp, repo) = fixture();
    fs::write(repo.join("main.txt"), "uncommitted\n").expect("edit");
    skeit(&repo)
        .args(["party", "start", "party1", "feature1"])
        .assert()
        .failure()
        .stderr(contains("DirtyWorkingTree"))
        .stderr(contains("Commit or stash"));
}

#[test]
fn missing_member_is_not_found() {
    let (_tmp, repo) = fixture();
    skeit(&repo)
        .args(["party", "start", "party1", "nope"])
        .assert()
        .failure()
        .stderr(contains("NotFound"))
        .stderr(contains("nope"));
}

#[test]
fn add_and_default_report_changes() {
    let (_tmp, repo) = fixture();
    skeit(&repo)
        .args(["party", "start", "party1", "feature1"])
        .assert()
        .success();
    skeit(&repo)
        .args(["party", "add", "feature2"])
        .assert()
        .success()
        .stdout(contains("Added 'feature2'"));
    skeit(&repo)
        .args(["party", "add", "feature2"])
        .assert()
        .success()
        .stdout(contains("already part of the party"));
    skeit(&repo)
        .args(["party", "default", "feature1"])
        .assert()
        .success()
        .stdout(contains("merge order: feature1, main, feature2"));

    assert_eq!(status_json(&repo)["default_branch"], "feature1");
}

#[test]
fn conflict_points_to_continue_and_abort() {
    let (_tmp, repo) = fixture();
    skeit(&repo)
        .args(["party", "start", "party1", "feature1"])
        .assert()
        .success();
    commit_file(&repo, "main.txt", "from party\n", "party edit");
    sh_git(&repo, &["checkout", "-q", "main"]);
    commit_file(&repo, "main.txt", "from main\n", "main edit");
    sh_git(&repo, &["checkout", "-q", "party/party1"]);

    skeit(&repo)
        .args(["party", "sync"])
        .assert()
        .failure()
        .stderr(contains("Conflict"))
        .stderr(contains("skeit party continue"));

    let status = status_json(&repo);
    assert_eq!(status["pending"]["op"], "replay");
    skeit(&repo)
        .args(["party", "sync"])
        .assert()
        .failure()
        .stderr(contains("Conflict"));
    skeit(&repo)
        .args(["party", "add", "feature2"])
        .assert()
        .failure()
        .stderr(contains("Paused"));

    skeit(&repo)
        .args(["party", "abort"])
        .assert()
        .success()
        .stdout(contains("Aborted replay"));
    skeit(&repo)
        .args(["party", "continue"])
        .assert()
        .success()
        .stdout(contains("Nothing to continue."));
}

#[test]
fn sync_off_the_party_branch_says_how_to_return() {
    let (_tmp, repo) = fixture();
    skeit(&repo)
        .args(["party", "start", "party1", "feature1"])
        .assert()
        .success();
    sh_git(&repo, &["checkout", "-q", "main"]);

    skeit(&repo)
        .args(["party", "sync"])
        .assert()
        .failure()
        .stderr(contains("NotOnPartyBranch"))
        .stderr(contains("git checkout party/party1"));
    assert!(status_json(&repo)["pending"].is_null());
}

#[test]
fn quiet_suppresses_progress_logging() {
    let (_tmp, repo) = fixture();
    skeit(&repo)
        .args(["party", "start", "party1", "feature1"])
        .assert()
        .success()
        .stderr(contains("creating party 'party1'"));
    skeit(&repo)
        .args(["-q", "party", "sync"])
        .assert()
        .success()
        .stderr(predicates::str::is_empty());
}

#[test]
fn outside_a_repository_fails() {
    let tmp = TempDir::new().expect("tempdir");
    skeit(tmp.path())
        .args(["party", "status"])
        .assert()
        .failure()
        .stderr(contains("error:"));
}
