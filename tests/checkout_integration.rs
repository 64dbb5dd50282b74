//! End-to-end checkout tests against a local upstream repository.
//!
//! The upstream is served over `file://` so the full fetch/checkout path
//! runs through real git, with `HOME` pointed at a scratch directory so
//! global git config and the credential store never touch the real user.

use anyhow::Result;
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    /// Keeps the scratch tree alive for the duration of the test.
    _root: TempDir,
    home: PathBuf,
    server_root: PathBuf,
    upstream: PathBuf,
    workspace: PathBuf,
    sha: String,
}

fn git(dir: &Path, home: &Path, args: &[&str]) -> Result<String> {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("HOME", home)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()?;
    anyhow::ensure!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn setup() -> Result<Fixture> {
    let root = TempDir::new()?;
    let home = root.path().join("home");
    let server_root = root.path().join("repos");
    let upstream = server_root.join("owner").join("upstream");
    let workspace = root.path().join("workspace");
    fs::create_dir_all(&home)?;
    fs::create_dir_all(&upstream)?;

    git(&upstream, &home, &["init"])?;
    git(&upstream, &home, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    git(&upstream, &home, &["config", "user.email", "ci@example.com"])?;
    git(&upstream, &home, &["config", "user.name", "CI"])?;
    // Checkouts fetch by exact SHA, which upload-pack rejects by default
    git(
        &upstream,
        &home,
        &["config", "uploadpack.allowAnySHA1InWant", "true"],
    )?;

    fs::write(upstream.join("README.md"), "hello\n")?;
    git(&upstream, &home, &["add", "."])?;
    git(&upstream, &home, &["commit", "-m", "initial commit"])?;
    let sha = git(&upstream, &home, &["rev-parse", "HEAD"])?;

    Ok(Fixture {
        _root: root,
        home,
        server_root,
        upstream,
        workspace,
        sha,
    })
}

fn run_checkout(fixture: &Fixture, git_ref: &str, sha: &str, persist: &str) -> Command {
    let server_url = format!("file://{}", fixture.server_root.display());
    let mut cmd = Command::cargo_bin("ci-checkout").unwrap();
    cmd.arg("run")
        .arg("--server-url")
        .arg(&server_url)
        .arg("--repository")
        .arg("owner/upstream")
        .arg("--ref")
        .arg(git_ref)
        .arg("--sha")
        .arg(sha)
        .arg("--token")
        .arg("test-token")
        .arg("--persist-credentials")
        .arg(persist)
        .arg("--workspace")
        .arg(&fixture.workspace)
        .env("HOME", &fixture.home)
        .env("GIT_CONFIG_NOSYSTEM", "1");
    cmd
}

#[test]
fn test_branch_checkout_lands_on_local_branch() -> Result<()> {
    let fixture = setup()?;

    run_checkout(&fixture, "refs/heads/main", &fixture.sha, "false")
        .assert()
        .success();

    assert!(fixture.workspace.join("README.md").exists());

    let head = git(&fixture.workspace, &fixture.home, &["rev-parse", "HEAD"])?;
    assert_eq!(head, fixture.sha);

    let branch = git(
        &fixture.workspace,
        &fixture.home,
        &["rev-parse", "--abbrev-ref", "HEAD"],
    )?;
    assert_eq!(branch, "main");

    let remote_ref = git(
        &fixture.workspace,
        &fixture.home,
        &["rev-parse", "refs/remotes/origin/main"],
    )?;
    assert_eq!(remote_ref, fixture.sha);

    Ok(())
}

#[test]
fn test_fetch_is_shallow() -> Result<()> {
    let fixture = setup()?;

    // Second commit so a full clone would have depth 2
    fs::write(fixture.upstream.join("second.txt"), "more\n")?;
    git(&fixture.upstream, &fixture.home, &["add", "."])?;
    git(&fixture.upstream, &fixture.home, &["commit", "-m", "second"])?;
    let tip = git(&fixture.upstream, &fixture.home, &["rev-parse", "HEAD"])?;

    run_checkout(&fixture, "refs/heads/main", &tip, "false")
        .assert()
        .success();

    assert!(fixture.workspace.join(".git/shallow").exists());
    let count = git(
        &fixture.workspace,
        &fixture.home,
        &["rev-list", "--count", "HEAD"],
    )?;
    assert_eq!(count, "1");

    Ok(())
}

#[test]
fn test_pull_request_checkout_is_detached() -> Result<()> {
    let fixture = setup()?;

    run_checkout(&fixture, "refs/pull/42/merge", &fixture.sha, "false")
        .assert()
        .success();

    let head = git(&fixture.workspace, &fixture.home, &["rev-parse", "HEAD"])?;
    assert_eq!(head, fixture.sha);

    // Detached HEAD: abbrev-ref falls back to the literal "HEAD"
    let branch = git(
        &fixture.workspace,
        &fixture.home,
        &["rev-parse", "--abbrev-ref", "HEAD"],
    )?;
    assert_eq!(branch, "HEAD");

    let pull_ref = git(
        &fixture.workspace,
        &fixture.home,
        &["rev-parse", "refs/remotes/pull42/merge"],
    )?;
    assert_eq!(pull_ref, fixture.sha);

    Ok(())
}

#[test]
fn test_second_run_updates_to_new_commit() -> Result<()> {
    let fixture = setup()?;

    run_checkout(&fixture, "refs/heads/main", &fixture.sha, "false")
        .assert()
        .success();

    // Upstream moves forward; the same workspace must follow
    fs::write(fixture.upstream.join("update.txt"), "updated\n")?;
    git(&fixture.upstream, &fixture.home, &["add", "."])?;
    git(&fixture.upstream, &fixture.home, &["commit", "-m", "update"])?;
    let new_sha = git(&fixture.upstream, &fixture.home, &["rev-parse", "HEAD"])?;

    run_checkout(&fixture, "refs/heads/main", &new_sha, "false")
        .assert()
        .success();

    let head = git(&fixture.workspace, &fixture.home, &["rev-parse", "HEAD"])?;
    assert_eq!(head, new_sha);
    assert!(fixture.workspace.join("update.txt").exists());

    Ok(())
}

#[test]
fn test_credentials_absent_after_run_without_persistence() -> Result<()> {
    let fixture = setup()?;

    run_checkout(&fixture, "refs/heads/main", &fixture.sha, "false")
        .assert()
        .success();

    assert!(!fixture.home.join(".git-credentials").exists());

    Ok(())
}

#[test]
fn test_missing_repository_fails_fast() -> Result<()> {
    let fixture = setup()?;

    let server_url = format!("file://{}", fixture.server_root.display());
    let mut cmd = Command::cargo_bin("ci-checkout").unwrap();
    cmd.arg("run")
        .arg("--server-url")
        .arg(&server_url)
        .arg("--repository")
        .arg("owner/missing")
        .arg("--ref")
        .arg("refs/heads/main")
        .arg("--sha")
        .arg(&fixture.sha)
        .arg("--token")
        .arg("test-token")
        .arg("--persist-credentials")
        .arg("false")
        .arg("--workspace")
        .arg(&fixture.workspace)
        .env("HOME", &fixture.home)
        .env("GIT_CONFIG_NOSYSTEM", "1");

    // A nonexistent repository is a permanent failure; it must abort
    // immediately instead of sleeping through the whole backoff budget.
    let started = std::time::Instant::now();
    cmd.assert().failure();
    assert!(started.elapsed() < std::time::Duration::from_secs(30));

    Ok(())
}

#[test]
fn test_detached_head_advice_is_disabled() -> Result<()> {
    let fixture = setup()?;

    run_checkout(&fixture, "refs/pull/7/head", &fixture.sha, "false")
        .assert()
        .success();

    let advice = git(
        &fixture.workspace,
        &fixture.home,
        &["config", "--global", "advice.detachedHead"],
    )?;
    assert_eq!(advice, "false");

    let gc = git(&fixture.workspace, &fixture.home, &["config", "gc.auto"])?;
    assert_eq!(gc, "0");

    Ok(())
}
