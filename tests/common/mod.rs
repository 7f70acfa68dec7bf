//! Real-repository fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use git_rbr::engine::{Action, Context, RbrError, Repo, RunOutcome};

/// A throwaway repository on `master` with a fixed identity.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create an empty repository. No commits yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init", "--quiet"]);
        run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/master"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);
        run_git(dir.path(), &["config", "commit.gpgsign", "false"]);
        run_git(dir.path(), &["config", "core.editor", "true"]);
        run_git(dir.path(), &["config", "advice.detachedHead", "false"]);

        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run git and return trimmed stdout. Panics on failure.
    pub fn git(&self, args: &[&str]) -> String {
        run_git(self.path(), args)
    }

    /// Run git and report whether it succeeded.
    pub fn try_git(&self, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(self.path())
            .env("GIT_EDITOR", "true")
            .output()
            .expect("failed to spawn git")
            .status
            .success()
    }

    /// Commit a file named after `message` containing `message`.
    pub fn testci(&self, message: &str) {
        self.testci_file(message, message);
    }

    /// Commit `file` containing `message`.
    pub fn testci_file(&self, message: &str, file: &str) {
        let path = self.path().join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, format!("{message}\n")).unwrap();
        self.git(&["add", file]);
        self.git(&["commit", "--quiet", "-m", message]);
    }

    /// `git checkout --track -b <name>`: a new branch tracking the current one.
    pub fn branch_here(&self, name: &str) {
        self.git(&["checkout", "--quiet", "--track", "-b", name]);
    }

    pub fn checkout(&self, name: &str) {
        self.git(&["checkout", "--quiet", name]);
    }

    pub fn rev(&self, rev: &str) -> String {
        self.git(&["rev-parse", rev])
    }

    pub fn head_branch(&self) -> Option<String> {
        let out = Command::new("git")
            .args(["symbolic-ref", "--quiet", "--short", "HEAD"])
            .current_dir(self.path())
            .output()
            .expect("failed to spawn git");
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Subjects of `upstream..branch`, oldest first.
    pub fn subjects_between(&self, upstream: &str, branch: &str) -> Vec<String> {
        self.git(&[
            "log",
            "--pretty=format:%s",
            "--reverse",
            &format!("{upstream}..{branch}"),
        ])
        .lines()
        .map(str::to_string)
        .collect()
    }

    /// Whether `branch` contains everything reachable from `upstream`.
    pub fn is_atop(&self, upstream: &str, branch: &str) -> bool {
        self.git(&[
            "rev-list",
            "--count",
            "--max-count=1",
            upstream,
            "--not",
            branch,
            "--",
        ]) == "0"
    }

    /// Every branch other than `master` sits on its configured upstream.
    pub fn assert_updated(&self) {
        for branch in self.branches() {
            if branch == "master" {
                continue;
            }
            assert!(
                self.is_atop(&format!("{branch}@{{u}}"), &branch),
                "{branch} is not atop its upstream"
            );
        }
    }

    pub fn branches(&self) -> Vec<String> {
        self.git(&["for-each-ref", "--format=%(refname:short)", "refs/heads/"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// `(branch, tip)` for every local branch.
    pub fn tips(&self) -> Vec<(String, String)> {
        self.branches()
            .into_iter()
            .map(|b| {
                let tip = self.rev(&b);
                (b, tip)
            })
            .collect()
    }

    pub fn session_file(&self) -> std::path::PathBuf {
        self.path().join(".git").join("rbr").join("session.json")
    }

    pub fn rebase_in_progress(&self) -> bool {
        let git_dir = self.path().join(".git");
        git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
    }

    /// Run the engine the way the binary does, in a fresh process-like
    /// context each time.
    pub fn rbr(&self, action: Action) -> Result<RunOutcome, RbrError> {
        let ctx = Context {
            cwd: Some(self.path().to_path_buf()),
            ..Context::default()
        };
        Repo::open(&ctx)?.run(action)
    }

    pub fn rbr_start(&self) -> Result<RunOutcome, RbrError> {
        self.rbr(Action::Start { branch: None })
    }
}

/// Run a git command in `dir`, panicking with stderr on failure.
pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_EDITOR", "true")
        .output()
        .expect("git command failed to spawn");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// master <- a <- b <- c; master, a and b advanced; `a` checked out.
pub fn simple() -> TestRepo {
    let repo = TestRepo::new();
    repo.testci("master");
    repo.branch_here("a");
    repo.testci("a");
    repo.branch_here("b");
    repo.testci("b");
    repo.branch_here("c");
    repo.testci("c");
    repo.checkout("master");
    repo.testci("master2");
    repo.checkout("a");
    repo.testci("a2");
    repo.checkout("b");
    repo.testci("b2");
    repo.checkout("a");
    repo
}

/// master <- a <- {b, c}; master and a advanced; `a` checked out.
pub fn fork() -> TestRepo {
    let repo = TestRepo::new();
    repo.testci("master");
    repo.branch_here("a");
    repo.testci("a");
    repo.branch_here("b");
    repo.testci("b");
    repo.checkout("a");
    repo.branch_here("c");
    repo.testci("c");
    repo.checkout("master");
    repo.testci("master2");
    repo.checkout("a");
    repo.testci("a2");
    repo
}

/// master <- a <- b <- ab <- c; master and a advanced. Commit `ab`
/// rewrites file `a`, which `aa` also rewrites, so replaying `ab`
/// conflicts. `a` checked out.
pub fn conflicted() -> TestRepo {
    let repo = TestRepo::new();
    repo.testci("master");
    repo.branch_here("a");
    repo.testci("a");
    repo.branch_here("b");
    repo.testci("b");
    repo.branch_here("ab");
    repo.testci_file("ab", "a");
    repo.branch_here("c");
    repo.testci("c");
    repo.checkout("master");
    repo.testci("master2");
    repo.checkout("a");
    repo.testci_file("aa", "a");
    repo
}
