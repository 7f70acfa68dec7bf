//! git::interface
//!
//! The real [`Vcs`] implementation.
//!
//! Queries and ref writes go through `git2`. The rebase primitive itself is
//! the `git` executable: replaying commits, three-way merges and the
//! stopped-on-conflict state are left entirely to it, and its progress is
//! read back through [`Git::state`].
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::TrackingConfig`]: Tracking configuration is inconsistent
//! - [`GitError::CommandFailed`]: The `git` executable failed for a reason
//!   other than a conflict
//!
//! # Example
//!
//! ```ignore
//! use git_rbr::git::{Git, Vcs};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let branch = git.current_branch()?.expect("on a branch");
//! println!("{} is at {}", branch, git.tip(&branch)?.short(7));
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::core::types::{BranchName, Oid, TypeError};

use super::traits::{RebaseOutcome, Upstream, Vcs};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// `branch.<name>.remote` / `branch.<name>.merge` do not determine an
    /// upstream.
    #[error("tracking configuration of '{branch}': {message}")]
    TrackingConfig {
        /// The branch whose configuration is inconsistent
        branch: String,
        /// What is wrong with it
        message: String,
    },

    /// The `git` executable could not be run or failed without leaving a
    /// rebase in progress.
    #[error("git {args} failed: {message}")]
    CommandFailed {
        /// The arguments passed to git
        args: String,
        /// Exit status or spawn error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Per-worktree git directory
    pub git_dir: PathBuf,
    /// Shared git directory (differs from `git_dir` in linked worktrees)
    pub common_dir: PathBuf,
    /// Path to working directory
    pub work_dir: PathBuf,
}

/// State of in-progress Git operations.
///
/// This enum represents the various states a Git repository can be in
/// when an operation is paused (usually due to conflicts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,

    /// Rebase in progress.
    Rebase {
        /// Current step in the rebase (1-indexed), if available.
        current: Option<usize>,
        /// Total steps in the rebase, if available.
        total: Option<usize>,
    },

    Merge,
    CherryPick,
    Revert,
    Bisect,
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// # Example
    ///
    /// ```
    /// use git_rbr::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Merge.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    pub fn is_rebase(&self) -> bool {
        matches!(self, GitState::Rebase { .. })
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase { .. } => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitState::Rebase {
                current: Some(c),
                total: Some(t),
            } => write!(f, "rebase ({}/{})", c, t),
            _ => write!(f, "{}", self.description()),
        }
    }
}

/// The real repository.
pub struct Git {
    repo: git2::Repository,
    work_dir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        let work_dir = match repo.workdir() {
            Some(dir) if !repo.is_bare() => dir.to_path_buf(),
            _ => return Err(GitError::BareRepo),
        };

        Ok(Self { repo, work_dir })
    }

    pub fn info(&self) -> RepoInfo {
        RepoInfo {
            git_dir: self.repo.path().to_path_buf(),
            common_dir: self.repo.commondir().to_path_buf(),
            work_dir: self.work_dir.clone(),
        }
    }

    /// Read rebase progress from `rebase-merge/` or `rebase-apply/`.
    fn read_rebase_progress(&self) -> (Option<usize>, Option<usize>) {
        let git_dir = self.repo.path();
        let read = |path: PathBuf| -> Option<usize> {
            std::fs::read_to_string(path)
                .ok()
                .and_then(|s| s.trim().parse().ok())
        };

        let rebase_merge = git_dir.join("rebase-merge");
        if rebase_merge.exists() {
            return (read(rebase_merge.join("msgnum")), read(rebase_merge.join("end")));
        }

        let rebase_apply = git_dir.join("rebase-apply");
        if rebase_apply.exists() {
            return (read(rebase_apply.join("next")), read(rebase_apply.join("last")));
        }

        (None, None)
    }

    fn to_git2_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
        git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    fn from_git2_oid(oid: git2::Oid) -> Result<Oid, GitError> {
        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();
        Self::from_git2_oid(oid)
    }

    /// The commit the primitive stopped on.
    fn stopped_at(&self) -> Option<Oid> {
        let object = self.repo.revparse_single("REBASE_HEAD").ok()?;
        Self::from_git2_oid(object.id()).ok()
    }

    /// Run `git` in the working directory with inherited output.
    ///
    /// Returns whether git exited successfully. Only a failure to spawn is
    /// an error here; callers decide what a non-zero exit means.
    fn run(&self, args: &[&str]) -> Result<bool, GitError> {
        tracing::debug!(args = ?args, "running git");
        let status = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .env("GIT_EDITOR", "true")
            .status()
            .map_err(|e| GitError::CommandFailed {
                args: args.join(" "),
                message: e.to_string(),
            })?;
        Ok(status.success())
    }

    fn run_checked(&self, args: &[&str]) -> Result<(), GitError> {
        if self.run(args)? {
            Ok(())
        } else {
            Err(GitError::CommandFailed {
                args: args.join(" "),
                message: "non-zero exit status".to_string(),
            })
        }
    }

    /// Classify how a rebase invocation ended.
    fn rebase_outcome(&self, succeeded: bool, args: &[&str]) -> Result<RebaseOutcome, GitError> {
        if self.state().is_rebase() {
            return Ok(RebaseOutcome::Conflict {
                at: self.stopped_at(),
            });
        }
        if !succeeded {
            return Err(GitError::CommandFailed {
                args: args.join(" "),
                message: "non-zero exit status".to_string(),
            });
        }
        Ok(RebaseOutcome::Success(self.head_oid()?))
    }

    fn config_string(config: &git2::Config, key: &str) -> Result<Option<String>, GitError> {
        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, key)),
        }
    }
}

impl Vcs for Git {
    fn list_branches(&self) -> Result<Vec<BranchName>, GitError> {
        let branches = self.repo.branches(Some(git2::BranchType::Local))?;

        let mut names = Vec::new();
        for branch in branches {
            let (branch, _) = branch?;
            if let Some(name) = branch.name().ok().flatten() {
                match BranchName::new(name) {
                    Ok(branch_name) => names.push(branch_name),
                    Err(e) => tracing::warn!("ignoring branch: {e}"),
                }
            }
        }

        Ok(names)
    }

    fn tracking_upstream(&self, branch: &BranchName) -> Result<Upstream, GitError> {
        let config = self.repo.config()?.snapshot()?;
        let remote = Self::config_string(&config, &format!("branch.{branch}.remote"))?;
        let merge = Self::config_string(&config, &format!("branch.{branch}.merge"))?;

        let invalid = |message: String| GitError::TrackingConfig {
            branch: branch.to_string(),
            message,
        };

        match (remote, merge) {
            (None, None) => Ok(Upstream::None),
            (Some(remote), None) => Err(invalid(format!(
                "remote is '{remote}' but branch.{branch}.merge is not set"
            ))),
            (None, Some(merge)) => Err(invalid(format!(
                "merge is '{merge}' but branch.{branch}.remote is not set"
            ))),
            (Some(remote), Some(merge)) if remote == "." => {
                let name = merge.strip_prefix("refs/heads/").ok_or_else(|| {
                    invalid(format!("local upstream '{merge}' is not a branch"))
                })?;
                let upstream = BranchName::new(name).map_err(|e| invalid(e.to_string()))?;
                if self.repo.find_reference(&upstream.refname()).is_err() {
                    return Err(invalid(format!(
                        "upstream branch '{upstream}' does not exist"
                    )));
                }
                Ok(Upstream::Local(upstream))
            }
            (Some(remote), Some(merge)) => Ok(Upstream::Remote { remote, merge }),
        }
    }

    fn tip(&self, branch: &BranchName) -> Result<Oid, GitError> {
        let refname = branch.refname();
        let reference = self
            .repo
            .find_reference(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, &refname))?
            .id();
        Self::from_git2_oid(oid)
    }

    fn unique_commits(&self, branch: &BranchName, base: &Oid) -> Result<Vec<Oid>, GitError> {
        let tip = Self::to_git2_oid(&self.tip(branch)?)?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)?;
        revwalk.push(tip)?;
        revwalk.hide(Self::to_git2_oid(base)?)?;

        revwalk
            .map(|oid| Self::from_git2_oid(oid?))
            .collect()
    }

    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self
            .repo
            .graph_descendant_of(Self::to_git2_oid(descendant)?, Self::to_git2_oid(ancestor)?)?)
    }

    fn rebase(
        &self,
        branch: &BranchName,
        onto: &Oid,
        base: &Oid,
    ) -> Result<RebaseOutcome, GitError> {
        // Other branches pointing into the replayed range stay where they are.
        let args = [
            "-c",
            "rebase.updateRefs=false",
            "rebase",
            "--onto",
            onto.as_str(),
            base.as_str(),
            branch.as_str(),
        ];
        let succeeded = self.run(&args)?;
        self.rebase_outcome(succeeded, &args)
    }

    fn continue_rebase(&self) -> Result<RebaseOutcome, GitError> {
        let args = ["rebase", "--continue"];
        let succeeded = self.run(&args)?;
        self.rebase_outcome(succeeded, &args)
    }

    fn skip_current_step(&self) -> Result<RebaseOutcome, GitError> {
        let args = ["rebase", "--skip"];
        let succeeded = self.run(&args)?;
        self.rebase_outcome(succeeded, &args)
    }

    fn abort_rebase_in_progress(&self) -> Result<(), GitError> {
        self.run_checked(&["rebase", "--abort"])
    }

    fn force_set_branch_ref(&self, branch: &BranchName, oid: &Oid) -> Result<(), GitError> {
        let refname = branch.refname();
        self.repo
            .reference(
                &refname,
                Self::to_git2_oid(oid)?,
                true,
                &format!("rbr: reset {branch} to {}", oid.short(12)),
            )
            .map_err(|e| GitError::from_git2(e, &refname))?;
        Ok(())
    }

    fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => {
                let (current, total) = self.read_rebase_progress();
                GitState::Rebase { current, total }
            }
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None)
    }

    fn is_worktree_clean(&self) -> Result<bool, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);

        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(statuses.iter().all(|entry| {
            let status = entry.status();
            !(status.is_conflicted()
                || status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
                || status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange())
        }))
    }

    fn checkout(&self, branch: &BranchName) -> Result<(), GitError> {
        self.run_checked(&["checkout", "--quiet", branch.as_str()])
    }

    fn detach_head(&self) -> Result<(), GitError> {
        self.run_checked(&["checkout", "--quiet", "--detach"])
    }
}
