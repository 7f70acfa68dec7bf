//! git::traits
//!
//! The version-control seam the engine is written against.
//!
//! The engine never talks to a repository directly. Everything it needs,
//! from tracking lookups to the single-branch rebase primitive, goes
//! through [`Vcs`]. [`Git`](super::Git) is the real implementation and
//! [`MockVcs`](super::MockVcs) the in-memory one used by the orchestrator
//! tests.
//!
//! # Two levels of state
//!
//! A rebase started through [`Vcs::rebase`] may stop on a conflict and stay
//! stopped across process exits. That state belongs to the primitive and is
//! observed through [`Vcs::state`]; the engine's own session only records
//! which branch was handed to it.

use crate::core::types::{BranchName, Oid};

use super::{GitError, GitState};

/// What a branch is configured to track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// No tracking configuration.
    None,
    /// Tracks another local branch (`branch.<name>.remote = .`).
    Local(BranchName),
    /// Tracks a remote-tracking branch. Such branches are roots.
    Remote { remote: String, merge: String },
}

/// Result of asking the primitive to replay commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// The branch now points at this commit.
    Success(Oid),
    /// The primitive stopped while replaying `at`.
    Conflict { at: Option<Oid> },
}

/// Operations the engine needs from the host version-control system.
pub trait Vcs {
    /// Local branches, in enumeration order.
    fn list_branches(&self) -> Result<Vec<BranchName>, GitError>;

    /// Tracking configuration of `branch`.
    ///
    /// # Errors
    ///
    /// [`GitError::TrackingConfig`] when the configuration is present but
    /// does not determine an upstream.
    fn tracking_upstream(&self, branch: &BranchName) -> Result<Upstream, GitError>;

    /// Current tip of `branch`.
    fn tip(&self, branch: &BranchName) -> Result<Oid, GitError>;

    /// Commits reachable from `branch` but not from `base`, oldest first.
    fn unique_commits(&self, branch: &BranchName, base: &Oid) -> Result<Vec<Oid>, GitError>;

    /// Whether `ancestor` is reachable from `descendant` (or equal to it).
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError>;

    /// Replay the commits of `branch` not reachable from `base` onto `onto`.
    fn rebase(&self, branch: &BranchName, onto: &Oid, base: &Oid)
        -> Result<RebaseOutcome, GitError>;

    /// Conclude the stopped replay step with whatever the user staged.
    fn continue_rebase(&self) -> Result<RebaseOutcome, GitError>;

    /// Drop the stopped replay step and carry on with the rest.
    fn skip_current_step(&self) -> Result<RebaseOutcome, GitError>;

    /// Abandon the single-branch rebase in progress.
    fn abort_rebase_in_progress(&self) -> Result<(), GitError>;

    /// Point `branch` at `oid` unconditionally.
    fn force_set_branch_ref(&self, branch: &BranchName, oid: &Oid) -> Result<(), GitError>;

    /// In-progress operation, if any.
    fn state(&self) -> GitState;

    /// Checked-out branch; `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<BranchName>, GitError>;

    /// No staged or unstaged changes to tracked files.
    fn is_worktree_clean(&self) -> Result<bool, GitError>;

    fn checkout(&self, branch: &BranchName) -> Result<(), GitError>;

    /// Detach HEAD at its current commit, leaving the worktree alone.
    fn detach_head(&self) -> Result<(), GitError>;
}
