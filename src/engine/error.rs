//! engine::error
//!
//! Error taxonomy for the rebase engine.
//!
//! Configuration-level errors ([`RbrError::Config`], [`RbrError::Cycle`],
//! the pre-flight checks) are always raised before any branch ref or
//! session file is touched. A conflict is not an error at all; see
//! [`RunOutcome::Conflicted`](super::RunOutcome::Conflicted).

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::ops::{LockError, SessionError};
use crate::core::types::{BranchName, UtcTimestamp};
use crate::git::GitError;

/// Errors from the rebase engine.
#[derive(Debug, Error)]
pub enum RbrError {
    /// Tracking or tool configuration does not determine a plan.
    #[error("configuration error: {0}")]
    Config(String),

    /// The upstream relation loops.
    #[error("upstream cycle: {}", format_cycle(.0))]
    Cycle(Vec<BranchName>),

    #[error("no rebase session in progress")]
    NoActiveSession,

    /// A fresh run was requested while a session is suspended.
    #[error(
        "a rebase session started at {started} is in progress; \
         use 'git rbr --continue', 'git rbr --skip' or 'git rbr --abort'"
    )]
    SessionExists { started: UtcTimestamp },

    #[error("working tree has uncommitted changes to tracked files")]
    DirtyWorktree,

    /// Some git operation other than ours is underway.
    #[error("a git {0} is in progress; finish or abort it first")]
    OperationInProgress(String),

    #[error("no rebase step is stopped, so there is nothing to skip; use 'git rbr --continue'")]
    NothingToSkip,

    /// A repository query failed outside of any session.
    #[error(transparent)]
    Git(#[from] GitError),

    /// The rebase primitive failed for a reason other than a conflict.
    ///
    /// The session is left on disk so the user can still abort.
    #[error("{0} (session state is preserved; 'git rbr --abort' restores all branches)")]
    Primitive(GitError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl From<ConfigError> for RbrError {
    fn from(err: ConfigError) -> Self {
        RbrError::Config(err.to_string())
    }
}

fn format_cycle(branches: &[BranchName]) -> String {
    let mut names: Vec<&str> = branches.iter().map(BranchName::as_str).collect();
    if let Some(first) = names.first().copied() {
        names.push(first);
    }
    names.join(" -> ")
}
