//! core::paths
//!
//! Centralized path routing for the engine's on-disk state.
//!
//! All state is repo-scoped and lives under `<common_dir>/rbr/`, so linked
//! worktrees share one session and one lock. It is deliberately separate
//! from git's own `rebase-merge/` / `rebase-apply/` directories: the session
//! wraps a sequence of single-branch rebases and is tracked independently.
//!
//! # Storage Layout
//!
//! - `config.toml` - Repository configuration
//! - `lock` - Exclusive lock file
//! - `session.json` - The in-progress multi-branch rebase session
//! - `session.json.tmp` - Staging file for atomic session writes
//!
//! # Example
//!
//! ```
//! use git_rbr::core::paths::RbrPaths;
//! use std::path::PathBuf;
//!
//! let paths = RbrPaths::new(PathBuf::from("/repo/.git"), PathBuf::from("/repo/.git"));
//! assert_eq!(paths.session_path(), PathBuf::from("/repo/.git/rbr/session.json"));
//! ```

use std::path::{Path, PathBuf};

use crate::git::RepoInfo;

/// Path routing for engine storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbrPaths {
    /// Per-worktree git directory.
    pub git_dir: PathBuf,
    /// Shared git directory; equals `git_dir` outside linked worktrees.
    pub common_dir: PathBuf,
}

impl RbrPaths {
    pub fn new(git_dir: PathBuf, common_dir: PathBuf) -> Self {
        Self {
            git_dir,
            common_dir,
        }
    }

    /// Build paths for an opened repository.
    pub fn from_repo_info(info: &RepoInfo) -> Self {
        Self::new(info.git_dir.clone(), info.common_dir.clone())
    }

    /// `<common_dir>/rbr`
    pub fn state_dir(&self) -> PathBuf {
        self.common_dir.join("rbr")
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join("config.toml")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("lock")
    }

    pub fn session_path(&self) -> PathBuf {
        self.state_dir().join("session.json")
    }

    /// Staging file renamed over [`session_path`](Self::session_path).
    ///
    /// Must be in the same directory so the rename stays on one filesystem.
    pub fn session_tmp_path(&self) -> PathBuf {
        self.state_dir().join("session.json.tmp")
    }

    pub fn is_worktree(&self) -> bool {
        self.git_dir != self.common_dir
    }

    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }
}
