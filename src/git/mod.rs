//! git
//!
//! Single interface for all version-control operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. The engine is written against
//! the [`Vcs`] trait; nothing outside this module imports `git2` or runs the
//! `git` executable.
//!
//! - [`Git`] - the real repository (git2 for queries and ref writes, the
//!   `git` executable for the rebase primitive)
//! - [`MockVcs`] - an in-memory commit graph with a scripted rebase
//!   primitive, for exercising the engine without a repository
//!
//! # Invariants
//!
//! - All operations return strong types (Oid, BranchName)
//! - The primitive's own mid-rebase state is only ever observed through
//!   [`Vcs::state`], never inferred
//!
//! # Example
//!
//! ```ignore
//! use git_rbr::git::{Git, Vcs};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! for branch in git.list_branches()? {
//!     println!("{branch} -> {:?}", git.tracking_upstream(&branch)?);
//! }
//! ```

mod interface;
pub mod mock;
mod traits;

pub use interface::{Git, GitError, GitState, RepoInfo};
pub use mock::MockVcs;
pub use traits::{RebaseOutcome, Upstream, Vcs};
