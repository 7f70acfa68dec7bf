//! engine
//!
//! Orchestrates a multi-branch rebase: Build -> Plan -> (Step, Checkpoint)* -> Finish.
//!
//! # Architecture
//!
//! - [`build`] - Branch Graph Builder (tracking configuration to forest)
//! - [`plan`] - Traversal Planner (forest to ordered plan)
//! - [`step`] - Step Executor (one branch, one primitive call)
//! - [`orchestrator`] - the session state machine behind the fresh run,
//!   `--continue`, `--skip` and `--abort`
//! - [`error`] - the error taxonomy
//!
//! # Invariants
//!
//! - Configuration errors and cycles are reported before any mutation
//! - The session is checkpointed before and after every primitive call
//! - Original tips are persisted before the first branch is touched
//!
//! # Example
//!
//! ```ignore
//! use git_rbr::engine::{Action, Context, Repo, RunOutcome};
//!
//! let repo = Repo::open(&Context::default())?;
//! match repo.run(Action::Start { branch: None })? {
//!     RunOutcome::Conflicted { branch, .. } => println!("stopped on {branch}"),
//!     _ => {}
//! }
//! ```

pub mod build;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod step;

pub use error::RbrError;
pub use orchestrator::{Action, Orchestrator, RunOutcome};

use std::path::PathBuf;

use crate::core::config::Config;
use crate::core::ops::SessionStore;
use crate::core::paths::RbrPaths;
use crate::git::Git;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags that affect command behavior.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug output enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

/// An opened repository with its configuration.
#[derive(Debug)]
pub struct Repo {
    pub git: Git,
    pub paths: RbrPaths,
    pub config: Config,
}

impl Repo {
    /// Discover the repository from the context's working directory and load
    /// its configuration.
    pub fn open(ctx: &Context) -> Result<Self, RbrError> {
        let cwd = match &ctx.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().map_err(|e| {
                RbrError::Config(format!("cannot determine working directory: {e}"))
            })?,
        };

        let git = Git::open(&cwd)?;
        let paths = RbrPaths::from_repo_info(&git.info());
        let config = Config::load(&paths)?;
        tracing::debug!(
            common_dir = %paths.common_dir().display(),
            worktree = paths.is_worktree(),
            global_config = ?config.global_config_loaded_from(),
            repo_config = ?config.repo_config_loaded_from(),
            "opened repository"
        );

        Ok(Self { git, paths, config })
    }

    pub fn run(&self, action: Action) -> Result<RunOutcome, RbrError> {
        Orchestrator::new(&self.git, SessionStore::new(self.paths.clone()))
            .with_trunk(self.config.trunk())
            .with_restore_head(self.config.restore_head())
            .run(action)
    }
}
