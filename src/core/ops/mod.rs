//! core::ops
//!
//! Session persistence and locking.
//!
//! # Modules
//!
//! - [`session`] - Durable, atomically written rebase session
//! - [`lock`] - Exclusive repository lock
//!
//! # Architecture
//!
//! Every mutating invocation:
//! 1. Acquires the exclusive repo lock
//! 2. Loads (or creates) the session record
//! 3. Checkpoints the session before and after every primitive call
//! 4. Clears the session once the plan is exhausted or aborted
//!
//! # Example
//!
//! ```ignore
//! use git_rbr::core::ops::{RepoLock, SessionStore, RebaseSession};
//!
//! let _lock = RepoLock::acquire(&paths)?;
//! let store = SessionStore::new(paths.clone());
//!
//! let mut session = RebaseSession::new(plan, Some(head));
//! store.save(&session)?;
//!
//! session.advance();
//! store.save(&session)?;
//!
//! store.clear()?;
//! ```

pub mod lock;
pub mod session;

pub use lock::{LockError, RepoLock};
pub use session::{
    BranchNode, NodeStatus, RebaseSession, SessionError, SessionId, SessionStore,
    SESSION_SCHEMA_VERSION,
};
