//! git-rbr - rebase a whole tree of tracking branches in one invocation
//!
//! Branches that track another local branch form a forest. `git rbr` walks
//! the tree below the current (or named) branch and rebases every branch
//! onto the fresh tip of its upstream, parents before children. A conflict
//! suspends the run with its state on disk; `--continue`, `--skip` and
//! `--abort` pick it up again in a later process.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Build -> Plan -> Step lifecycle and the session state machine
//! - [`core`] - Domain types, the branch forest, configuration, session storage
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. Configuration errors and cycles are reported before any mutation
//! 2. Every branch's original tip is on disk before the first rebase
//! 3. Session state is replaced atomically, never partially written
//! 4. `--abort` restores every planned branch, reached or not

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
