//! core
//!
//! Core domain types, schemas, and storage for git-rbr.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, UtcTimestamp
//! - [`graph`] - The branch forest and its traversals
//! - [`ops`] - Session persistence and locking
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for on-disk state
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing here talks to git

pub mod config;
pub mod graph;
pub mod ops;
pub mod paths;
pub mod types;
