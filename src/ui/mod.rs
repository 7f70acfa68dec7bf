//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! Everything the user is meant to read goes through this module and
//! respects the verbosity chosen on the command line. Diagnostics go through
//! `tracing` instead.

pub mod output;
