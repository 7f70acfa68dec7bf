//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output respects the quiet flag, with one exception: conflict
//! instructions are always printed, since scripts look for the resume
//! command in them.

use std::fmt::Display;

use crate::core::types::{BranchName, Oid};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a message regardless of verbosity.
pub fn always(message: impl Display) {
    println!("{}", message);
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Instructions printed when a session suspends on a conflict.
///
/// ```
/// use git_rbr::core::types::BranchName;
/// use git_rbr::ui::output::conflict_instructions;
///
/// let text = conflict_instructions(&BranchName::new("topic").unwrap(), None, 2, 5);
/// assert!(text.contains("git rbr --continue"));
/// ```
pub fn conflict_instructions(
    branch: &BranchName,
    at: Option<&Oid>,
    position: usize,
    total: usize,
) -> String {
    let commit = at
        .map(|oid| format!(" while applying {}", oid.short(7)))
        .unwrap_or_default();
    format!(
        "Conflict rebasing '{branch}' ({position}/{total}){commit}.\n\
         Resolve the conflicts and stage the result, then run 'git rbr --continue'.\n\
         To drop the conflicting commit, run 'git rbr --skip'.\n\
         To restore every branch to where it started, run 'git rbr --abort'."
    )
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}
