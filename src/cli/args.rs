//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! ```text
//! git rbr [-v]... [-q] [-C <path>] [BRANCH]
//! git rbr --continue | --skip | --abort
//! ```

use clap::{ArgAction, ArgGroup, Parser};
use std::path::PathBuf;

use crate::core::types::BranchName;
use crate::engine::Action;

/// Rebase a tree of tracking branches onto their upstreams
#[derive(Parser, Debug)]
#[command(name = "git-rbr", bin_name = "git rbr")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("resume").args(["continue_", "skip", "abort"])))]
pub struct Cli {
    /// Branch to start from (default: the checked-out branch)
    #[arg(value_parser = parse_branch, conflicts_with = "resume")]
    pub branch: Option<BranchName>,

    /// Resume after resolving a conflict
    #[arg(long = "continue")]
    pub continue_: bool,

    /// Resume by dropping the conflicting commit
    #[arg(long)]
    pub skip: bool,

    /// Restore every branch to its tip before the session began
    #[arg(long)]
    pub abort: bool,

    /// More diagnostics; repeat for more
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', long, value_name = "PATH")]
    pub cwd: Option<PathBuf>,
}

fn parse_branch(s: &str) -> Result<BranchName, String> {
    BranchName::new(s).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// The engine action these flags select.
    pub fn action(&self) -> Action {
        if self.continue_ {
            Action::Continue
        } else if self.skip {
            Action::Skip
        } else if self.abort {
            Action::Abort
        } else {
            Action::Start {
                branch: self.branch.clone(),
            }
        }
    }
}
