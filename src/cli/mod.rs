//! cli
//!
//! Command-line interface layer for git-rbr.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments
//! - Hand the selected [`Action`] to the engine
//! - Report the outcome and choose the exit code
//!
//! # Exit codes
//!
//! - `0` - completed, aborted, or nothing to do
//! - `1` - suspended on a conflict
//! - `2` - any error

pub mod args;

pub use args::Cli;

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::engine::{self, Action, Repo, RunOutcome};
use crate::ui::output::{self, Verbosity};

/// Exit code for a suspended session.
pub const EXIT_CONFLICT: u8 = 1;
/// Exit code for errors.
pub const EXIT_ERROR: u8 = 2;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<ExitCode> {
    let ctx = engine::Context {
        cwd: cli.cwd.clone(),
        debug: cli.verbose > 0,
        quiet: cli.quiet,
    };

    let repo = Repo::open(&ctx).context("cannot open repository")?;
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug || repo.config.verbose());

    let action = cli.action();
    output::debug(format!("action: {action:?}"), verbosity);

    let outcome = repo.run(action.clone()).with_context(|| match action {
        Action::Start { .. } => "rebase failed",
        Action::Continue => "--continue failed",
        Action::Skip => "--skip failed",
        Action::Abort => "--abort failed",
    })?;

    if action == Action::Continue && matches!(outcome, RunOutcome::Conflicted { .. }) {
        output::warn("conflicts are still unresolved; stage the resolution first", verbosity);
    }

    Ok(report(&outcome, verbosity))
}

/// Print the outcome and map it to an exit code.
pub fn report(outcome: &RunOutcome, verbosity: Verbosity) -> ExitCode {
    match outcome {
        RunOutcome::Completed { rebased } => {
            output::print(
                format!("Rebased {} branch(es).", rebased.len()),
                verbosity,
            );
            output::debug(format!("\n{}", output::format_list(rebased, "  ")), verbosity);
            ExitCode::SUCCESS
        }
        RunOutcome::UpToDate => {
            output::print("All branches are up to date.", verbosity);
            ExitCode::SUCCESS
        }
        RunOutcome::Conflicted {
            branch,
            at,
            position,
            total,
        } => {
            output::always(output::conflict_instructions(
                branch,
                at.as_ref(),
                *position,
                *total,
            ));
            ExitCode::from(EXIT_CONFLICT)
        }
        RunOutcome::Aborted { restored } => {
            output::print(
                format!("Aborted; restored {restored} branch(es) to their original tips."),
                verbosity,
            );
            ExitCode::SUCCESS
        }
    }
}
