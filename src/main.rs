use std::process::ExitCode;

use git_rbr::cli::{self, Cli, EXIT_ERROR};
use git_rbr::ui::output;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "git_rbr=debug",
        _ => "git_rbr=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    match cli::run(cli) {
        Ok(code) => code,
        Err(err) => {
            output::error(format!("{err:#}"));
            ExitCode::from(EXIT_ERROR)
        }
    }
}
