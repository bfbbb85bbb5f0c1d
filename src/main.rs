//! `dotty` command-line entry point.
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as _;
use tracing::error;

use dotty::cli::{Cli, Command};
use dotty::commands;
use dotty::logging::{self, LogSettings};

fn main() -> Result<ExitCode> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let flag = logging::init_subscriber(&LogSettings {
        level: args.global.log_level.into(),
        file: args.global.log_file.clone(),
        json: args.global.log_json,
    })?;

    let result = match &args.command {
        Command::Install(opts) => commands::install::run(opts),
        Command::Inspect(opts) => commands::inspect::run(opts),
        Command::ListDirs => commands::list::dirs(),
        Command::ListBots(opts) => commands::list::bots(opts),
        Command::Version => commands::version::run().map_err(Into::into),
    };
    if let Err(e) = result {
        error!("{e:#}");
    }

    // any error logged during the run fails the process
    Ok(if flag.is_raised() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
