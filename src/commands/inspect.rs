//! Command: print what `install` would do.
use std::io::{self, Write};

use anyhow::Result;

use super::CommandSetup;
use crate::cli::RunOpts;
use crate::dispatch::Dispatcher;
use crate::pipeline::{self, Plan};

/// Run the inspect command, describing every directive on stdout.
///
/// # Errors
///
/// Returns an error if the repository cannot be located, a fatal
/// configuration error stops the run, or stdout cannot be written.
pub fn run(opts: &RunOpts) -> Result<()> {
    let setup = CommandSetup::for_run(opts)?;
    describe_all(&setup.dispatcher(), &setup.plan, &mut io::stdout().lock())
}

/// Write the description of every directive `plan` emits to `out`, one per
/// line, without executing anything.
///
/// # Errors
///
/// Returns the first write error, or the fatal error that stopped the run.
pub fn describe_all(dispatcher: &Dispatcher, plan: &Plan, out: &mut impl Write) -> Result<()> {
    let mut write_error: Option<io::Error> = None;
    pipeline::run(dispatcher, plan, |directive| {
        if write_error.is_none()
            && let Err(e) = writeln!(out, "{}", directive.describe())
        {
            write_error = Some(e);
        }
    })?;
    match write_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
