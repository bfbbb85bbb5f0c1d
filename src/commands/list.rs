//! Commands: list directive names and the bots a configuration uses.
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;

use super::CommandSetup;
use crate::cli::RepoOpts;
use crate::dispatch::{BotEnumerator, Dispatcher};
use crate::pipeline::{self, Plan};
use crate::registry::Registry;

/// Print every built-in directive name, sorted.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
pub fn dirs() -> Result<()> {
    write_dirs(&Registry::builtin(), &mut io::stdout().lock())?;
    Ok(())
}

/// Write the names registered in `registry` to `out`, one per line.
///
/// # Errors
///
/// Returns the underlying write error.
pub fn write_dirs(registry: &Registry, out: &mut impl Write) -> io::Result<()> {
    for name in registry.names() {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

/// Print every distinct bot the configuration checks.
///
/// # Errors
///
/// Returns an error if the repository cannot be located or a fatal
/// configuration error stops the walk.
pub fn bots(repo: &RepoOpts) -> Result<()> {
    let setup = CommandSetup::init(repo)?;
    collect_bots(setup.dispatcher(), &setup.plan, |bot| {
        writeln!(io::stdout().lock(), "{bot}").ok();
    })
}

/// Walk `plan` treating every bot as active, reporting each name once.
/// The emitted directives are discarded.
///
/// # Errors
///
/// Returns the fatal error that stopped the walk.
pub fn collect_bots(
    dispatcher: Dispatcher,
    plan: &Plan,
    on_bot: impl Fn(&str) + Send + Sync + 'static,
) -> Result<()> {
    let dispatcher = dispatcher.with_bot_hook(Arc::new(BotEnumerator::new(on_bot)));
    pipeline::run(&dispatcher, plan, drop)?;
    Ok(())
}
