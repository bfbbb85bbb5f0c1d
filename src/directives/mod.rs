//! Built-in directive kinds.
//!
//! Each submodule exposes one or more constructors with the
//! [`Constructor`](crate::registry::Constructor) signature.
//! [`register_builtin`] wires them to their directive names.
pub mod clean;
pub mod def;
pub mod import;
pub mod link;
pub mod log;
pub mod mkdir;
pub mod package;
pub mod shell;
pub mod when;

use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::registry::Registry;
use crate::value::Value;

/// Register every built-in directive, including aliases.
pub fn register_builtin(registry: &mut Registry) {
    registry.register("import", import::construct);
    registry.register("mkdir", mkdir::construct);
    registry.register("mkdirs", mkdir::construct);
    registry.register("link", link::construct);
    registry.register("clean", clean::construct);
    registry.register("shell", shell::construct);
    registry.register("package", package::construct);
    registry.register("packages", package::construct);
    registry.register("debug", log::debug);
    registry.register("info", log::info);
    registry.register("warn", log::warn);
    registry.register("def", def::construct);
    registry.register("when", when::construct);
    registry.register("ignore", ignore);
}

/// `ignore`: produces nothing. Platform tags rewrite excluded nodes to it.
///
/// # Errors
///
/// Never fails.
pub const fn ignore(_: &Dispatcher, _: &mut Context, _: &[Value]) -> Result<(), DottyError> {
    Ok(())
}
