//! `debug`, `info` and `warn`: log a message while the configuration is
//! being read.
use tracing::{debug as log_debug, info as log_info, warn as log_warn};

use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::value::Value;

/// Constructor for `debug`.
///
/// # Errors
///
/// Never fails.
pub fn debug(_: &Dispatcher, _: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    if let Some(message) = message(args) {
        log_debug!("{message}");
    }
    Ok(())
}

/// Constructor for `info`.
///
/// # Errors
///
/// Never fails.
pub fn info(_: &Dispatcher, _: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    if let Some(message) = message(args) {
        log_info!("{message}");
    }
    Ok(())
}

/// Constructor for `warn`.
///
/// # Errors
///
/// Never fails.
pub fn warn(_: &Dispatcher, _: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    if let Some(message) = message(args) {
        log_warn!("{message}");
    }
    Ok(())
}

fn message(args: &[Value]) -> Option<String> {
    let (template, rest) = args.split_first()?;
    let Some(template) = template.as_str() else {
        log_warn!(
            format = %template,
            "Log functions first argument must always be a format string, not {}",
            template.type_name()
        );
        return None;
    };
    Some(render(template, rest))
}

/// Substitute each `%s`/`%v` in `template` with the text of the next
/// argument. `%%` is a literal percent sign; leftover arguments are appended
/// separated by spaces.
#[must_use]
pub fn render(template: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(verb @ ('s' | 'v')) => {
                chars.next();
                match args.next() {
                    Some(arg) => out.push_str(&arg.to_text()),
                    None => {
                        out.push('%');
                        out.push(verb);
                    }
                }
            }
            _ => out.push('%'),
        }
    }
    for extra in args {
        out.push(' ');
        out.push_str(&extra.to_text());
    }
    out
}
