//! Boolean conditions for `when` and inline `:when`/`:if-bots` options.
//!
//! A condition is either a shell command (string, list of lines or a map as
//! accepted by `shell`), run quietly and judged by its exit status, or a
//! combinator form led by a symbol: `(:not c)`, `(:bots "a" ...)`,
//! `(:and c ...)`, `(:or c ...)`.
use tracing::{error, warn};

use crate::context::Context;
use crate::directives::shell;
use crate::dispatch::Dispatcher;
use crate::value::{self, Value};

/// Evaluate `condition` in `ctx`.
#[must_use]
pub fn evaluate(dispatcher: &Dispatcher, ctx: &Context, condition: &Value) -> bool {
    match condition {
        Value::Map(entries) => run_quiet(ctx, entries.clone()),
        Value::Seq(items) => match items.split_first() {
            None => false,
            Some((Value::Symbol(op), args)) => combinator(dispatcher, ctx, op, args),
            Some(_) => run_quiet(ctx, command_map(condition)),
        },
        other => run_quiet(ctx, command_map(other)),
    }
}

fn combinator(dispatcher: &Dispatcher, ctx: &Context, op: &str, args: &[Value]) -> bool {
    match op {
        "not" => match args {
            [inner] => !evaluate(dispatcher, ctx, inner),
            _ => {
                warn!(
                    arguments = args.len(),
                    "The :not condition takes exactly one argument"
                );
                false
            }
        },
        "bot" | "bots" => installing_bots(dispatcher, ctx, args),
        "and" => args.iter().all(|arg| evaluate(dispatcher, ctx, arg)),
        "or" => args.iter().any(|arg| evaluate(dispatcher, ctx, arg)),
        other => {
            warn!(condition = other, "Unknown condition in when directive");
            false
        }
    }
}

/// Whether every bot in `args` is active; false for an empty list.
///
/// A non-string argument makes the result false, but the remaining bot
/// names are still offered to the bot hook so an enumerating hook sees them.
#[must_use]
pub fn installing_bots(dispatcher: &Dispatcher, ctx: &Context, args: &[Value]) -> bool {
    if args.is_empty() {
        return false;
    }
    let mut active = true;
    for arg in args {
        let Some(bot) = arg.as_str() else {
            error!(
                bot = %arg,
                "The :bots predicate can only accept strings, not {}",
                arg.type_name()
            );
            active = false;
            continue;
        };
        if !dispatcher.check_bot(ctx, bot) {
            return false;
        }
    }
    active
}

/// Inline conditions of a directive map: `:if-bots` (a bot or a list of
/// bots) and then `:when`. Both default to true when absent.
#[must_use]
pub fn map_condition(dispatcher: &Dispatcher, ctx: &Context, entries: &[(Value, Value)]) -> bool {
    if let Some(bots) = value::lookup(entries, "if-bots") {
        let active = match bots {
            Value::String(_) => installing_bots(dispatcher, ctx, std::slice::from_ref(bots)),
            Value::Seq(items) => installing_bots(dispatcher, ctx, items),
            _ => false,
        };
        if !active {
            return false;
        }
    }
    value::lookup(entries, "when").is_none_or(|when| evaluate(dispatcher, ctx, when))
}

fn command_map(cmd: &Value) -> Vec<(Value, Value)> {
    vec![(Value::symbol("cmd"), cmd.clone())]
}

/// Run a shell command map with `interactive false` and `quiet true` unless
/// the map says otherwise.
fn run_quiet(ctx: &Context, mut entries: Vec<(Value, Value)>) -> bool {
    for (key, default) in [("interactive", false), ("quiet", true)] {
        if value::lookup(&entries, key).is_none() {
            value::insert(&mut entries, key, Value::Bool(default));
        }
    }
    let mut result = false;
    shell::build_mapped(ctx, &entries, &mut |command| result = command.run());
    result
}
