//! `def`: set variables and option defaults in the current scope.
//!
//! ```text
//! (:def "EDITOR" "vim"                 ; variable
//!       (:env "PAGER" "less")          ; same, explicitly
//!       (:link "force" true))          ; default for every later :link
//! ```
//!
//! Assignments mutate the context the directive runs in, so they are visible
//! to every later sibling (including siblings of an enclosing `when` body).
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::options::OptionKind;
use crate::value::Value;

/// Constructor for `def`.
///
/// # Errors
///
/// Never fails.
pub fn construct(_: &Dispatcher, ctx: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    let mut args = args.iter();
    while let Some(key) = args.next() {
        match key {
            Value::String(name) => match args.next() {
                Some(value) => set_env(ctx, name, value),
                None => dangling(name),
            },
            Value::Seq(items) => define_list(ctx, items),
            other => key_type_error(other),
        }
    }
    Ok(())
}

/// `(:env "k" v ...)` or `(:KIND "opt" v ...)`; lists do not nest further.
fn define_list(ctx: &mut Context, items: &[Value]) {
    let Some((head, rest)) = items.split_first() else {
        warn!(":def entries must specify at least one directive to configure");
        return;
    };
    let Some(dest) = head.as_symbol() else {
        warn!(
            key = %head,
            ":def directive keys must be symbols, not {}",
            head.type_name()
        );
        return;
    };

    if dest == "env" {
        pairs(rest, |key, value| set_env(ctx, key, value));
    } else if let Some(kind) = OptionKind::from_directive(dest) {
        pairs(rest, |key, value| {
            debug!(key, val = %value, directive = dest, "Setting key to value in options");
            if let Err(err) = ctx.options.set(kind, key, value) {
                warn!(directive = dest, "{err}");
            }
        });
    } else {
        error!(directive = dest, "Unable to find configuration hash for directive");
    }
}

fn set_env(ctx: &mut Context, key: &str, value: &Value) {
    let value = value.to_text();
    debug!(key, val = %value, "Setting environment key with value");
    ctx.set_env(key, value);
}

fn key_type_error(key: &Value) {
    warn!(key = %key, ":def keys must be strings, not {}", key.type_name());
}

fn dangling(key: &str) {
    error!(key, ":def directive encountered key with no associated value");
}

fn pairs(args: &[Value], mut on_pair: impl FnMut(&str, &Value)) {
    let mut args = args.iter();
    while let Some(key) = args.next() {
        let Some(name) = key.as_str() else {
            key_type_error(key);
            continue;
        };
        match args.next() {
            Some(value) => on_pair(name, value),
            None => dangling(name),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::directives::test_helpers::{Harness, s, seq, sym};

    #[test]
    fn string_pairs_set_variables() {
        let mut h = Harness::new();
        h.dispatch("def", &[s("EDITOR"), s("vim"), s("JOBS"), Value::Integer(4)]);
        assert_eq!(h.ctx.env_var("EDITOR"), Some("vim"));
        assert_eq!(h.ctx.env_var("JOBS"), Some("4"));
    }

    #[test]
    fn env_list_sets_variables_but_does_not_nest() {
        let mut h = Harness::new();
        h.dispatch(
            "def",
            &[seq(vec![
                sym("env"),
                s("PAGER"),
                s("less"),
                seq(vec![sym("env"), s("NESTED"), s("no")]),
            ])],
        );
        assert_eq!(h.ctx.env_var("PAGER"), Some("less"));
        assert_eq!(h.ctx.env_var("NESTED"), None);
    }

    #[test]
    fn kind_list_sets_option_defaults() {
        let mut h = Harness::new();
        h.dispatch(
            "def",
            &[
                seq(vec![sym("link"), s("force"), Value::Bool(true), s("glob"), s("nope")]),
                seq(vec![sym("mkdirs"), s("chmod"), s("0700")]),
                seq(vec![sym("shell"), s("quiet"), Value::Bool(true)]),
            ],
        );
        assert_eq!(h.ctx.options.link.force, Some(true));
        assert_eq!(h.ctx.options.link.glob, None);
        assert_eq!(h.ctx.options.mkdir.permissions, Some(0o700));
        assert_eq!(h.ctx.options.shell.quiet, Some(true));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let mut h = Harness::new();
        h.dispatch(
            "def",
            &[
                Value::Integer(1),
                seq(vec![]),
                seq(vec![s("env"), s("A"), s("b")]),
                seq(vec![sym("frobnicate"), s("x"), s("y")]),
                s("OK"),
                s("yes"),
                s("DANGLING"),
            ],
        );
        assert_eq!(h.ctx.env_var("OK"), Some("yes"));
        assert_eq!(h.ctx.env_var("A"), None);
        assert_eq!(h.ctx.env_var("DANGLING"), None);
    }

    #[test]
    fn variables_reach_later_siblings() {
        let mut h = Harness::new();
        h.dispatch_tree(&[
            seq(vec![sym("def"), s("TARGET"), s("dots")]),
            seq(vec![sym("mkdir"), s("$TARGET")]),
        ])
        .unwrap();
        assert_eq!(h.described(), ["mkdir 0744 /root/dots"]);
    }
}
