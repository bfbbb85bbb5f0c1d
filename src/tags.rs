//! Structural `dot/*` tags applied to raw directive nodes at load time.
//!
//! Tags rewrite a node before it ever reaches dispatch. Misusing a tag is a
//! configuration-author error and fails the whole load.
use tracing::warn;

use crate::error::TagError;
use crate::paths::{self, ExpandSink};
use crate::platform::Platform;
use crate::value::{self, Value};

/// Apply the tag `name` to `node`.
///
/// # Errors
///
/// Returns a [`TagError`] when the tag is unknown or applied to a node it does
/// not support.
pub fn apply(name: &str, node: Value, platform: &Platform) -> Result<Value, TagError> {
    match name {
        "dot/if-windows" => Ok(keep_if(platform.is_windows(), node)),
        "dot/if-linux" => Ok(keep_if(platform.is_linux(), node)),
        "dot/if-darwin" => Ok(keep_if(platform.is_darwin(), node)),
        "dot/if-unix" => Ok(keep_if(platform.is_unix(), node)),
        "dot/gen-bots" => gen_bots(node),
        "dot/link-gen" => link_gen(node),
        other => Err(TagError::Unknown(other.to_string())),
    }
}

/// The no-op directive `(:ignore)`.
#[must_use]
pub fn ignore_directive() -> Value {
    Value::Seq(vec![Value::symbol("ignore")])
}

fn keep_if(keep: bool, node: Value) -> Value {
    if keep { node } else { ignore_directive() }
}

/// Split `(:NAME args...)` into its arguments, checking the directive name.
/// An empty list passes through untouched as `Ok(Err(node))`.
fn directive_args(
    node: Value,
    tag: &'static str,
    expected: &'static str,
) -> Result<Result<Vec<Value>, Value>, TagError> {
    let Value::Seq(mut items) = node else {
        return Err(TagError::WrongDirective {
            tag,
            expected,
            found: node.to_string(),
        });
    };
    match items.first().map(|head| head.as_symbol() == Some(expected)) {
        None => Ok(Err(Value::Seq(items))),
        Some(true) => {
            items.remove(0);
            Ok(Ok(items))
        }
        Some(false) => Err(TagError::WrongDirective {
            tag,
            expected,
            found: Value::Seq(items).to_string(),
        }),
    }
}

fn with_head(name: &str, args: Vec<Value>) -> Value {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Value::symbol(name));
    items.extend(args);
    Value::Seq(items)
}

// ---------------------------------------------------------------------------
// dot/gen-bots
// ---------------------------------------------------------------------------

fn bot_name(path: &str) -> Value {
    Value::string(paths::base_name(path))
}

fn gen_bots(node: Value) -> Result<Value, TagError> {
    let args = match directive_args(node, "dot/gen-bots", "import")? {
        Ok(args) => args,
        Err(empty) => return Ok(empty),
    };

    let mut sink = GenBots {
        out: Vec::with_capacity(args.len()),
        error: None,
    };
    paths::expand(&args, "", &mut sink);
    match sink.error {
        Some(err) => Err(err),
        None => Ok(with_head("import", sink.out)),
    }
}

struct GenBots {
    out: Vec<Value>,
    error: Option<TagError>,
}

impl ExpandSink for GenBots {
    fn path(&mut self, path: String) {
        self.out.push(Value::Map(vec![
            (Value::symbol("if-bots"), bot_name(&path)),
            (Value::symbol("path"), Value::String(path)),
        ]));
    }

    fn reject(&mut self, base: &str, value: &Value) {
        if self.error.is_some() {
            return;
        }
        let Some(entries) = value.as_map() else {
            self.error = Some(TagError::InvalidImport(value.to_string()));
            return;
        };
        match value::lookup(entries, "path") {
            None => warn!(arg = %value, "Import maps must specify a :path field"),
            Some(Value::String(path)) => {
                let mut entries = entries.to_vec();
                if value::lookup(&entries, "if-bots").is_none() {
                    value::insert(&mut entries, "if-bots", bot_name(path));
                }
                self.out.push(Value::Map(entries));
            }
            Some(Value::Seq(nested)) => {
                let expanded = paths::collect(nested, base, |_, _| {
                    warn!("The gen-bots tag doesn't support map paths with map depth > 1");
                });
                for path in expanded {
                    let mut copy = entries.to_vec();
                    if value::lookup(&copy, "if-bots").is_none() {
                        value::insert(&mut copy, "if-bots", bot_name(&path));
                    }
                    value::insert(&mut copy, "path", Value::String(path));
                    self.out.push(Value::Map(copy));
                }
            }
            // Left for the import directive to report.
            Some(_) => self.out.push(value.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// dot/link-gen
// ---------------------------------------------------------------------------

/// Destination for a source: `~/.<basename>`, or `~` for a list of sources.
fn dest_from_src(src: &Value) -> Option<Value> {
    match src {
        Value::String(path) => {
            let base = paths::base_name(path);
            let hidden = if base.starts_with('.') {
                base
            } else {
                format!(".{base}")
            };
            Some(Value::String(paths::join(&["~", hidden.as_str()])))
        }
        Value::Seq(_) => Some(Value::string("~")),
        other => {
            warn!(directive = %other, "link: unable to generate destination for directive");
            None
        }
    }
}

/// Source for a destination: its basename without a leading dot.
fn src_from_dest(dest: &Value) -> Option<Value> {
    let Value::String(path) = dest else {
        warn!(directive = %dest, "link: unable to generate src for directive");
        return None;
    };
    let base = paths::base_name(path);
    let src = base.strip_prefix('.').unwrap_or(&base);
    if src.is_empty() {
        warn!(path = %path, "src path resolved to an empty destination path");
        return None;
    }
    Some(Value::string(src))
}

fn link_gen(node: Value) -> Result<Value, TagError> {
    let args = match directive_args(node, "dot/link-gen", "link")? {
        Ok(args) => args,
        Err(empty) => return Ok(empty),
    };

    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        if let Value::Map(mut entries) = arg {
            let src = value::lookup(&entries, "src").cloned();
            let dest = value::lookup(&entries, "dest").cloned();
            match (src, dest) {
                (None, None) => {
                    return Err(TagError::MissingLinkPath(Value::Map(entries).to_string()));
                }
                (Some(src), None) => match dest_from_src(&src) {
                    Some(dest) => value::insert(&mut entries, "dest", dest),
                    None => continue,
                },
                (None, Some(dest)) => match src_from_dest(&dest) {
                    Some(src) => value::insert(&mut entries, "src", src),
                    None => continue,
                },
                (Some(_), Some(_)) => {}
            }
            out.push(Value::Map(entries));
            continue;
        }

        let mut invalid = None;
        let dests = paths::collect(std::slice::from_ref(&arg), "", |_, v| {
            invalid.get_or_insert_with(|| v.to_string());
        });
        if let Some(found) = invalid {
            return Err(TagError::InvalidLinkPath(found));
        }
        for dest in dests {
            let dest = Value::String(dest);
            if let Some(src) = src_from_dest(&dest) {
                out.push(src);
                out.push(dest);
            }
        }
    }
    Ok(with_head("link", out))
}
