//! Path joining and the nested path-template expander.
//!
//! Directive arguments describe paths as trees: a parenthesised sublist fans
//! out from every leaf accumulated before it at the same level. [`expand`]
//! turns such a tree into an ordered stream of concrete paths.
use std::path::{MAIN_SEPARATOR, Path};

use crate::value::Value;

/// Platform path separator.
pub const SEPARATOR: char = MAIN_SEPARATOR;

/// Receiver for the output of [`expand`].
///
/// `transform` runs on every string leaf before it is joined; returning
/// `None` drops the leaf silently.
pub trait ExpandSink {
    /// Rewrite a leaf before joining (e.g. variable substitution).
    fn transform(&mut self, leaf: &str) -> Option<String> {
        Some(leaf.to_string())
    }

    /// A completed path, in output order.
    fn path(&mut self, path: String);

    /// A node that is neither a path leaf nor a sublist, found under `base`.
    fn reject(&mut self, base: &str, value: &Value);
}

/// Expand `nodes` relative to `base`, streaming results into `sink`.
///
/// Top-level elements never share state: a leaf is emitted at once and a
/// sublist is expanded with `base` as its only prefix. Within a
/// sublist, each nested sublist fans out from *every* leaf accumulated so far
/// at that level, and leaves are emitted directly only if no sublist follows
/// them before the level ends.
pub fn expand(nodes: &[Value], base: &str, sink: &mut dyn ExpandSink) {
    for node in nodes {
        match node {
            Value::Nil => emit_leaf("", base, sink),
            Value::String(leaf) => emit_leaf(leaf, base, sink),
            Value::Seq(children) => expand_nested(children, base, sink),
            other => sink.reject(base, other),
        }
    }
}

fn emit_leaf(leaf: &str, base: &str, sink: &mut dyn ExpandSink) {
    if let Some(joined) = join_leaf(leaf, base, sink) {
        sink.path(joined);
    }
}

fn join_leaf(leaf: &str, base: &str, sink: &mut dyn ExpandSink) -> Option<String> {
    sink.transform(leaf)
        .map(|leaf| join(&[base, from_slash(&leaf).as_str()]))
}

fn expand_nested(nodes: &[Value], base: &str, sink: &mut dyn ExpandSink) {
    let mut acc: Vec<String> = Vec::with_capacity(nodes.len());
    let mut flush_from = 0;

    for node in nodes {
        match node {
            Value::Nil => acc.extend(join_leaf("", base, sink)),
            Value::String(leaf) => acc.extend(join_leaf(leaf, base, sink)),
            Value::Seq(children) => {
                for prefix in &acc {
                    expand_nested(children, prefix, sink);
                }
                flush_from = acc.len();
            }
            other => sink.reject(base, other),
        }
    }

    for path in acc.into_iter().skip(flush_from) {
        sink.path(path);
    }
}

/// Collects expanded paths, passing leaves through unchanged.
struct Collect<R> {
    paths: Vec<String>,
    on_reject: R,
}

impl<R: FnMut(&str, &Value)> ExpandSink for Collect<R> {
    fn path(&mut self, path: String) {
        self.paths.push(path);
    }

    fn reject(&mut self, base: &str, value: &Value) {
        (self.on_reject)(base, value);
    }
}

/// Expand `nodes` into a vector, reporting rejected nodes to `on_reject`.
pub fn collect<R: FnMut(&str, &Value)>(nodes: &[Value], base: &str, on_reject: R) -> Vec<String> {
    let mut sink = Collect {
        paths: Vec::new(),
        on_reject,
    };
    expand(nodes, base, &mut sink);
    sink.paths
}

/// Join path segments.
///
/// The rightmost segment that is `~`, starts with `~/` or is absolute resets
/// everything before it. Empty segments are skipped and the result is
/// lexically cleaned, but a trailing separator on the last segment survives.
#[must_use]
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let start = parts
        .iter()
        .rposition(|p| is_rooted(p.as_ref()))
        .unwrap_or(0);
    let tail = parts.get(start..).unwrap_or_default();

    let mut joined = String::new();
    for part in tail.iter().map(AsRef::as_ref).filter(|p| !p.is_empty()) {
        if !joined.is_empty() {
            joined.push(SEPARATOR);
        }
        joined.push_str(part);
    }
    if joined.is_empty() {
        return joined;
    }

    let mut cleaned = clean(&joined);
    let trailing = parts
        .last()
        .is_some_and(|p| p.as_ref().ends_with(SEPARATOR));
    if trailing && !cleaned.ends_with(SEPARATOR) {
        cleaned.push(SEPARATOR);
    }
    cleaned
}

fn is_rooted(part: &str) -> bool {
    part == "~" || part.starts_with(&format!("~{SEPARATOR}")) || Path::new(part).is_absolute()
}

/// Lexically normalise `path`: collapse repeated separators, drop `.`
/// segments and resolve `..` against preceding segments.
#[must_use]
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with(SEPARATOR);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let body = segments.join(&SEPARATOR.to_string());
    match (rooted, body.is_empty()) {
        (true, _) => format!("{SEPARATOR}{body}"),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

/// Replace a leading `~` with `home`.
#[must_use]
pub fn expand_tilde(home: &str, path: &str) -> String {
    if path == "~" {
        home.to_string()
    } else if let Some(rest) = path.strip_prefix(&format!("~{SEPARATOR}")) {
        join(&[home, rest])
    } else {
        path.to_string()
    }
}

/// Last path component, ignoring trailing separators (`"."` for empty input).
#[must_use]
pub fn base_name(path: &str) -> String {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return if path.is_empty() {
            ".".to_string()
        } else {
            SEPARATOR.to_string()
        };
    }
    trimmed
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// Everything before the last path component (`"."` when there is none).
#[must_use]
pub fn dir_name(path: &str) -> String {
    match path.rfind(SEPARATOR) {
        Some(0) => SEPARATOR.to_string(),
        Some(idx) => clean(path.get(..idx).unwrap_or_default()),
        None => ".".to_string(),
    }
}

/// Whether `path` lies inside `root` once both are cleaned.
#[must_use]
pub fn is_within(path: &str, root: &str) -> bool {
    Path::new(&clean(path)).starts_with(clean(root))
}

fn from_slash(path: &str) -> String {
    if SEPARATOR == '/' {
        path.to_string()
    } else {
        path.replace('/', &SEPARATOR.to_string())
    }
}
