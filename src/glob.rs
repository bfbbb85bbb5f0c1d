//! Shell-style wildcards for `link :glob`.
//!
//! Patterns support `*`, `?`, `[abc]`/`[a-z]`/`[!abc]`, `\` escapes and
//! `{a,b}` alternatives. Matching is per path component: wildcards never
//! cross a separator.
use std::fs;

use tracing::trace;

use crate::paths::SEPARATOR;

/// Upper bound on recursive match steps, so patterns like `*a*a*a*b` cannot
/// backtrack for ever.
const MAX_MATCH_CALLS: usize = 100_000;

/// Whether `text` contains any wildcard metacharacter.
#[must_use]
pub fn contains_glob(text: &str) -> bool {
    text.contains(['*', '?', '[', '{'])
}

/// Whether `pattern` matches all of `name`.
#[must_use]
pub fn matches(pattern: &str, name: &str) -> bool {
    let input: Vec<char> = name.chars().collect();
    let mut budget = MAX_MATCH_CALLS;
    expand_braces(pattern).iter().any(|alternative| {
        let pattern: Vec<char> = alternative.chars().collect();
        match_chars(&pattern, &input, &mut budget)
    })
}

/// Expand the first top-level `{...}` group of `pattern`, recursively.
///
/// A pattern without a closed group comes back unchanged.
#[must_use]
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let mut depth = 0_usize;
    let mut open = None;
    for (idx, c) in pattern.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    open = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(start) = open
                    && let (Some(prefix), Some(body), Some(suffix)) = (
                        pattern.get(..start),
                        pattern.get(start + 1..idx),
                        pattern.get(idx + 1..),
                    )
                {
                    return split_alternatives(body)
                        .into_iter()
                        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
                        .collect();
                }
            }
            _ => {}
        }
    }
    vec![pattern.to_string()]
}

fn split_alternatives(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0_usize;
    for c in body.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    out.push(current);
    out
}

fn match_chars(pattern: &[char], input: &[char], budget: &mut usize) -> bool {
    if *budget == 0 {
        return false;
    }
    *budget -= 1;

    match pattern {
        [] => input.is_empty(),
        ['*', rest @ ..] => {
            let rest = skip_stars(rest);
            if rest.is_empty() {
                return true;
            }
            (0..=input.len()).any(|skip| {
                input
                    .get(skip..)
                    .is_some_and(|tail| match_chars(rest, tail, budget))
            })
        }
        ['?', rest @ ..] => {
            let [_, tail @ ..] = input else {
                return false;
            };
            match_chars(rest, tail, budget)
        }
        ['[', class @ ..] => {
            let [c, tail @ ..] = input else {
                return false;
            };
            match match_class(class, *c) {
                Some((hit, rest)) => hit && match_chars(rest, tail, budget),
                // unclosed: the bracket is literal
                None => *c == '[' && match_chars(class, tail, budget),
            }
        }
        ['\\', escaped, rest @ ..] | [escaped, rest @ ..] => {
            let [c, tail @ ..] = input else {
                return false;
            };
            c == escaped && match_chars(rest, tail, budget)
        }
    }
}

fn skip_stars(mut pattern: &[char]) -> &[char] {
    while let ['*', rest @ ..] = pattern {
        pattern = rest;
    }
    pattern
}

/// Match `c` against the class body following a `[`. Returns whether it
/// matched and the pattern after the closing `]`, or `None` when the class
/// is never closed.
fn match_class(class: &[char], c: char) -> Option<(bool, &[char])> {
    let (negate, mut body) = match class {
        ['!' | '^', rest @ ..] => (true, rest),
        _ => (false, class),
    };
    let mut matched = false;
    let mut first = true;
    loop {
        body = match body {
            [] => return None,
            [']', rest @ ..] if !first => return Some((matched != negate, rest)),
            [lo, '-', hi, rest @ ..] if *hi != ']' => {
                matched |= (*lo..=*hi).contains(&c);
                rest
            }
            [member, rest @ ..] => {
                matched |= *member == c;
                rest
            }
        };
        first = false;
    }
}

/// Every existing path matching `pattern`, sorted.
///
/// Components without metacharacters are taken literally; the others are
/// matched against directory listings. Unreadable directories contribute
/// nothing.
#[must_use]
pub fn expand(pattern: &str) -> Vec<String> {
    let mut found: Vec<String> = expand_braces(pattern)
        .iter()
        .flat_map(|alternative| expand_one(alternative))
        .collect();
    found.sort();
    found.dedup();
    found
}

fn expand_one(pattern: &str) -> Vec<String> {
    let mut prefixes = vec![if pattern.starts_with(SEPARATOR) {
        SEPARATOR.to_string()
    } else {
        String::new()
    }];

    for component in pattern.split(SEPARATOR).filter(|c| !c.is_empty()) {
        if !contains_glob(component) {
            for prefix in &mut prefixes {
                *prefix = child(prefix, component);
            }
            continue;
        }
        prefixes = prefixes
            .iter()
            .flat_map(|prefix| matching_children(prefix, component))
            .collect();
    }

    prefixes.retain(|path| !path.is_empty() && fs::symlink_metadata(path).is_ok());
    prefixes
}

fn matching_children(dir: &str, component: &str) -> Vec<String> {
    let listing = if dir.is_empty() { "." } else { dir };
    let Ok(entries) = fs::read_dir(listing) else {
        trace!(dir = listing, "Skipping unreadable directory while globbing");
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| matches(component, name))
        .collect();
    names.sort();
    names.iter().map(|name| child(dir, name)).collect()
}

fn child(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with(SEPARATOR) {
        format!("{dir}{name}")
    } else {
        format!("{dir}{SEPARATOR}{name}")
    }
}
