//! Helpers shared by the console and file layers.
use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};

/// Remove ANSI escape sequences (CSI sequences and two-byte escapes).
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            // parameters run until a final byte in `@`..=`~`
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        }
    }
    out
}

/// Current time as RFC 3339 text.
pub(super) fn timestamp() -> String {
    let mut out = String::new();
    if SystemTime.format_time(&mut Writer::new(&mut out)).is_err() {
        out.clear();
    }
    out
}

/// The `message` of an event plus its other fields in recording order.
#[derive(Debug, Default)]
pub(super) struct EventFields {
    pub(super) message: String,
    pub(super) fields: Vec<(&'static str, String)>,
}

impl EventFields {
    /// Fields as ` key=value` pairs, each prefixed by a space.
    pub(super) fn pairs(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            let _ = write!(out, " {key}={value}");
        }
        out
    }
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }
}
