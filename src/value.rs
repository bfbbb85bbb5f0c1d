//! Generic value tree that directives are built from.
//!
//! A configuration file decodes into a list of [`Value`]s. Every directive
//! constructor receives its arguments as a `&[Value]` and pattern-matches on
//! the variants it accepts; anything else is a variant-mismatch diagnostic.
use std::fmt;

/// One node of a decoded configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Absent value; the path expander treats it as an empty path segment.
    Nil,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal (e.g. permission bits).
    Integer(i64),
    /// Text literal.
    String(String),
    /// Keyword-like tag used for directive names and option keys.
    Symbol(String),
    /// Ordered list, possibly empty.
    Seq(Vec<Self>),
    /// Mapping with unique keys, kept in declaration order.
    Map(Vec<(Self, Self)>),
}

impl Value {
    /// Build a [`Value::Symbol`].
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// Build a [`Value::String`].
    #[must_use]
    pub fn string(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    /// The contained text of a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The contained name of a [`Value::Symbol`].
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// The contained flag of a [`Value::Bool`].
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The elements of a [`Value::Seq`].
    #[must_use]
    pub fn as_seq(&self) -> Option<&[Self]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// The entries of a [`Value::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&[(Self, Self)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short variant name used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Seq(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Render as plain text: strings unquoted, everything else as displayed.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Look up the entry keyed by the symbol `key`.
#[must_use]
pub fn lookup<'a>(entries: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| k.as_symbol() == Some(key))
        .map(|(_, v)| v)
}

/// Insert or replace the entry keyed by the symbol `key`.
pub fn insert(entries: &mut Vec<(Value, Value)>, key: &str, value: Value) {
    if let Some(slot) = entries
        .iter_mut()
        .find(|(k, _)| k.as_symbol() == Some(key))
    {
        slot.1 = value;
    } else {
        entries.push((Value::symbol(key), value));
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Symbol(s) => write!(f, ":{s}"),
            Self::Seq(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
