//! Name to constructor table for directive kinds.
use std::collections::BTreeMap;
use std::fmt;

use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::value::Value;

/// Builds zero or more directives from one node's arguments.
///
/// Constructors emit through [`Context::emit`] rather than returning
/// directives, so a single node can fan out into many. Only fatal problems are
/// returned as errors; everything else is logged and skipped.
pub type Constructor = fn(&Dispatcher, &mut Context, &[Value]) -> Result<(), DottyError>;

/// Explicit registry of directive constructors, built once per run.
#[derive(Clone, Default)]
pub struct Registry {
    constructors: BTreeMap<String, Constructor>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

impl Registry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in directive.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::directives::register_builtin(&mut registry);
        registry
    }

    /// Add or replace the constructor for `name`.
    pub fn register(&mut self, name: impl Into<String>, constructor: Constructor) {
        self.constructors.insert(name.into(), constructor);
    }

    /// Constructor registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Constructor> {
        self.constructors.get(name).copied()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}
