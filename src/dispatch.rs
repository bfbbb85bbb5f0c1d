//! Turning value-tree nodes into directives.
//!
//! [`Dispatcher`] owns the collaborators every constructor may need (the
//! registry, the config loader used by `import`, the bot hook used by the
//! `bots` predicate) and is passed explicitly to each constructor.
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, trace, warn};

use crate::condition;
use crate::context::Context;
use crate::directives::package::UpdateTracker;
use crate::error::DottyError;
use crate::loader::ConfigLoader;
use crate::options::OptionKind;
use crate::paths::{self, ExpandSink};
use crate::registry::Registry;
use crate::value::{self, Value};

/// Answers "is this bot being installed?" for the `bots` predicate.
pub trait BotHook: Send + Sync + fmt::Debug {
    /// Whether `bot` counts as active in `ctx`.
    fn check(&self, ctx: &Context, bot: &str) -> bool;
}

/// Default hook: plain membership in the context's bot set.
#[derive(Debug, Default, Clone, Copy)]
pub struct MembershipHook;

impl BotHook for MembershipHook {
    fn check(&self, ctx: &Context, bot: &str) -> bool {
        ctx.bots().contains(bot)
    }
}

/// Hook that reports every distinct bot name once and treats all bots as
/// active, so every bot-guarded branch of a configuration is visited.
pub struct BotEnumerator {
    seen: Mutex<BTreeSet<String>>,
    on_new: Box<dyn Fn(&str) + Send + Sync>,
}

impl BotEnumerator {
    /// Enumerator calling `on_new` the first time each bot is checked.
    #[must_use]
    pub fn new(on_new: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            seen: Mutex::new(BTreeSet::new()),
            on_new: Box::new(on_new),
        }
    }
}

impl fmt::Debug for BotEnumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotEnumerator")
            .field("seen", &self.seen)
            .finish_non_exhaustive()
    }
}

impl BotHook for BotEnumerator {
    fn check(&self, _ctx: &Context, bot: &str) -> bool {
        let fresh = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bot.to_string());
        if fresh {
            (self.on_new)(bot);
        }
        true
    }
}

/// Dispatches directive nodes to their constructors.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    loader: Arc<dyn ConfigLoader>,
    bot_hook: Arc<dyn BotHook>,
    updates: Arc<UpdateTracker>,
}

impl Dispatcher {
    /// Dispatcher using plain bot membership.
    #[must_use]
    pub fn new(registry: Registry, loader: Arc<dyn ConfigLoader>) -> Self {
        Self {
            registry: Arc::new(registry),
            loader,
            bot_hook: Arc::new(MembershipHook),
            updates: Arc::new(UpdateTracker::default()),
        }
    }

    /// Replace the bot hook.
    #[must_use]
    pub fn with_bot_hook(mut self, hook: Arc<dyn BotHook>) -> Self {
        self.bot_hook = hook;
        self
    }

    /// The directive registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The loader `import` reads files with.
    #[must_use]
    pub fn loader(&self) -> &dyn ConfigLoader {
        self.loader.as_ref()
    }

    /// Package manager updates already performed this run.
    #[must_use]
    pub const fn updates(&self) -> &Arc<UpdateTracker> {
        &self.updates
    }

    /// Ask the bot hook whether `bot` is active.
    #[must_use]
    pub fn check_bot(&self, ctx: &Context, bot: &str) -> bool {
        trace!(bot, "Checking if installing bot");
        self.bot_hook.check(ctx, bot)
    }

    /// Run the constructor registered as `name`.
    ///
    /// An unknown name is logged and produces nothing.
    ///
    /// # Errors
    ///
    /// Propagates fatal errors from the constructor.
    pub fn dispatch(&self, name: &str, ctx: &mut Context, args: &[Value]) -> Result<(), DottyError> {
        match self.registry.get(name) {
            Some(constructor) => constructor(self, ctx, args),
            None => {
                let args = Value::Seq(args.to_vec());
                error!(
                    directive = name,
                    args = %args,
                    "Failed to find directive"
                );
                Ok(())
            }
        }
    }

    /// Dispatch every `(:name args...)` node of `nodes` in order.
    ///
    /// A malformed node is logged and ends processing of the remaining
    /// siblings; nodes named by the context's filters are skipped silently.
    ///
    /// # Errors
    ///
    /// Propagates fatal errors from constructors.
    pub fn dispatch_tree(&self, ctx: &mut Context, nodes: &[Value]) -> Result<(), DottyError> {
        for (index, node) in nodes.iter().enumerate() {
            let Value::Seq(items) = node else {
                error!(
                    arg = %node,
                    "Directives must be a list, not {}",
                    node.type_name()
                );
                return Ok(());
            };
            let Some((head, args)) = items.split_first() else {
                error!(index = index + 1, "Empty directive found.");
                return Ok(());
            };
            let Some(name) = head.as_symbol() else {
                error!(
                    index = index + 1,
                    value = %node,
                    "Directive statements should be symbols"
                );
                return Ok(());
            };
            if ctx.should_skip(name) {
                continue;
            }
            self.dispatch(name, ctx, args)?;
        }
        Ok(())
    }

    /// Expand path arguments shared by `import`, `mkdir` and `clean`.
    ///
    /// String leaves are substituted and joined against `ctx.cwd`; each
    /// completed path is passed to `visit` with the context it belongs to. A
    /// map with a `:path` key opens a child scope at the map's position: its
    /// `:if-bots`/`:when` condition must hold, its options (for `kind`) are
    /// applied, and its `:path` is walked inside that scope.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error from `visit`.
    pub fn walk_paths(
        &self,
        ctx: &Context,
        args: &[Value],
        kind: Option<OptionKind>,
        visit: &mut dyn FnMut(&Context, String) -> Result<(), DottyError>,
    ) -> Result<(), DottyError> {
        let mut sink = Walk {
            ctx,
            steps: Vec::new(),
        };
        paths::expand(args, &ctx.cwd, &mut sink);

        for step in sink.steps {
            match step {
                Step::Path(path) => visit(ctx, path)?,
                Step::Scope { base, entries } => {
                    let Some(nested) = value::lookup(&entries, "path") else {
                        let directive = Value::Map(entries.clone());
                        warn!(
                            directive = %directive,
                            "Directive maps must specify a :path field"
                        );
                        continue;
                    };
                    let mut child = ctx.with_cwd(base);
                    if !condition::map_condition(self, &child, &entries) {
                        continue;
                    }
                    if let Some(kind) = kind {
                        child.options.overlay(kind, &entries);
                    }
                    match nested {
                        Value::String(_) => {
                            self.walk_paths(&child, std::slice::from_ref(nested), kind, visit)?;
                        }
                        Value::Seq(items) => self.walk_paths(&child, items, kind, visit)?,
                        other => warn!(
                            path = %other,
                            "path must be a string or list of strings, not {}",
                            other.type_name()
                        ),
                    }
                }
            }
        }
        Ok(())
    }
}

enum Step {
    Path(String),
    Scope {
        base: String,
        entries: Vec<(Value, Value)>,
    },
}

struct Walk<'a> {
    ctx: &'a Context,
    steps: Vec<Step>,
}

impl ExpandSink for Walk<'_> {
    fn transform(&mut self, leaf: &str) -> Option<String> {
        self.ctx.substitute(leaf)
    }

    fn path(&mut self, path: String) {
        self.steps.push(Step::Path(path));
    }

    fn reject(&mut self, base: &str, value: &Value) {
        match value {
            Value::Map(entries) => self.steps.push(Step::Scope {
                base: base.to_string(),
                entries: entries.clone(),
            }),
            other => warn!(
                directive = %other,
                "Directive must be a map of symbols to options, not {}",
                other.type_name()
            ),
        }
    }
}
