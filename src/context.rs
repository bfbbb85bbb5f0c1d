//! Inheritable configuration scope threaded through dispatch.
//!
//! Cloning a [`Context`] copies the per-kind options and the variable map,
//! so a child scope can change them freely. The bot set, the directive
//! filters, the import set and the output channel sit behind `Arc`s (or are
//! channel handles) and stay shared by every context derived from the same
//! root.
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, warn};

use crate::directive::{BoxedDirective, Directive};
use crate::exec::ExecutorHandle;
use crate::options::KindOptions;

/// Subprocess environment as `(name, value)` pairs.
pub type Environment = Arc<[(String, String)]>;

/// One configuration scope.
#[derive(Clone)]
pub struct Context {
    /// Root of the configuration repository.
    pub root: String,
    /// Directory relative paths are resolved against.
    pub cwd: String,
    /// Home directory `~` expands to.
    pub home: String,
    /// Interpreter used for shell commands.
    pub shell: String,
    /// Per-kind option defaults.
    pub options: KindOptions,
    env: BTreeMap<String, String>,
    environ: OnceLock<Environment>,
    bots: Arc<BTreeSet<String>>,
    only: Arc<[String]>,
    except: Arc<[String]>,
    imports: Arc<Mutex<HashSet<String>>>,
    output: SyncSender<BoxedDirective>,
    executor: ExecutorHandle,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.root)
            .field("cwd", &self.cwd)
            .field("home", &self.home)
            .field("shell", &self.shell)
            .field("options", &self.options)
            .field("env", &self.env)
            .field("bots", &self.bots)
            .field("only", &self.only)
            .field("except", &self.except)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Start building a root context rooted (and positioned) at `root`.
    #[must_use]
    pub fn builder(root: impl Into<String>, output: SyncSender<BoxedDirective>) -> ContextBuilder {
        ContextBuilder {
            root: root.into(),
            home: String::new(),
            shell: String::new(),
            bots: BTreeSet::new(),
            only: Vec::new(),
            except: Vec::new(),
            env: BTreeMap::new(),
            executor: None,
            output,
        }
    }

    /// Clone of this context positioned at `cwd`.
    #[must_use]
    pub fn with_cwd(&self, cwd: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.cwd = cwd.into();
        child
    }

    /// Value of the variable `name`: the context's own definitions first,
    /// then the process environment. Unknown names resolve to `""`.
    #[must_use]
    pub fn resolve_variable(&self, name: &str) -> String {
        if let Some(value) = self.env.get(name) {
            return value.clone();
        }
        if let Ok(value) = std::env::var(name) {
            return value;
        }
        warn!(variable = name, "Failed to find environment variable");
        String::new()
    }

    /// Expand `$VAR` and `${VAR}` references in `template`.
    ///
    /// Returns `None` only for malformed syntax (an unterminated or empty
    /// `${`); missing variables expand to the empty string.
    #[must_use]
    pub fn substitute(&self, template: &str) -> Option<String> {
        if has_malformed_reference(template) {
            warn!(template, "Malformed variable reference");
            return None;
        }
        let expanded =
            shellexpand::env_with_context_no_errors(template, |name| Some(self.resolve_variable(name)));
        Some(expanded.into_owned())
    }

    /// The process environment overlaid with this context's variables.
    ///
    /// Computed on first use and cached until [`set_env`](Self::set_env).
    #[must_use]
    pub fn environment_for_subprocess(&self) -> Environment {
        Arc::clone(self.environ.get_or_init(|| {
            let mut merged: BTreeMap<String, String> = std::env::vars().collect();
            merged.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged.into_iter().collect()
        }))
    }

    /// Define the variable `name` in this scope.
    pub fn set_env(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.env.insert(name.into(), value.into());
        self.environ = OnceLock::new();
    }

    /// Variable defined in this scope, ignoring the process environment.
    #[must_use]
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// Whether the directive `name` is filtered out by `--only`/`--except`.
    #[must_use]
    pub fn should_skip(&self, name: &str) -> bool {
        if self.except.iter().any(|d| d == name) {
            return true;
        }
        !self.only.is_empty() && !self.only.iter().any(|d| d == name)
    }

    /// The activated bots.
    #[must_use]
    pub fn bots(&self) -> &BTreeSet<String> {
        &self.bots
    }

    /// Record `path` as imported; `false` if it already was.
    #[must_use]
    pub fn mark_imported(&self, path: &str) -> bool {
        self.imports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string())
    }

    /// Executor for conditions, shell commands and package managers.
    #[must_use]
    pub const fn executor(&self) -> &ExecutorHandle {
        &self.executor
    }

    /// Send a directive to the consumer, blocking until it is taken.
    pub fn emit(&self, directive: impl Directive + 'static) {
        if self.output.send(Box::new(directive)).is_err() {
            debug!("Directive consumer has gone away, dropping directive");
        }
    }
}

fn has_malformed_reference(template: &str) -> bool {
    let mut rest = template;
    while let Some(idx) = rest.find("${") {
        let after = rest.get(idx + 2..).unwrap_or_default();
        match after.find('}') {
            None | Some(0) => return true,
            Some(end) => rest = after.get(end + 1..).unwrap_or_default(),
        }
    }
    false
}

/// Builder for the root [`Context`] of a run.
#[derive(Debug)]
pub struct ContextBuilder {
    root: String,
    home: String,
    shell: String,
    bots: BTreeSet<String>,
    only: Vec<String>,
    except: Vec<String>,
    env: BTreeMap<String, String>,
    executor: Option<ExecutorHandle>,
    output: SyncSender<BoxedDirective>,
}

impl ContextBuilder {
    /// Home directory; also exported to subprocesses as `HOME`.
    #[must_use]
    pub fn home(mut self, home: impl Into<String>) -> Self {
        self.home = home.into();
        self
    }

    /// Shell interpreter.
    #[must_use]
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Activated bots.
    #[must_use]
    pub fn bots<I: IntoIterator<Item = String>>(mut self, bots: I) -> Self {
        self.bots.extend(bots);
        self
    }

    /// Allow-list of directive names.
    #[must_use]
    pub fn only<I: IntoIterator<Item = String>>(mut self, names: I) -> Self {
        self.only.extend(names);
        self
    }

    /// Deny-list of directive names.
    #[must_use]
    pub fn except<I: IntoIterator<Item = String>>(mut self, names: I) -> Self {
        self.except.extend(names);
        self
    }

    /// Predefine a variable.
    #[must_use]
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Executor; defaults to [`ExecutorHandle::system`].
    #[must_use]
    pub fn executor(mut self, executor: ExecutorHandle) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Finish the root context.
    #[must_use]
    pub fn build(self) -> Context {
        let mut env = self.env;
        if !self.home.is_empty() {
            env.entry("HOME".to_string())
                .or_insert_with(|| self.home.clone());
        }
        Context {
            cwd: self.root.clone(),
            root: self.root,
            home: self.home,
            shell: self.shell,
            options: KindOptions::default(),
            env,
            environ: OnceLock::new(),
            bots: Arc::new(self.bots),
            only: self.only.into(),
            except: self.except.into(),
            imports: Arc::new(Mutex::new(HashSet::new())),
            output: self.output,
            executor: self.executor.unwrap_or_else(ExecutorHandle::system),
        }
    }
}
