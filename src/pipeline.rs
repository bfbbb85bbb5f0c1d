//! One run: a producer thread walks the configuration while the calling
//! thread consumes the directives it emits.
//!
//! The two sides meet on a rendezvous channel, so the producer never gets
//! ahead of the consumer by more than one directive and every directive is
//! observed in emission order. The channel closes once the producer returns,
//! which happens after the whole tree (including imports) has been walked or
//! a fatal error stopped it.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SyncSender, sync_channel};
use std::thread;

use tracing::{debug, info, warn};

use crate::context::Context;
use crate::directive::BoxedDirective;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::exec::ExecutorHandle;
use crate::paths;
use crate::value::Value;

/// Config file imported at the root of every run.
pub const ROOT_CONFIG: &str = "config";

/// Everything needed to seed the root context of a run.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Configuration repository root.
    pub root: String,
    /// Home directory for `~` and the subprocess `HOME`.
    pub home: String,
    /// Interpreter for shell commands.
    pub shell: String,
    /// Activated bots.
    pub bots: Vec<String>,
    /// Only dispatch these directives (all when empty).
    pub only: Vec<String>,
    /// Never dispatch these directives.
    pub except: Vec<String>,
    /// Environment config whose entries are fed to `def` before the root
    /// import.
    pub env_config: Option<String>,
    /// Runs shell commands and locates programs.
    pub executor: ExecutorHandle,
}

impl Plan {
    fn context(&self, output: SyncSender<BoxedDirective>) -> Context {
        Context::builder(self.root.clone(), output)
            .home(self.home.clone())
            .shell(self.shell.clone())
            .bots(self.bots.iter().cloned())
            .only(self.only.iter().cloned())
            .except(self.except.iter().cloned())
            .executor(self.executor.clone())
            .build()
    }
}

/// Set by the Ctrl-C handler; once raised no further directives execute.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    /// Flag that is raised on Ctrl-C.
    ///
    /// # Errors
    ///
    /// Fails if a handler was already installed for this process.
    pub fn install() -> Result<Self, ctrlc::Error> {
        let interrupt = Self::default();
        let flag = interrupt.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupted, finishing the current directive");
            flag.raise();
        })?;
        Ok(interrupt)
    }

    /// Raise the flag.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Whether the flag has been raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// Run `plan`, handing every directive to `consume` on the calling thread.
///
/// # Errors
///
/// Returns the fatal error that stopped the producer, after the consumer
/// has drained everything emitted before it.
pub fn run(
    dispatcher: &Dispatcher,
    plan: &Plan,
    mut consume: impl FnMut(BoxedDirective),
) -> Result<(), DottyError> {
    let (tx, rx) = sync_channel::<BoxedDirective>(0);
    thread::scope(|scope| {
        let producer = scope.spawn(move || produce(dispatcher, plan, tx));
        for directive in rx {
            consume(directive);
        }
        producer
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
    })
}

fn produce(dispatcher: &Dispatcher, plan: &Plan, output: SyncSender<BoxedDirective>) -> Result<(), DottyError> {
    let mut ctx = plan.context(output);
    if let Some(env_config) = &plan.env_config {
        let path = paths::join(&[plan.root.as_str(), env_config.as_str()]);
        debug!(path = %path, "Loading environment config");
        let entries = dispatcher.loader().load(std::path::Path::new(&path))?;
        dispatcher.dispatch("def", &mut ctx, &entries)?;
    }
    dispatcher.dispatch("import", &mut ctx, &[Value::string(ROOT_CONFIG)])
}

/// Consumer that executes directives until interrupted.
#[derive(Debug, Default)]
pub struct Runner {
    interrupt: Interrupt,
    executed: usize,
    failed: usize,
    skipped: usize,
}

impl Runner {
    /// Runner that stops executing once `interrupt` is raised.
    #[must_use]
    pub fn new(interrupt: Interrupt) -> Self {
        Self {
            interrupt,
            ..Self::default()
        }
    }

    /// Execute `directive`, or drop it if the run was interrupted.
    pub fn accept(&mut self, directive: &BoxedDirective) {
        if self.interrupt.is_raised() {
            self.skipped += 1;
            return;
        }
        self.executed += 1;
        if !directive.execute() {
            self.failed += 1;
        }
    }

    /// Directives that ran.
    #[must_use]
    pub const fn executed(&self) -> usize {
        self.executed
    }

    /// Directives that reported failure.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Log the totals.
    pub fn report(&self) {
        if self.skipped > 0 {
            warn!(skipped = self.skipped, "Run was interrupted");
        }
        info!(
            executed = self.executed,
            failed = self.failed,
            "Finished running directives"
        );
    }
}
