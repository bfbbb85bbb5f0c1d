// Shared helpers for integration tests.
//
// Provides a temporary configuration repository with its own home directory
// and the plumbing to walk it without spawning processes.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotty::dispatch::Dispatcher;
use dotty::exec::{CommandSpec, ExecResult, Executor, ExecutorHandle};
use dotty::loader::JsonLoader;
use dotty::pipeline::{self, Plan, Runner};
use dotty::platform::{Os, Platform};
use dotty::registry::Registry;

/// Executor that reports success for every command and finds no programs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutor;

impl Executor for NoopExecutor {
    fn run(&self, _command: &CommandSpec) -> anyhow::Result<ExecResult> {
        Ok(ExecResult::ok())
    }

    fn which(&self, _program: &str) -> Option<PathBuf> {
        None
    }
}

/// An isolated configuration repository and home directory, both backed by
/// [`tempfile::TempDir`] and deleted on drop.
pub struct TestRepo {
    root: tempfile::TempDir,
    home: tempfile::TempDir,
}

impl TestRepo {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create root dir"),
            home: tempfile::tempdir().expect("create home dir"),
        }
    }

    /// Canonical repository root.
    pub fn root(&self) -> String {
        canonical(self.root.path())
    }

    /// Canonical home directory.
    pub fn home(&self) -> String {
        canonical(self.home.path())
    }

    /// Write `contents` to `rel` under the root, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> &Self {
        let path = self.root.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, contents).expect("write repo file");
        self
    }

    /// Plan for this repository with the given bots and a [`NoopExecutor`].
    pub fn plan(&self, bots: &[&str]) -> Plan {
        Plan {
            root: self.root(),
            home: self.home(),
            shell: "/bin/sh".to_string(),
            bots: bots.iter().map(ToString::to_string).collect(),
            only: Vec::new(),
            except: Vec::new(),
            env_config: None,
            executor: ExecutorHandle::new(NoopExecutor),
        }
    }

    /// Descriptions of every directive `plan` emits.
    pub fn describe(&self, plan: &Plan) -> Vec<String> {
        let mut out = Vec::new();
        dotty::commands::inspect::describe_all(&dispatcher(), plan, &mut out)
            .expect("describe run");
        String::from_utf8(out)
            .expect("utf-8 output")
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    /// Execute every directive `plan` emits, returning the runner.
    pub fn install(&self, plan: &Plan) -> Runner {
        let mut runner = Runner::default();
        pipeline::run(&dispatcher(), plan, |directive| runner.accept(&directive))
            .expect("install run");
        runner
    }
}

/// Dispatcher with every built-in directive, loading JSON as on Linux.
pub fn dispatcher() -> Dispatcher {
    Dispatcher::new(
        Registry::builtin(),
        Arc::new(JsonLoader::new(Platform::new(Os::Linux))),
    )
}

fn canonical(path: &Path) -> String {
    dunce::canonicalize(path)
        .expect("canonicalize temp dir")
        .display()
        .to_string()
}
