//! Subcommand orchestration.
pub mod inspect;
pub mod install;
pub mod list;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::{debug, info, warn};

use crate::cli::{RepoOpts, RunOpts};
use crate::dispatch::Dispatcher;
use crate::exec::ExecutorHandle;
use crate::loader::JsonLoader;
use crate::paths;
use crate::pipeline::Plan;
use crate::platform::Platform;
use crate::registry::Registry;

/// Environment configs looked for at the repository root, in order.
pub const ENV_CONFIG_CANDIDATES: [&str; 3] = [".dotty.env.json", ".dotty.env", ".dotty"];

/// Repository location and defaults shared by every run.
#[derive(Debug)]
pub struct CommandSetup {
    /// Detected platform.
    pub platform: Platform,
    /// Seed for the root context.
    pub plan: Plan,
}

impl CommandSetup {
    /// Resolve the root, home and environment config from `repo`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be determined or no
    /// home directory is known.
    pub fn init(repo: &RepoOpts) -> Result<Self> {
        let platform = Platform::detect();
        let root = resolve_root(repo.cd.as_deref())?;
        let home = match &repo.home {
            Some(home) => home.clone(),
            None => default_home().context("cannot determine home directory. Use --home")?,
        };
        let env_config = repo
            .config
            .clone()
            .or_else(|| find_env_config(&root));
        debug!(root = %root, home = %home, env_config = ?env_config, "Resolved repository");

        Ok(Self {
            platform,
            plan: Plan {
                root,
                home,
                shell: resolve_shell(platform),
                bots: Vec::new(),
                only: Vec::new(),
                except: Vec::new(),
                env_config,
                executor: ExecutorHandle::system(),
            },
        })
    }

    /// Like [`init`](Self::init), also applying the bot and directive
    /// filters of `run`.
    ///
    /// # Errors
    ///
    /// See [`init`](Self::init).
    pub fn for_run(run: &RunOpts) -> Result<Self> {
        let mut setup = Self::init(&run.repo)?;
        setup.plan.bots.clone_from(&run.bots);
        setup.plan.only.clone_from(&run.only);
        setup.plan.except.clone_from(&run.except);
        info!(
            root = %setup.plan.root,
            bots = %run.bots.join(","),
            "Starting dotty"
        );
        Ok(setup)
    }

    /// Dispatcher with every built-in directive and the JSON loader.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Registry::builtin(), Arc::new(JsonLoader::new(self.platform)))
    }
}

/// The repository root: `cd` if given, else the current directory.
///
/// # Errors
///
/// Returns an error if the directory does not exist.
pub fn resolve_root(cd: Option<&Path>) -> Result<String> {
    let dir = match cd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("cannot read the current directory")?,
    };
    let root = dunce::canonicalize(&dir)
        .with_context(|| format!("cannot resolve root directory {}", dir.display()))?;
    Ok(root.display().to_string())
}

/// `$SHELL`, or the platform default when it is unset.
#[must_use]
pub fn resolve_shell(platform: Platform) -> String {
    match std::env::var("SHELL") {
        Ok(shell) if !shell.is_empty() => shell,
        _ => {
            warn!("No SHELL variable found, looking for fallback.");
            platform.default_shell().to_string()
        }
    }
}

fn default_home() -> Option<String> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .filter(|home| !home.is_empty())
}

/// First of [`ENV_CONFIG_CANDIDATES`] that is a regular file under `root`.
#[must_use]
pub fn find_env_config(root: &str) -> Option<String> {
    ENV_CONFIG_CANDIDATES
        .into_iter()
        .find(|name| {
            let path = PathBuf::from(paths::join(&[root, *name]));
            std::fs::metadata(path).is_ok_and(|m| m.is_file())
        })
        .map(ToString::to_string)
}
