//! `package`: install packages with the first available package manager.
//!
//! ```text
//! (:package (:pacman "vim" {:pkg "git" :before "..."})
//!           (:apt "vim")
//!           (:default "echo no package manager"))
//! ```
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use super::shell::{self, ShellCommand};
use crate::condition;
use crate::context::{Context, Environment};
use crate::directive::Directive;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::exec::{CommandSpec, Executor, ExecutorHandle};
use crate::options::{OptionSet, PackageOptions};
use crate::platform::Platform;
use crate::value::{self, Value};

/// Supported package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// Python packages (`pip`/`pip3`).
    Pip,
    /// Go modules.
    Go,
    /// Cygwin packages through `cyg-get.bat`.
    Cygwin,
    /// Ruby gems.
    Gem,
    /// Chocolatey (Windows).
    Choco,
    /// Arch Linux packages (pacman, with sudo).
    Pacman,
    /// AUR packages (yay).
    Yay,
    /// MSYS2 packages (`pacman.exe`).
    Msys,
    /// Debian packages (apt, with sudo).
    Apt,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PackageManager {
    /// Manager named by the symbol `name`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "pip" => Self::Pip,
            "go" => Self::Go,
            "cygwin" => Self::Cygwin,
            "gem" => Self::Gem,
            "choco" => Self::Choco,
            "pacman" => Self::Pacman,
            "yay" => Self::Yay,
            "msys" => Self::Msys,
            "apt" => Self::Apt,
            _ => return None,
        })
    }

    /// Symbol naming this manager.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pip => "pip",
            Self::Go => "go",
            Self::Cygwin => "cygwin",
            Self::Gem => "gem",
            Self::Choco => "choco",
            Self::Pacman => "pacman",
            Self::Yay => "yay",
            Self::Msys => "msys",
            Self::Apt => "apt",
        }
    }

    /// Executables that provide this manager, in preference order.
    #[must_use]
    pub const fn programs(self) -> &'static [&'static str] {
        match self {
            Self::Pip => &["pip", "pip3"],
            Self::Go => &["go"],
            Self::Cygwin => &["cyg-get.bat"],
            Self::Gem => &["gem"],
            Self::Choco => &["choco"],
            Self::Pacman => &["pacman"],
            Self::Yay => &["yay"],
            Self::Msys => &["pacman.exe"],
            Self::Apt => &["apt"],
        }
    }

    /// Whether installing requires elevated privileges.
    #[must_use]
    pub const fn sudo(self) -> bool {
        matches!(self, Self::Pacman | Self::Apt)
    }

    /// Path of the first of [`programs`](Self::programs) found on the system.
    #[must_use]
    pub fn locate(self, executor: &dyn Executor) -> Option<PathBuf> {
        self.programs()
            .iter()
            .find_map(|program| executor.which(program))
    }

    /// Command refreshing the package archive, for managers that have one.
    #[must_use]
    pub fn update_command(self, program: &str) -> Option<Vec<String>> {
        let args: &[&str] = match self {
            Self::Pacman | Self::Yay | Self::Msys => &["-Sy"],
            Self::Apt => &["update"],
            _ => return None,
        };
        Some(self.argv(program, args))
    }

    /// Command installing `pkg`, given the package's option map.
    ///
    /// Returns `None` (after logging) when the options are malformed.
    #[must_use]
    pub fn install_command(
        self,
        program: &str,
        pkg: &str,
        entries: &[(Value, Value)],
    ) -> Option<Vec<String>> {
        let argv = match self {
            Self::Pip => {
                let mut args = vec!["install".to_string()];
                if !global(entries)? {
                    args.push("--user".to_string());
                }
                args.push(match value::lookup(entries, "git") {
                    Some(git) => git_url(pkg, git)?,
                    None => pkg.to_string(),
                });
                self.argv(program, &args)
            }
            Self::Go => self.argv(program, &["get", pkg]),
            Self::Cygwin => self.argv(program, &[pkg]),
            Self::Gem => {
                let mut args = vec!["install"];
                if !global(entries)? {
                    args.push("--user-install");
                }
                args.push(pkg);
                self.argv(program, &args)
            }
            Self::Choco => self.argv(program, &["install", "--yes", pkg]),
            Self::Pacman | Self::Yay | Self::Msys => {
                self.argv(program, &["-S", "--needed", "--noconfirm", pkg])
            }
            Self::Apt => self.argv(program, &["install", "--yes", pkg]),
        };
        Some(argv)
    }

    fn argv<S: AsRef<str>>(self, program: &str, args: &[S]) -> Vec<String> {
        let sudo = self.sudo().then_some("sudo");
        sudo.into_iter()
            .chain(std::iter::once(program))
            .chain(args.iter().map(S::as_ref))
            .map(str::to_string)
            .collect()
    }
}

fn global(entries: &[(Value, Value)]) -> Option<bool> {
    match value::lookup(entries, "global") {
        None => Some(false),
        Some(Value::Bool(flag)) => Some(*flag),
        Some(other) => {
            warn!(
                global = %other,
                "Option global must be a boolean, not {}",
                other.type_name()
            );
            None
        }
    }
}

/// `git+https://HOST.com/USER/PKG` from `:git "user"` or
/// `:git {:user "user" :host "gitlab"}`.
fn git_url(pkg: &str, git: &Value) -> Option<String> {
    let (user, host) = match git {
        Value::String(user) => (user.as_str(), "github"),
        Value::Map(entries) => {
            let field = |key| value::lookup(entries, key).and_then(Value::as_str);
            let (Some(user), Some(host)) = (field("user"), field("host")) else {
                error!(
                    package = pkg,
                    git = %git,
                    "Missing :user or :host options, skipping package installation"
                );
                return None;
            };
            (user, host)
        }
        other => {
            warn!(
                package = pkg,
                git = %other,
                "Pip installation git data must be a string or mapping to :host and :user, not {}",
                other.type_name()
            );
            return None;
        }
    };
    Some(format!("git+https://{host}.com/{user}/{pkg}"))
}

/// Package managers whose archive was already refreshed this run.
#[derive(Debug, Default)]
pub struct UpdateTracker(Mutex<HashSet<&'static str>>);

impl UpdateTracker {
    /// Record an update of `manager`; `true` only the first time.
    #[must_use]
    pub fn first_update(&self, manager: PackageManager) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(manager.name())
    }
}

/// Installs one package.
#[derive(Debug)]
pub struct PackageDirective {
    pkg: String,
    manager: PackageManager,
    program: String,
    cmd: Vec<String>,
    cwd: String,
    env: Environment,
    interactive: bool,
    streams: (bool, bool, bool),
    manual: Option<ShellCommand>,
    before: Option<ShellCommand>,
    after: Option<ShellCommand>,
    executor: ExecutorHandle,
    updates: Arc<UpdateTracker>,
    platform: Platform,
}

impl PackageDirective {
    fn spec(&self, argv: &[String]) -> Option<CommandSpec> {
        let (program, args) = argv.split_first()?;
        let (stdin, stdout, stderr) = self.streams;
        Some(CommandSpec {
            cwd: Some(PathBuf::from(&self.cwd)),
            env: Some(Arc::clone(&self.env)),
            stdin,
            stdout,
            stderr,
            ..CommandSpec::new(program.clone()).args(args.iter().cloned())
        })
    }

    fn run(&self, argv: &[String], failure: &str) -> bool {
        let Some(spec) = self.spec(argv) else {
            return false;
        };
        debug!(
            cmd = %spec.command_line(),
            interactive = self.interactive,
            "Running subcommand"
        );
        match self.executor.run(&spec) {
            Ok(result) if result.success => true,
            Ok(result) => {
                error!(
                    package = %self.pkg,
                    manager = %self.manager,
                    cmd = %spec.command_line(),
                    code = ?result.code,
                    "{failure}"
                );
                false
            }
            Err(err) => {
                error!(
                    package = %self.pkg,
                    manager = %self.manager,
                    cmd = %spec.command_line(),
                    error = %err,
                    "{failure}"
                );
                false
            }
        }
    }

    fn sudo_validate(&self) -> bool {
        // sudo has no meaning on Windows
        if self.platform.is_windows() {
            return true;
        }
        let spec = CommandSpec::new("sudo").args(["--validate"]).interactive();
        match self.executor.run(&spec) {
            Ok(result) if result.success => true,
            Ok(result) => {
                error!(code = ?result.code, "Failed to elevate user privileges");
                false
            }
            Err(err) => {
                error!(error = %err, "Failed to elevate user privileges");
                false
            }
        }
    }
}

impl Directive for PackageDirective {
    fn execute(&self) -> bool {
        info!(package = %self.pkg, manager = %self.manager, "Installing package");

        if self.manager.sudo() && !self.sudo_validate() {
            return false;
        }

        if let Some(update) = self.manager.update_command(&self.program)
            && self.updates.first_update(self.manager)
        {
            info!(manager = %self.manager, "Updating package archive for manager");
            if !self.run(&update, "Failed to update package archive") {
                return false;
            }
        }

        if let Some(before) = &self.before
            && !before.run()
        {
            warn!(package = %self.pkg, "Skipping package installation because :before failed");
            return false;
        }

        let installed = match &self.manual {
            Some(manual) => {
                debug!(package = %self.pkg, "Running manual installation command");
                manual.run()
            }
            None => self.run(&self.cmd, "Package installation failed"),
        };
        if !installed {
            warn!(package = %self.pkg, "Failed to install package");
            return false;
        }
        debug!(package = %self.pkg, "Package installed");

        if let Some(after) = &self.after
            && !after.run()
        {
            warn!(package = %self.pkg, "Package installation finished but :after failed");
            return false;
        }
        true
    }

    fn describe(&self) -> String {
        let mut lines = Vec::with_capacity(3);
        if let Some(before) = &self.before {
            lines.push(format!("package-before {}", before.describe()));
        }
        match &self.manual {
            Some(manual) => lines.push(format!("package {}", manual.describe())),
            None => lines.push(format!("package {}", self.cmd.join(" "))),
        }
        if let Some(after) = &self.after {
            lines.push(format!("package-after {}", after.describe()));
        }
        lines.join("\n")
    }
}

/// Constructor for `package` and `packages`.
///
/// # Errors
///
/// Propagates fatal errors from a `:default` clause.
pub fn construct(dispatcher: &Dispatcher, ctx: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    for arg in args {
        let Value::Seq(items) = arg else {
            warn!(
                arg = %arg,
                "The :package directive must be supplied arguments of the form (:manager \"pkg\"), not {}",
                arg.type_name()
            );
            continue;
        };
        let Some((head, packages)) = items.split_first() else {
            continue;
        };
        let Some(name) = head.as_symbol() else {
            warn!(
                pacman = %head,
                "Package managers must be symbols, not {}",
                head.type_name()
            );
            continue;
        };

        if name == "default" {
            warn!("No package manager found, running default clause.");
            return shell::construct(dispatcher, ctx, packages);
        }

        let Some(manager) = PackageManager::from_name(name) else {
            error!(pacman = name, "Unknown package manager");
            continue;
        };
        let Some(program) = manager.locate(&**ctx.executor()) else {
            debug!(pacman = name, "Failed to find package manager");
            continue;
        };
        let program = program.display().to_string();

        let builder = Builder {
            dispatcher,
            ctx,
            manager,
            program: &program,
        };
        for pkg in packages {
            builder.build(pkg);
        }
        return Ok(());
    }

    let args = Value::Seq(args.to_vec());
    error!(args = %args, "No suitable package manager found");
    Ok(())
}

struct Builder<'a> {
    dispatcher: &'a Dispatcher,
    ctx: &'a Context,
    manager: PackageManager,
    program: &'a str,
}

impl Builder<'_> {
    fn build(&self, pkg: &Value) {
        match pkg {
            Value::String(name) => {
                if let Some(cmd) = self.manager.install_command(self.program, name, &[]) {
                    let opts = self.ctx.options.package.clone();
                    self.ctx.emit(self.directive(name, cmd, &opts));
                }
            }
            Value::Map(entries) => self.build_mapped(entries),
            other => warn!(
                package = %other,
                "package targets must be strings or a map containing a :pkg option, not {}",
                other.type_name()
            ),
        }
    }

    fn build_mapped(&self, entries: &[(Value, Value)]) {
        if !condition::map_condition(self.dispatcher, self.ctx, entries) {
            return;
        }
        let Some(name) = value::lookup(entries, "pkg") else {
            let arg = Value::Map(entries.to_vec());
            warn!(
                arg = %arg,
                "Package maps must specify a :pkg field"
            );
            return;
        };
        let Some(name) = name.as_str() else {
            warn!(
                name = %name,
                "Package names must be strings, not {}",
                name.type_name()
            );
            return;
        };

        let Some(manual) = self.hook(entries, "manual") else {
            return;
        };
        let cmd = if manual.is_some() {
            Vec::new()
        } else {
            let Some(cmd) = self.manager.install_command(self.program, name, entries) else {
                return;
            };
            cmd
        };
        let Some(before) = self.hook(entries, "before") else {
            return;
        };
        let Some(after) = self.hook(entries, "after") else {
            return;
        };

        let opts = self.ctx.options.package.overlay(entries);
        let mut directive = self.directive(name, cmd, &opts);
        directive.manual = manual;
        directive.before = before;
        directive.after = after;
        self.ctx.emit(directive);
    }

    /// The shell command under `key`: `Some(None)` when absent, `None` when
    /// present but unbuildable.
    fn hook(&self, entries: &[(Value, Value)], key: &str) -> Option<Option<ShellCommand>> {
        let Some(arg) = value::lookup(entries, key) else {
            return Some(None);
        };
        let mut built = None;
        shell::build(self.ctx, arg, &mut |command| built = Some(command));
        if built.is_none() {
            error!(
                command = %arg,
                "Failed to construct {key} command for package installation"
            );
            return None;
        }
        Some(built)
    }

    fn directive(&self, pkg: &str, cmd: Vec<String>, opts: &PackageOptions) -> PackageDirective {
        PackageDirective {
            pkg: pkg.to_string(),
            manager: self.manager,
            program: self.program.to_string(),
            cmd,
            cwd: self.ctx.cwd.clone(),
            env: self.ctx.environment_for_subprocess(),
            interactive: opts.interactive.unwrap_or(false),
            streams: opts.streams(),
            manual: None,
            before: None,
            after: None,
            executor: self.ctx.executor().clone(),
            updates: Arc::clone(self.dispatcher.updates()),
            platform: Platform::detect(),
        }
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::directives::test_helpers::{Harness, map, s, seq, sym};
    use crate::exec::{ExecResult, MockExecutor};

    // -----------------------------------------------------------------------
    // manager selection
    // -----------------------------------------------------------------------

    #[test]
    fn first_available_manager_wins() {
        let mut h = Harness::with_programs(&["pacman", "apt"]);
        h.dispatch(
            "package",
            &[
                seq(vec![sym("yay"), s("ignored")]),
                seq(vec![sym("pacman"), s("vim"), s("git")]),
                seq(vec![sym("apt"), s("vim")]),
            ],
        );
        assert_eq!(
            h.described(),
            [
                "package sudo /usr/bin/pacman -S --needed --noconfirm vim",
                "package sudo /usr/bin/pacman -S --needed --noconfirm git",
            ]
        );
    }

    #[test]
    fn unknown_manager_is_skipped() {
        let mut h = Harness::with_programs(&["go"]);
        h.dispatch(
            "packages",
            &[
                seq(vec![sym("brew"), s("vim")]),
                seq(vec![sym("go"), s("golang.org/x/tools/gopls")]),
            ],
        );
        assert_eq!(
            h.described(),
            ["package /usr/bin/go get golang.org/x/tools/gopls"]
        );
    }

    #[test]
    fn default_clause_runs_as_shell() {
        let mut h = Harness::with_programs(&[]);
        h.dispatch(
            "package",
            &[
                seq(vec![sym("apt"), s("vim")]),
                seq(vec![sym("default"), s("echo fallback")]),
            ],
        );
        assert_eq!(h.described(), ["shell echo fallback"]);
    }

    #[test]
    fn no_manager_found_emits_nothing() {
        let mut h = Harness::with_programs(&[]);
        h.dispatch("package", &[seq(vec![sym("apt"), s("vim")]), s("bad")]);
        assert!(h.described().is_empty());
    }

    #[test]
    fn pip_falls_back_to_pip3() {
        let mut h = Harness::with_programs(&["pip3"]);
        h.dispatch("package", &[seq(vec![sym("pip"), s("black")])]);
        assert_eq!(h.described(), ["package /usr/bin/pip3 install --user black"]);
    }

    // -----------------------------------------------------------------------
    // package maps
    // -----------------------------------------------------------------------

    #[test]
    fn pip_git_and_global_options() {
        let mut h = Harness::with_programs(&["pip"]);
        h.dispatch(
            "package",
            &[seq(vec![
                sym("pip"),
                map(&[("pkg", s("tool")), ("git", s("me"))]),
                map(&[
                    ("pkg", s("lib")),
                    ("global", Value::Bool(true)),
                    ("git", map(&[("user", s("u")), ("host", s("gitlab"))])),
                ]),
                map(&[("pkg", s("broken")), ("git", map(&[("user", s("u"))]))]),
                map(&[("pkg", s("typo")), ("global", s("yes"))]),
            ])],
        );
        assert_eq!(
            h.described(),
            [
                "package /usr/bin/pip install --user git+https://github.com/me/tool",
                "package /usr/bin/pip install git+https://gitlab.com/u/lib",
            ]
        );
    }

    #[test]
    fn gem_user_install_unless_global() {
        let mut h = Harness::with_programs(&["gem"]);
        h.dispatch(
            "package",
            &[seq(vec![
                sym("gem"),
                s("rake"),
                map(&[("pkg", s("bundler")), ("global", Value::Bool(true))]),
            ])],
        );
        assert_eq!(
            h.described(),
            [
                "package /usr/bin/gem install --user-install rake",
                "package /usr/bin/gem install bundler",
            ]
        );
    }

    #[test]
    fn hooks_and_manual_command_are_described() {
        let mut h = Harness::with_programs(&["go"]);
        h.dispatch(
            "package",
            &[seq(vec![
                sym("go"),
                map(&[
                    ("pkg", s("thing")),
                    ("before", s("echo before")),
                    ("manual", s("make install")),
                    ("after", seq(vec![s("echo a"), s("echo b")])),
                ]),
            ])],
        );
        assert_eq!(
            h.described(),
            ["package-before shell echo before\npackage shell make install\npackage-after shell echo a\necho b"]
        );
    }

    #[test]
    fn malformed_package_maps_are_skipped() {
        let mut h = Harness::with_programs(&["go"]);
        h.dispatch(
            "package",
            &[seq(vec![
                sym("go"),
                map(&[("name", s("nope"))]),
                map(&[("pkg", Value::Integer(1))]),
                map(&[("pkg", s("x")), ("before", Value::Integer(2))]),
                map(&[("pkg", s("y")), ("if-bots", s("absent"))]),
                Value::Bool(true),
            ])],
        );
        assert!(h.described().is_empty());
    }

    // -----------------------------------------------------------------------
    // execution
    // -----------------------------------------------------------------------

    #[test]
    fn sudo_manager_validates_and_updates_once() {
        let mut h = Harness::with_programs(&["apt"]);
        h.dispatch("package", &[seq(vec![sym("apt"), s("vim"), s("git")])]);
        for directive in h.directives() {
            assert!(directive.execute());
        }
        let lines: Vec<String> = h.commands().iter().map(CommandSpec::command_line).collect();
        assert_eq!(
            lines,
            [
                "sudo --validate",
                "sudo /usr/bin/apt update",
                "sudo /usr/bin/apt install --yes vim",
                "sudo --validate",
                "sudo /usr/bin/apt install --yes git",
            ]
        );
    }

    #[test]
    fn package_streams_follow_options() {
        let mut h = Harness::with_programs(&["go"]);
        h.dispatch(
            "package",
            &[seq(vec![
                sym("go"),
                map(&[("pkg", s("x")), ("interactive", Value::Bool(true)), ("stdin", Value::Bool(false))]),
            ])],
        );
        for directive in h.directives() {
            assert!(directive.execute());
        }
        let commands = h.commands();
        assert!(!commands[0].stdin && commands[0].stdout && commands[0].stderr);
        assert_eq!(commands[0].cwd, Some(PathBuf::from("/root")));
    }

    #[test]
    fn failing_before_skips_installation() {
        let mut mock = MockExecutor::new();
        mock.expect_which()
            .returning(|program| (program == "go").then(|| PathBuf::from("/usr/bin/go")));
        mock.expect_run().times(1).returning(|_| Ok(ExecResult::failed(1)));
        let mut h = Harness::with_executor(ExecutorHandle::new(mock));
        h.dispatch(
            "package",
            &[seq(vec![
                sym("go"),
                map(&[("pkg", s("x")), ("before", s("false"))]),
            ])],
        );
        let directives = h.directives();
        assert_eq!(directives.len(), 1);
        assert!(!directives[0].execute());
    }

    #[test]
    fn update_tracker_reports_first_update_only() {
        let tracker = UpdateTracker::default();
        assert!(tracker.first_update(PackageManager::Pacman));
        assert!(!tracker.first_update(PackageManager::Pacman));
        assert!(tracker.first_update(PackageManager::Apt));
    }

    #[test]
    fn manager_names_round_trip() {
        for name in ["pip", "go", "cygwin", "gem", "choco", "pacman", "yay", "msys", "apt"] {
            assert_eq!(PackageManager::from_name(name).unwrap().to_string(), name);
        }
        assert_eq!(PackageManager::from_name("brew"), None);
    }
}
