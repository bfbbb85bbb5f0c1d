//! `shell`: run command lines through the configured interpreter.
use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::context::{Context, Environment};
use crate::directive::Directive;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::exec::{CommandSpec, ExecutorHandle};
use crate::options::{OptionSet, ResolvedShell, ShellOptions};
use crate::value::{self, Value};

/// A command line bound to a shell, environment and stream settings.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    cmd: String,
    shell: String,
    cwd: String,
    env: Environment,
    opts: ResolvedShell,
    executor: ExecutorHandle,
}

impl ShellCommand {
    /// Bind `cmd` to `ctx` with the given options.
    #[must_use]
    pub fn new(ctx: &Context, cmd: impl Into<String>, opts: &ShellOptions) -> Self {
        Self {
            cmd: cmd.into(),
            shell: ctx.shell.clone(),
            cwd: ctx.cwd.clone(),
            env: ctx.environment_for_subprocess(),
            opts: opts.resolve(),
            executor: ctx.executor().clone(),
        }
    }

    /// The command line.
    #[must_use]
    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    /// The resolved options.
    #[must_use]
    pub const fn options(&self) -> &ResolvedShell {
        &self.opts
    }

    /// Full process description for the executor.
    #[must_use]
    pub fn spec(&self) -> CommandSpec {
        let flag = if self.shell == "cmd" || self.shell == "cmd.exe" {
            "/c"
        } else {
            "-c"
        };
        CommandSpec {
            cwd: Some(PathBuf::from(&self.cwd)),
            env: Some(self.env.clone()),
            stdin: self.opts.stdin,
            stdout: self.opts.stdout,
            stderr: self.opts.stderr,
            ..CommandSpec::new(self.shell.clone()).args([flag, self.cmd.as_str()])
        }
    }

    /// Run the command, returning whether it exited successfully.
    pub fn run(&self) -> bool {
        if !self.opts.desc.is_empty() {
            info!("{}", self.opts.desc);
        }
        if !self.opts.quiet {
            debug!(
                shell = %self.shell,
                cmd = %self.cmd,
                interactive = self.opts.interactive,
                "Running subcommand"
            );
        }

        match self.executor.run(&self.spec()) {
            Ok(result) if result.success => true,
            Ok(result) => {
                if !self.opts.quiet {
                    error!(
                        shell = %self.shell,
                        cmd = %self.cmd,
                        code = ?result.code,
                        "Subcommand failed"
                    );
                }
                false
            }
            Err(err) => {
                if !self.opts.quiet {
                    error!(
                        shell = %self.shell,
                        cmd = %self.cmd,
                        error = %err,
                        "Failed to spawn subcommand"
                    );
                }
                false
            }
        }
    }
}

impl Directive for ShellCommand {
    fn execute(&self) -> bool {
        self.run()
    }

    fn describe(&self) -> String {
        format!("shell {}", self.cmd)
    }
}

/// Constructor for `shell`.
///
/// # Errors
///
/// Never fails; malformed commands are logged.
pub fn construct(_: &Dispatcher, ctx: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    for arg in args {
        build(ctx, arg, &mut |command| ctx.emit(command));
    }
    Ok(())
}

/// Build the command described by one `shell` argument.
pub fn build(ctx: &Context, arg: &Value, on_built: &mut dyn FnMut(ShellCommand)) {
    match arg {
        Value::Map(entries) => build_mapped(ctx, entries, on_built),
        other => build_lines(ctx, &ctx.options.shell, other, on_built),
    }
}

/// Build a command from a `{:cmd ... opts}` map.
pub fn build_mapped(
    ctx: &Context,
    entries: &[(Value, Value)],
    on_built: &mut dyn FnMut(ShellCommand),
) {
    let Some(cmd) = value::lookup(entries, "cmd") else {
        let opts = Value::Map(entries.to_vec());
        error!(
            opts = %opts,
            "shell directive must supply a :cmd field"
        );
        return;
    };
    let opts = ctx.options.shell.overlay(entries);
    build_lines(ctx, &opts, cmd, on_built);
}

fn build_lines(
    ctx: &Context,
    opts: &ShellOptions,
    cmd: &Value,
    on_built: &mut dyn FnMut(ShellCommand),
) {
    match cmd {
        Value::String(line) => on_built(ShellCommand::new(ctx, line.clone(), opts)),
        Value::Seq(lines) => {
            let mut joined = Vec::with_capacity(lines.len());
            for line in lines {
                let Some(line) = line.as_str() else {
                    error!(cmd_line = %cmd, "shell command lines can only consist of strings");
                    return;
                };
                joined.push(line);
            }
            on_built(ShellCommand::new(ctx, joined.join("\n"), opts));
        }
        other => error!(
            cmd_line = %other,
            "shell command lines can only be lines, lists of lines or maps containing them, not {}",
            other.type_name()
        ),
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::directives::test_helpers::{Harness, map, s, seq};
    use crate::exec::{ExecResult, MockExecutor};
    use crate::options::OptionKind;

    #[test]
    fn string_and_line_list_arguments() {
        let mut h = Harness::new();
        h.dispatch("shell", &[s("echo hi"), seq(vec![s("a"), s("b")])]);
        assert_eq!(h.described(), ["shell echo hi", "shell a\nb"]);
    }

    #[test]
    fn non_string_line_is_rejected() {
        let mut h = Harness::new();
        h.dispatch("shell", &[seq(vec![s("a"), Value::Integer(1)]), Value::Bool(true)]);
        assert!(h.described().is_empty());
    }

    #[test]
    fn map_requires_cmd() {
        let mut h = Harness::new();
        h.dispatch("shell", &[map(&[("desc", s("nothing"))])]);
        assert!(h.described().is_empty());
    }

    #[test]
    fn map_options_override_context_defaults() {
        let mut h = Harness::new();
        h.ctx
            .options
            .set(OptionKind::Shell, "interactive", &Value::Bool(true))
            .unwrap();
        h.dispatch(
            "shell",
            &[
                s("plain"),
                map(&[("cmd", seq(vec![s("x")])), ("stdout", Value::Bool(false))]),
            ],
        );
        let directives = h.directives();
        assert_eq!(directives.len(), 2);
        for directive in &directives {
            assert!(directive.execute());
        }
        let commands = h.commands();
        assert!(commands[0].stdin && commands[0].stdout && commands[0].stderr);
        assert!(commands[1].stdin && !commands[1].stdout && commands[1].stderr);
    }

    #[test]
    fn command_runs_in_cwd_with_context_environment() {
        let mut h = Harness::new();
        h.ctx.set_env("DOTTY_TEST_SHELL", "yes");
        let mut built = Vec::new();
        build(&h.ctx, &s("true"), &mut |c| built.push(c));
        let spec = built[0].spec();
        assert_eq!(spec.program, "/bin/sh");
        assert_eq!(spec.cwd, Some(PathBuf::from("/root")));
        let env = spec.env.unwrap();
        assert!(env.iter().any(|(k, v)| k == "DOTTY_TEST_SHELL" && v == "yes"));
        assert!(env.iter().any(|(k, v)| k == "HOME" && v == "/home/test"));
    }

    #[test]
    fn cmd_shell_uses_slash_c() {
        let mut h = Harness::new();
        h.ctx.shell = "cmd.exe".to_string();
        let mut built = Vec::new();
        build(&h.ctx, &s("dir"), &mut |c| built.push(c));
        assert_eq!(built[0].spec().args, ["/c", "dir"]);
    }

    #[test]
    fn run_reports_failure_and_spawn_errors() {
        let mut mock = MockExecutor::new();
        let mut calls = 0;
        mock.expect_run().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(ExecResult::failed(2))
            } else {
                Err(anyhow::anyhow!("no such shell"))
            }
        });
        let h = Harness::with_executor(ExecutorHandle::new(mock));
        let mut built = Vec::new();
        build(&h.ctx, &map(&[("cmd", s("x")), ("quiet", Value::Bool(true))]), &mut |c| {
            built.push(c);
        });
        assert!(built[0].options().quiet);
        assert!(!built[0].run());
        assert!(!built[0].run());
    }

    #[test]
    fn describe_renders_command() {
        let mut h = Harness::new();
        h.dispatch("shell", &[map(&[("cmd", s("make install")), ("desc", s("build"))])]);
        assert_eq!(h.described(), ["shell make install"]);
    }
}
