//! Command-line interface.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "dotty",
    about = "Declarative dotfile manager driven by nested directive lists",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Logging options.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Most verbose log level to show
    #[arg(short = 'l', long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Also write the log to this file (`-` for stdout)
    #[arg(short = 'L', long, global = true)]
    pub log_file: Option<String>,

    /// Log as JSON objects
    #[arg(short = 'j', long, global = true)]
    pub log_json: bool,
}

/// Log verbosity.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Everything, including dispatch tracing.
    Trace,
    /// Debug messages and above.
    Debug,
    /// Progress messages and above.
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every directive of the configuration
    Install(InstallOpts),
    /// Print what install would do without doing it
    Inspect(RunOpts),
    /// List the directives configurations may use
    ListDirs,
    /// List every bot the configuration refers to
    ListBots(RepoOpts),
    /// Print version information
    Version,
}

/// Locating the configuration repository.
#[derive(Args, Debug, Clone, Default)]
pub struct RepoOpts {
    /// Root directory of the configuration repository
    #[arg(short = 'd', long = "cd")]
    pub cd: Option<PathBuf>,

    /// Environment config, relative to the root
    #[arg(short = 'c', long)]
    pub config: Option<String>,

    /// Home directory links and `~` resolve against
    #[arg(short = 'H', long)]
    pub home: Option<String>,
}

/// Options for a full run.
#[derive(Args, Debug, Clone, Default)]
pub struct RunOpts {
    /// Only run these directives
    #[arg(short = 'o', long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Never run these directives
    #[arg(short = 'e', long, value_delimiter = ',')]
    pub except: Vec<String>,

    /// Bots to install
    #[arg(short = 'b', long, value_delimiter = ',')]
    pub bots: Vec<String>,

    /// Repository options.
    #[command(flatten)]
    pub repo: RepoOpts,
}

/// Options for the `install` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct InstallOpts {
    /// Run options.
    #[command(flatten)]
    pub run: RunOpts,

    /// File installed bots are remembered in, relative to the root
    /// (default `.dotty.bots` or `$DOTTY_BOTS_FILE`; empty disables)
    #[arg(short = 'B', long)]
    pub save_bots: Option<String>,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_install_lists() {
        let cli = Cli::parse_from([
            "dotty", "install", "-b", "git,vim", "--except", "package", "-o", "link,mkdir",
        ]);
        assert!(matches!(&cli.command, Command::Install(_)));
        if let Command::Install(opts) = cli.command {
            assert_eq!(opts.run.bots, ["git", "vim"]);
            assert_eq!(opts.run.except, ["package"]);
            assert_eq!(opts.run.only, ["link", "mkdir"]);
            assert_eq!(opts.save_bots, None);
        }
    }

    #[test]
    fn parse_repo_options() {
        let cli = Cli::parse_from(["dotty", "inspect", "--cd", "/tmp/dots", "-H", "/home/me", "-c", "env.json"]);
        assert!(matches!(&cli.command, Command::Inspect(_)));
        if let Command::Inspect(opts) = cli.command {
            assert_eq!(opts.repo.cd, Some(PathBuf::from("/tmp/dots")));
            assert_eq!(opts.repo.home.as_deref(), Some("/home/me"));
            assert_eq!(opts.repo.config.as_deref(), Some("env.json"));
        }
    }

    #[test]
    fn save_bots_may_be_empty() {
        let cli = Cli::parse_from(["dotty", "install", "--save-bots", ""]);
        assert!(matches!(&cli.command, Command::Install(_)));
        if let Command::Install(opts) = cli.command {
            assert_eq!(opts.save_bots.as_deref(), Some(""));
        }
    }

    #[test]
    fn global_log_options_follow_subcommand() {
        let cli = Cli::parse_from(["dotty", "list-dirs", "-l", "debug", "-j", "-L", "-"]);
        assert!(matches!(cli.command, Command::ListDirs));
        assert_eq!(cli.global.log_level, LogLevel::Debug);
        assert!(cli.global.log_json);
        assert_eq!(cli.global.log_file.as_deref(), Some("-"));
        assert_eq!(LevelFilter::from(cli.global.log_level), LevelFilter::DEBUG);
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["dotty", "list-bots"]);
        assert_eq!(cli.global.log_level, LogLevel::Info);
        assert!(matches!(cli.command, Command::ListBots(RepoOpts { cd: None, .. })));
        assert!(matches!(
            Cli::parse_from(["dotty", "version"]).command,
            Command::Version
        ));
    }
}
