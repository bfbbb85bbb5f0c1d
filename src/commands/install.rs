//! Command: run every directive, then remember the installed bots.
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context as _, Result};
use tracing::{debug, info};

use super::CommandSetup;
use crate::cli::InstallOpts;
use crate::error::BotsFileError;
use crate::paths;
use crate::pipeline::{self, Interrupt, Runner};

/// Bots file used when neither `--save-bots` nor the environment name one.
pub const DEFAULT_BOTS_FILE: &str = ".dotty.bots";

/// Environment variable overriding [`DEFAULT_BOTS_FILE`].
pub const BOTS_FILE_ENV: &str = "DOTTY_BOTS_FILE";

/// Run the install command.
///
/// # Errors
///
/// Returns an error if the repository cannot be located, a fatal
/// configuration error stops the run, or the bots file cannot be written.
pub fn run(opts: &InstallOpts) -> Result<()> {
    let setup = CommandSetup::for_run(&opts.run)?;
    let dispatcher = setup.dispatcher();
    let interrupt = Interrupt::install().context("failed to install the Ctrl-C handler")?;

    let mut runner = Runner::new(interrupt);
    let result = pipeline::run(&dispatcher, &setup.plan, |directive| {
        runner.accept(&directive);
    });
    runner.report();
    result?;

    let requested = opts
        .save_bots
        .clone()
        .or_else(|| std::env::var(BOTS_FILE_ENV).ok());
    if let Some(file) = bots_file(requested.as_deref()) {
        let path = paths::expand_tilde(
            &setup.plan.home,
            &paths::join(&[setup.plan.root.as_str(), file]),
        );
        save_bots(Path::new(&path), &setup.plan.bots)?;
        info!(path = %path, "Saved bots");
    }
    Ok(())
}

/// The bots file to update, or `None` when saving is disabled.
#[must_use]
pub fn bots_file(requested: Option<&str>) -> Option<&str> {
    match requested {
        Some("") => None,
        Some(file) => Some(file),
        None => Some(DEFAULT_BOTS_FILE),
    }
}

/// Merge `bots` into the comma-separated list stored at `path`.
///
/// Entries already in the file keep their position; new bots are appended
/// in the order given. A missing file counts as empty.
///
/// # Errors
///
/// Returns [`BotsFileError::Io`] if the file cannot be read or written.
pub fn save_bots(path: &Path, bots: &[String]) -> Result<(), BotsFileError> {
    let io_err = |source: io::Error| BotsFileError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut saved = match fs::read_to_string(path) {
        Ok(text) => parse_bots(&text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(io_err(e)),
    };
    for bot in bots {
        if !saved.contains(bot) {
            saved.push(bot.clone());
        }
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    debug!(path = %path.display(), bots = %saved.join(","), "Writing bots file");
    fs::write(path, format!("{}\n", saved.join(","))).map_err(io_err)
}

fn parse_bots(text: &str) -> Vec<String> {
    let mut bots: Vec<String> = Vec::new();
    for bot in text.split([',', '\n']).map(str::trim) {
        if !bot.is_empty() && !bots.iter().any(|b| b == bot) {
            bots.push(bot.to_string());
        }
    }
    bots
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    // -----------------------------------------------------------------------
    // bots_file
    // -----------------------------------------------------------------------

    #[test]
    fn bots_file_defaults_and_disables() {
        assert_eq!(bots_file(None), Some(DEFAULT_BOTS_FILE));
        assert_eq!(bots_file(Some("")), None);
        assert_eq!(bots_file(Some("state/bots")), Some("state/bots"));
    }

    // -----------------------------------------------------------------------
    // save_bots
    // -----------------------------------------------------------------------

    #[test]
    fn save_bots_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join(".dotty.bots");
        save_bots(&path, &strings(&["git", "vim"])).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "git,vim\n");
    }

    #[test]
    fn save_bots_keeps_existing_and_appends_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dotty.bots");
        fs::write(&path, " zsh , git,\n").unwrap();
        save_bots(&path, &strings(&["git", "emacs"])).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "zsh,git,emacs\n");
    }

    #[test]
    fn save_bots_with_no_bots_rewrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dotty.bots");
        fs::write(&path, "git,,git").unwrap();
        save_bots(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "git\n");
    }

    #[test]
    fn save_bots_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be read as a bots file
        let err = save_bots(dir.path(), &strings(&["git"])).unwrap_err();
        let BotsFileError::Io { path, .. } = &err;
        assert_eq!(path, &dir.path().display().to_string());
    }
}
