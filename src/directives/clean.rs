//! `clean`: remove dead symlinks left behind by earlier installs.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::context::Context;
use crate::directive::Directive;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::options::OptionKind;
use crate::paths;
use crate::value::Value;

/// Removes dead links found in one directory.
///
/// A link is only considered when it points inside `root`, unless `force` is
/// set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanDirective {
    path: String,
    root: String,
    force: bool,
    recursive: bool,
}

impl CleanDirective {
    /// Clean `path`, treating links into `root` as ours.
    #[must_use]
    pub const fn new(path: String, root: String, force: bool, recursive: bool) -> Self {
        Self {
            path,
            root,
            force,
            recursive,
        }
    }

    /// Candidate entries under `path`, without following links.
    fn entries(&self) -> Result<Vec<PathBuf>, String> {
        if self.recursive {
            WalkDir::new(&self.path)
                .into_iter()
                .map(|entry| entry.map(walkdir::DirEntry::into_path))
                .collect::<Result<_, _>>()
                .map_err(|err| err.to_string())
        } else {
            fs::read_dir(&self.path)
                .and_then(|dir| dir.map(|entry| entry.map(|e| e.path())).collect())
                .map_err(|err| err.to_string())
        }
    }

    /// Remove `link` if it is one of ours and dangling.
    fn clean_link(&self, link: &Path) -> bool {
        let target = match fs::read_link(link) {
            Ok(target) => target,
            Err(err) => {
                error!(link = %link.display(), error = %err, "Failed to readlink");
                return false;
            }
        };
        let target = link
            .parent()
            .map_or_else(|| target.clone(), |dir| dir.join(&target));
        let target = target.display().to_string();

        if !self.force && !paths::is_within(&target, &self.root) {
            return true;
        }

        match Path::new(&target).try_exists() {
            Ok(true) => true,
            Ok(false) => {
                info!(path = %link.display(), "Cleaning dead link");
                match fs::remove_file(link) {
                    Ok(()) => true,
                    Err(err) => {
                        error!(
                            path = %link.display(),
                            error = %err,
                            "Error when removing dead link"
                        );
                        false
                    }
                }
            }
            Err(err) => {
                error!(path = %target, error = %err, "Error when checking file exists");
                false
            }
        }
    }
}

impl Directive for CleanDirective {
    fn execute(&self) -> bool {
        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(err) => {
                error!(path = %self.path, error = %err, "Error while listing path");
                return false;
            }
        };

        let mut ok = true;
        for entry in entries {
            let is_link = fs::symlink_metadata(&entry).is_ok_and(|m| m.file_type().is_symlink());
            if is_link {
                ok &= self.clean_link(&entry);
            } else {
                debug!(path = %entry.display(), "Skipping non-link");
            }
        }
        ok
    }

    fn describe(&self) -> String {
        let mut flags = String::new();
        if self.force {
            flags.push_str("-f ");
        }
        if self.recursive {
            flags.push_str("-r ");
        }
        format!("clean {flags}{}", self.path)
    }
}

/// Constructor for `clean`.
///
/// # Errors
///
/// Never fails.
pub fn construct(dispatcher: &Dispatcher, ctx: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    dispatcher.walk_paths(ctx, args, Some(OptionKind::Clean), &mut |ctx, path| {
        ctx.emit(CleanDirective::new(
            paths::expand_tilde(&ctx.home, &path),
            ctx.root.clone(),
            ctx.options.clean.force.unwrap_or(false),
            ctx.options.clean.recursive.unwrap_or(false),
        ));
        Ok(())
    })
}
