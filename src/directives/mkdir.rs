//! `mkdir` / `mkdirs`: create directory trees.
use std::path::Path;

use tracing::{debug, error, info};

use crate::context::Context;
use crate::directive::Directive;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::options::OptionKind;
use crate::paths;
use crate::value::Value;

/// Creates one directory and its missing parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkdirDirective {
    path: String,
    mode: u32,
}

impl MkdirDirective {
    /// Directory at `path` created with permission bits `mode`.
    #[must_use]
    pub const fn new(path: String, mode: u32) -> Self {
        Self { path, mode }
    }
}

impl Directive for MkdirDirective {
    fn execute(&self) -> bool {
        let path = Path::new(&self.path);
        match path.try_exists() {
            Ok(true) => {
                debug!(path = %self.path, "Skipping creating directory because path exists");
                return true;
            }
            Ok(false) => {}
            Err(err) => {
                error!(
                    path = %self.path,
                    error = %err,
                    "Failed to check whether directory exists"
                );
                return false;
            }
        }

        info!(path = %self.path, permissions = %format!("{:04o}", self.mode), "Creating directory");
        match create_dir_all(path, self.mode) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    path = %self.path,
                    permissions = %format!("{:04o}", self.mode),
                    error = %err,
                    "Failed to create directory"
                );
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("mkdir {:04o} {}", self.mode, self.path)
    }
}

/// `fs::create_dir_all` applying `mode` to every directory it creates.
///
/// # Errors
///
/// Propagates the I/O error of the first directory that cannot be created.
pub fn create_dir_all(path: &Path, mode: u32) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

/// Constructor for `mkdir` and `mkdirs`.
///
/// # Errors
///
/// Never fails.
pub fn construct(dispatcher: &Dispatcher, ctx: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    dispatcher.walk_paths(ctx, args, Some(OptionKind::Mkdir), &mut |ctx, path| {
        ctx.emit(MkdirDirective::new(
            paths::expand_tilde(&ctx.home, &path),
            ctx.options.mkdir.mode(),
        ));
        Ok(())
    })
}
