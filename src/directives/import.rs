//! `import`: load further configuration files and dispatch them in place.
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::paths;
use crate::value::Value;

/// Constructor for `import`.
///
/// # Errors
///
/// Load failures of a resolved file are fatal.
pub fn construct(dispatcher: &Dispatcher, ctx: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    if args.is_empty() {
        warn!("Tried to import with no files");
        return Ok(());
    }
    dispatcher.walk_paths(ctx, args, None, &mut |ctx, target| {
        import_file(dispatcher, ctx, &target)
    })
}

fn import_file(dispatcher: &Dispatcher, ctx: &Context, target: &str) -> Result<(), DottyError> {
    let Some(file) = resolve(target, dispatcher.loader().extension()) else {
        error!(path = target, cwd = %ctx.cwd, "Failed to resolve import target");
        return Ok(());
    };

    let key = dunce::canonicalize(&file).map_or_else(|_| file.clone(), |p| p.display().to_string());
    if !ctx.mark_imported(&key) {
        warn!(path = %file, "Skipping import because it's already been imported");
        return Ok(());
    }

    info!(path = %file, "Importing config file");
    let nodes = dispatcher.loader().load(Path::new(&file))?;
    let mut child = ctx.with_cwd(paths::dir_name(&file));
    dispatcher.dispatch_tree(&mut child, &nodes)
}

/// The config file `target` refers to: the first regular file among
/// `target/dotty.EXT`, `target.dotty`, `target.EXT`, `.target.EXT`,
/// `.target`, `target/.config` and `target` itself.
#[must_use]
pub fn resolve(target: &str, extension: &str) -> Option<String> {
    let dir = paths::dir_name(target);
    let base = paths::base_name(target);
    debug!(cwd = %dir, target = %base, "Looking for import target");

    let candidate = |parts: &[String]| {
        let mut all = vec![dir.clone()];
        all.extend_from_slice(parts);
        paths::join(&all)
    };
    [
        candidate(&[base.clone(), format!("dotty.{extension}")]),
        candidate(&[format!("{base}.dotty")]),
        candidate(&[format!("{base}.{extension}")]),
        candidate(&[format!(".{base}.{extension}")]),
        candidate(&[format!(".{base}")]),
        candidate(&[base.clone(), ".config".to_string()]),
        candidate(std::slice::from_ref(&base)),
    ]
    .into_iter()
    .find(|candidate| std::fs::metadata(candidate).is_ok_and(|m| m.is_file()))
}
