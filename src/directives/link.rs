//! `link`: symlink (or hard link) files into place.
//!
//! ```text
//! (:link "vimrc" "~/.vimrc"
//!        {:src "bin/*" :dest "~/.local/bin" :glob true})
//! ```
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::condition;
use crate::context::Context;
use crate::directive::Directive;
use crate::directives::mkdir;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::glob;
use crate::options::{MkdirOptions, OptionSet, ResolvedLink};
use crate::paths::{self, ExpandSink, SEPARATOR};
use crate::value::{self, Value};

/// Links every source into every destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDirective {
    src: Vec<String>,
    dest: Vec<String>,
    opts: ResolvedLink,
}

impl LinkDirective {
    /// Tilde-expand the paths and mark each destination as a directory when
    /// several files may land in it.
    #[must_use]
    pub fn new(home: &str, src: Vec<String>, dest: Vec<String>, opts: ResolvedLink) -> Self {
        let src: Vec<String> = src.iter().map(|p| paths::expand_tilde(home, p)).collect();
        let into_dir = opts.glob || src.len() > 1;
        let dest = dest
            .iter()
            .map(|p| {
                let mut p = paths::expand_tilde(home, p);
                if into_dir && !p.ends_with(SEPARATOR) {
                    p.push(SEPARATOR);
                }
                p
            })
            .collect();
        Self { src, dest, opts }
    }

    fn flags(&self) -> String {
        let mut flags = String::from(if self.opts.symbolic { "-s" } else { "-P" });
        if self.opts.force {
            flags.push('f');
        }
        if self.opts.glob {
            flags.insert_str(0, "glob ");
        }
        flags
    }

    /// Concrete sources, with globs expanded and missing files dropped. The
    /// flag is false when a source had to be dropped.
    fn sources(&self) -> (Vec<String>, bool) {
        let mut out = Vec::new();
        let mut ok = true;
        for src in &self.src {
            if self.opts.glob {
                let found = glob::expand(src);
                if found.is_empty() {
                    debug!(glob = %src, "Glob matched no files");
                }
                out.extend(found);
            } else if self.opts.symbolic && self.opts.ignore_missing {
                out.push(src.clone());
            } else {
                match Path::new(src).try_exists() {
                    Ok(true) => out.push(src.clone()),
                    Ok(false) => {
                        error!(path = %src, "Link src not found");
                        ok = false;
                    }
                    Err(err) => {
                        error!(path = %src, error = %err, "Error when checking file exists");
                        ok = false;
                    }
                }
            }
        }
        (out, ok)
    }

    /// Link `src` to `dest`; `false` only when something went wrong.
    fn link_one(&self, src: &str, dest: &str) -> bool {
        let mut dest = if dest.ends_with(SEPARATOR) {
            paths::join(&[dest, paths::base_name(src).as_str()])
        } else {
            dest.to_string()
        };

        match fs::symlink_metadata(&dest) {
            Ok(meta) => {
                if self.opts.force || (self.opts.relink && meta.file_type().is_symlink()) {
                    if meta.is_dir() {
                        warn!(src, dest = %dest, "Skipping force link because dest is a directory");
                        return true;
                    }
                    if let Err(err) = fs::remove_file(&dest) {
                        error!(
                            src,
                            dest = %dest,
                            error = %err,
                            "Failed to remove dest before relink, skipping"
                        );
                        return false;
                    }
                } else if meta.is_dir() {
                    dest = paths::join(&[dest.as_str(), paths::base_name(src).as_str()]);
                    if fs::symlink_metadata(&dest).is_ok() {
                        debug!(src, dest = %dest, "Skipping linking src to dest because dest exists.");
                        return true;
                    }
                } else {
                    debug!(src, dest = %dest, "Skipping linking src to dest because dest exists.");
                    return true;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => match self.ensure_parent(src, &dest) {
                Parent::Ready => {}
                Parent::Missing => return true,
                Parent::Failed => return false,
            },
            Err(err) => {
                error!(dest = %dest, error = %err, "Failed to stat destination");
                return false;
            }
        }

        info!(src, dest = %dest, "Linking src to dest");
        match self.link(src, &dest) {
            Ok(()) => true,
            Err(err) => {
                error!(src, dest = %dest, error = %err, "Failed to link files");
                false
            }
        }
    }

    /// Make sure the directory containing `dest` exists.
    fn ensure_parent(&self, src: &str, dest: &str) -> Parent {
        let parent = paths::dir_name(dest);
        match fs::metadata(&parent) {
            Ok(meta) if meta.is_dir() => return Parent::Ready,
            Ok(_) => {
                error!(src, dest, dest_parent = %parent, "Container for dest is not a directory");
                return Parent::Failed;
            }
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                error!(
                    src,
                    dest,
                    dest_parent = %parent,
                    error = %err,
                    "Failed to stat container for dest"
                );
                return Parent::Failed;
            }
            Err(_) => {}
        }

        if !self.opts.mkdirs {
            warn!(src, dest, "Skipping link because destination parent doesn't exist");
            return Parent::Missing;
        }
        match mkdir::create_dir_all(Path::new(&parent), MkdirOptions::DEFAULT_MODE) {
            Ok(()) => Parent::Ready,
            Err(err) => {
                error!(path = %parent, error = %err, "Failed to create parent directory for dest");
                Parent::Failed
            }
        }
    }

    fn link(&self, src: &str, dest: &str) -> io::Result<()> {
        if self.opts.symbolic {
            symlink(src, dest)
        } else {
            fs::hard_link(src, dest)
        }
    }
}

enum Parent {
    Ready,
    Missing,
    Failed,
}

#[cfg(unix)]
fn symlink(src: &str, dest: &str) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dest)
}

#[cfg(windows)]
fn symlink(src: &str, dest: &str) -> io::Result<()> {
    if Path::new(src).is_dir() {
        std::os::windows::fs::symlink_dir(src, dest)
    } else {
        std::os::windows::fs::symlink_file(src, dest)
    }
}

impl Directive for LinkDirective {
    fn execute(&self) -> bool {
        let (sources, mut ok) = self.sources();
        for src in sources {
            for dest in &self.dest {
                ok &= self.link_one(&src, dest);
            }
        }
        ok
    }

    fn describe(&self) -> String {
        let flags = self.flags();
        let mut lines = Vec::with_capacity(self.src.len() * self.dest.len());
        for src in &self.src {
            for dest in &self.dest {
                lines.push(format!("link {flags} {src} {dest}"));
            }
        }
        lines.join("\n")
    }
}

/// Constructor for `link`.
///
/// # Errors
///
/// Never fails.
pub fn construct(dispatcher: &Dispatcher, ctx: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        if let Value::Map(entries) = arg {
            link_map(dispatcher, ctx, entries);
            continue;
        }
        let Some(dest) = args.next() else {
            error!(src = %arg, "Link src with no destination encountered");
            continue;
        };
        let (Some(src), Some(dest)) = (generate_paths(ctx, arg, "src"), generate_paths(ctx, dest, "dest")) else {
            continue;
        };
        ctx.emit(LinkDirective::new(&ctx.home, src, dest, ctx.options.link.resolve()));
    }
    Ok(())
}

fn link_map(dispatcher: &Dispatcher, ctx: &Context, entries: &[(Value, Value)]) {
    if !condition::map_condition(dispatcher, ctx, entries) {
        return;
    }
    let mut fields = Vec::with_capacity(2);
    for field in ["src", "dest"] {
        let Some(arg) = value::lookup(entries, field) else {
            let spec = Value::Map(entries.to_vec());
            error!(spec = %spec, "Link directive must specify a :{field}");
            return;
        };
        let Some(paths) = generate_paths(ctx, arg, field) else {
            return;
        };
        fields.push(paths);
    }
    let (Some(dest), Some(src)) = (fields.pop(), fields.pop()) else {
        return;
    };
    let opts = ctx.options.link.overlay(entries).resolve();
    ctx.emit(LinkDirective::new(&ctx.home, src, dest, opts));
}

/// Paths for one side of a link: a string joined with the working directory,
/// or a path tree expanded against it.
fn generate_paths(ctx: &Context, arg: &Value, field: &str) -> Option<Vec<String>> {
    match arg {
        Value::String(path) => {
            let path = ctx.substitute(path)?;
            Some(vec![paths::join(&[ctx.cwd.as_str(), path.as_str()])])
        }
        Value::Seq(nodes) => {
            let mut sink = LinkPaths {
                ctx,
                paths: Vec::new(),
            };
            paths::expand(nodes, &ctx.cwd, &mut sink);
            Some(sink.paths)
        }
        other => {
            error!(
                path = %other,
                "{field} must be a path, or a list of paths, not {}",
                other.type_name()
            );
            None
        }
    }
}

struct LinkPaths<'a> {
    ctx: &'a Context,
    paths: Vec<String>,
}

impl ExpandSink for LinkPaths<'_> {
    fn transform(&mut self, leaf: &str) -> Option<String> {
        self.ctx.substitute(leaf)
    }

    fn path(&mut self, path: String) {
        self.paths.push(path);
    }

    fn reject(&mut self, _: &str, value: &Value) {
        error!(
            path = %value,
            "Link paths must be a string or a list of strings, not {}",
            value.type_name()
        );
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::directives::test_helpers::{Harness, map, s, seq, sym};

    fn root(dir: &tempfile::TempDir) -> String {
        dunce::canonicalize(dir.path()).unwrap().display().to_string()
    }

    fn opts(configure: impl FnOnce(&mut ResolvedLink)) -> ResolvedLink {
        let mut opts = ResolvedLink::default();
        configure(&mut opts);
        opts
    }

    fn link(src: &str, dest: &str, opts: ResolvedLink) -> LinkDirective {
        LinkDirective::new("/home/test", vec![src.to_string()], vec![dest.to_string()], opts)
    }

    // -----------------------------------------------------------------------
    // construct
    // -----------------------------------------------------------------------

    #[test]
    fn pairs_are_joined_against_cwd() {
        let mut h = Harness::new();
        h.dispatch("link", &[s("vimrc"), s("~/.vimrc"), s("a"), s("/etc/b")]);
        assert_eq!(
            h.described(),
            [
                "link -s /root/vimrc /home/test/.vimrc",
                "link -s /root/a /etc/b",
            ]
        );
    }

    #[test]
    fn dangling_src_is_dropped() {
        let mut h = Harness::new();
        h.dispatch("link", &[s("a"), s("b"), s("c")]);
        assert_eq!(h.described(), ["link -s /root/a /root/b"]);
    }

    #[test]
    fn several_sources_link_into_directories() {
        let mut h = Harness::new();
        h.dispatch(
            "link",
            &[seq(vec![seq(vec![s("bin"), seq(vec![s("x"), s("y")])])]), s("~/bin")],
        );
        assert_eq!(
            h.described(),
            ["link -s /root/bin/x /home/test/bin/\nlink -s /root/bin/y /home/test/bin/"]
        );
    }

    #[test]
    fn describe_lists_every_source_and_destination_pair() {
        let directive = LinkDirective::new(
            "/home/test",
            vec!["/root/a".to_string(), "/root/b".to_string()],
            vec!["~/x".to_string(), "/y/".to_string()],
            opts(|o| o.force = true),
        );
        assert_eq!(
            directive.describe(),
            "link -sf /root/a /home/test/x/\n\
             link -sf /root/a /y/\n\
             link -sf /root/b /home/test/x/\n\
             link -sf /root/b /y/"
        );
    }

    #[test]
    fn map_form_applies_options_and_condition() {
        let mut h = Harness::with_bots(&["vim"]);
        h.dispatch(
            "link",
            &[
                map(&[
                    ("src", s("bin/*")),
                    ("dest", s("~/.local/bin")),
                    ("glob", Value::Bool(true)),
                    ("force", Value::Bool(true)),
                ]),
                map(&[("src", s("vimrc")), ("dest", s("~/.vimrc")), ("if-bots", s("vim"))]),
                map(&[("src", s("emacs")), ("dest", s("~/.emacs")), ("if-bots", s("emacs"))]),
                map(&[("src", s("no-dest"))]),
                map(&[("src", s("x")), ("dest", s("y")), ("symbolic", Value::Bool(false))]),
            ],
        );
        assert_eq!(
            h.described(),
            [
                "link glob -sf /root/bin/* /home/test/.local/bin/",
                "link -s /root/vimrc /home/test/.vimrc",
                "link -P /root/x /root/y",
            ]
        );
    }

    #[test]
    fn context_options_are_inherited() {
        let mut h = Harness::new();
        h.dispatch_tree(&[
            seq(vec![sym("def"), seq(vec![sym("link"), s("force"), Value::Bool(true)])]),
            seq(vec![sym("link"), s("a"), s("b")]),
        ])
        .unwrap();
        assert_eq!(h.described(), ["link -sf /root/a /root/b"]);
    }

    #[test]
    fn non_path_arguments_are_rejected() {
        let mut h = Harness::new();
        h.ctx.set_env("DOTTY_LINK_NAME", "zshrc");
        h.dispatch(
            "link",
            &[
                Value::Integer(1),
                s("b"),
                s("$DOTTY_LINK_NAME"),
                seq(vec![s("~/.zshrc"), Value::Bool(true)]),
            ],
        );
        assert_eq!(h.described(), ["link -s /root/zshrc /home/test/.zshrc"]);
    }

    // -----------------------------------------------------------------------
    // execute
    // -----------------------------------------------------------------------

    #[test]
    fn creates_symlink_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let root = root(&dir);
        fs::write(format!("{root}/vimrc"), "set nu").unwrap();

        let dest = format!("{root}/home/.vim/vimrc");
        assert!(link(&format!("{root}/vimrc"), &dest, ResolvedLink::default()).execute());
        assert_eq!(fs::read_link(&dest).unwrap().display().to_string(), format!("{root}/vimrc"));
        // a second run finds the link in place
        assert!(link(&format!("{root}/vimrc"), &dest, ResolvedLink::default()).execute());
    }

    #[test]
    fn missing_parent_without_mkdirs_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = root(&dir);
        fs::write(format!("{root}/a"), "").unwrap();
        let dest = format!("{root}/missing/a");
        assert!(link(&format!("{root}/a"), &dest, opts(|o| o.mkdirs = false)).execute());
        assert!(fs::symlink_metadata(&dest).is_err());
    }

    #[test]
    fn missing_source_is_an_error_unless_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = root(&dir);
        let dest = format!("{root}/dest");

        assert!(!link(&format!("{root}/gone"), &dest, ResolvedLink::default()).execute());
        assert!(fs::symlink_metadata(&dest).is_err());

        assert!(link(&format!("{root}/gone"), &dest, opts(|o| o.ignore_missing = true)).execute());
        assert!(fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
    }

    #[test]
    fn existing_file_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let root = root(&dir);
        fs::write(format!("{root}/src"), "new").unwrap();
        fs::write(format!("{root}/dest"), "old").unwrap();
        let src = format!("{root}/src");
        let dest = format!("{root}/dest");

        assert!(link(&src, &dest, opts(|o| o.relink = true)).execute());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old");

        assert!(link(&src, &dest, opts(|o| o.force = true)).execute());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
        assert!(fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
    }

    #[test]
    fn relink_replaces_symlinks_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = root(&dir);
        fs::write(format!("{root}/old"), "").unwrap();
        fs::write(format!("{root}/new"), "").unwrap();
        let dest = format!("{root}/dest");
        std::os::unix::fs::symlink(format!("{root}/old"), &dest).unwrap();

        assert!(link(&format!("{root}/new"), &dest, opts(|o| o.relink = true)).execute());
        assert_eq!(fs::read_link(&dest).unwrap().display().to_string(), format!("{root}/new"));
    }

    #[test]
    fn existing_directory_receives_link() {
        let dir = tempfile::tempdir().unwrap();
        let root = root(&dir);
        fs::write(format!("{root}/tool"), "").unwrap();
        fs::create_dir(format!("{root}/bin")).unwrap();

        assert!(link(&format!("{root}/tool"), &format!("{root}/bin"), ResolvedLink::default()).execute());
        assert!(fs::symlink_metadata(format!("{root}/bin/tool")).unwrap().file_type().is_symlink());

        // force never replaces a directory
        assert!(link(&format!("{root}/tool"), &format!("{root}/bin"), opts(|o| o.force = true)).execute());
        assert!(fs::metadata(format!("{root}/bin")).unwrap().is_dir());
    }

    #[test]
    fn glob_links_every_match() {
        let dir = tempfile::tempdir().unwrap();
        let root = root(&dir);
        fs::create_dir(format!("{root}/scripts")).unwrap();
        for name in ["a.sh", "b.sh", "c.txt"] {
            fs::write(format!("{root}/scripts/{name}"), "").unwrap();
        }

        let directive = link(
            &format!("{root}/scripts/*.sh"),
            &format!("{root}/bin"),
            opts(|o| o.glob = true),
        );
        assert!(directive.describe().starts_with("link glob -s "));
        assert!(directive.execute());
        let mut linked: Vec<String> = fs::read_dir(format!("{root}/bin"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        linked.sort();
        assert_eq!(linked, ["a.sh", "b.sh"]);
    }

    #[test]
    fn hard_links_share_content() {
        let dir = tempfile::tempdir().unwrap();
        let root = root(&dir);
        fs::write(format!("{root}/src"), "data").unwrap();
        let dest = format!("{root}/dest");

        assert!(link(&format!("{root}/src"), &dest, opts(|o| o.symbolic = false)).execute());
        assert!(!fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "data");
    }
}
