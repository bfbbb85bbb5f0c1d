//! Typed per-directive options.
//!
//! Every option field is optional: a context carries the defaults set with
//! `def`, a directive's own map overrides them, and the directive supplies the
//! final fallback when it resolves a value.
use tracing::warn;

use crate::error::OptionError;
use crate::value::Value;

/// A set of options for one directive kind.
pub trait OptionSet: Clone + Default {
    /// Assign the option `name` from `value`.
    ///
    /// # Errors
    ///
    /// Returns [`OptionError::Unknown`] for names this kind does not define and
    /// [`OptionError::Mismatch`] (or [`OptionError::Permission`]) when the value
    /// has the wrong shape; the previous value is kept in both cases.
    fn set(&mut self, name: &str, value: &Value) -> Result<(), OptionError>;

    /// Copy of `self` with every recognised symbol key of `entries` applied.
    ///
    /// Unknown keys are ignored (maps also carry `:path`, `:when`, …); values
    /// of the wrong type are reported and leave the inherited value in place.
    #[must_use]
    fn overlay(&self, entries: &[(Value, Value)]) -> Self {
        let mut merged = self.clone();
        for (key, value) in entries {
            let Some(name) = key.as_symbol() else {
                continue;
            };
            match merged.set(name, value) {
                Ok(()) | Err(OptionError::Unknown(_)) => {}
                Err(err) => warn!("{err}"),
            }
        }
        merged
    }
}

fn read_bool(name: &str, value: &Value) -> Result<bool, OptionError> {
    value.as_bool().ok_or_else(|| OptionError::Mismatch {
        name: name.to_string(),
        expected: "boolean",
        found: value.type_name(),
    })
}

fn read_string(name: &str, value: &Value) -> Result<String, OptionError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| OptionError::Mismatch {
            name: name.to_string(),
            expected: "string",
            found: value.type_name(),
        })
}

/// Parse a permission value written in octal, either as text (`"0755"`) or
/// as an integer whose decimal digits are octal digits (`755`).
///
/// # Errors
///
/// Returns [`OptionError::Permission`] when the digits are not octal.
pub fn parse_mode(value: &Value) -> Result<u32, OptionError> {
    let text = value.to_text();
    u32::from_str_radix(text.trim(), 8).map_err(|_| OptionError::Permission(text))
}

/// Options for `mkdir`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MkdirOptions {
    /// Permission bits for created directories.
    pub permissions: Option<u32>,
}

impl MkdirOptions {
    /// Mode used when none is configured.
    pub const DEFAULT_MODE: u32 = 0o744;

    /// Configured mode or [`Self::DEFAULT_MODE`].
    #[must_use]
    pub fn mode(&self) -> u32 {
        self.permissions.unwrap_or(Self::DEFAULT_MODE)
    }
}

impl OptionSet for MkdirOptions {
    fn set(&mut self, name: &str, value: &Value) -> Result<(), OptionError> {
        match name {
            "chmod" | "permissions" => self.permissions = Some(parse_mode(value)?),
            _ => return Err(OptionError::Unknown(name.to_string())),
        }
        Ok(())
    }
}

/// Options for `link`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOptions {
    /// Create missing parent directories of the destination.
    pub mkdirs: Option<bool>,
    /// Replace a destination that is already a symlink.
    pub relink: Option<bool>,
    /// Replace any existing (non-directory) destination.
    pub force: Option<bool>,
    /// Treat sources as glob patterns.
    pub glob: Option<bool>,
    /// Create symlinks even when the source is missing.
    pub ignore_missing: Option<bool>,
    /// Create symbolic rather than hard links.
    pub symbolic: Option<bool>,
}

impl LinkOptions {
    /// Resolve every field against the `link` defaults.
    #[must_use]
    pub fn resolve(&self) -> ResolvedLink {
        ResolvedLink {
            mkdirs: self.mkdirs.unwrap_or(true),
            relink: self.relink.unwrap_or(false),
            force: self.force.unwrap_or(false),
            glob: self.glob.unwrap_or(false),
            ignore_missing: self.ignore_missing.unwrap_or(false),
            symbolic: self.symbolic.unwrap_or(true),
        }
    }
}

/// Fully resolved [`LinkOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ResolvedLink {
    /// Create missing parent directories of the destination.
    pub mkdirs: bool,
    /// Replace a destination that is already a symlink.
    pub relink: bool,
    /// Replace any existing (non-directory) destination.
    pub force: bool,
    /// Treat sources as glob patterns.
    pub glob: bool,
    /// Create symlinks even when the source is missing.
    pub ignore_missing: bool,
    /// Create symbolic rather than hard links.
    pub symbolic: bool,
}

impl Default for ResolvedLink {
    fn default() -> Self {
        LinkOptions::default().resolve()
    }
}

impl OptionSet for LinkOptions {
    fn set(&mut self, name: &str, value: &Value) -> Result<(), OptionError> {
        let slot = match name {
            "mkdirs" => &mut self.mkdirs,
            "relink" => &mut self.relink,
            "force" => &mut self.force,
            "glob" => &mut self.glob,
            "ignore-missing" => &mut self.ignore_missing,
            "symbolic" => &mut self.symbolic,
            _ => return Err(OptionError::Unknown(name.to_string())),
        };
        *slot = Some(read_bool(name, value)?);
        Ok(())
    }
}

/// Options for `clean`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanOptions {
    /// Remove dead links even if they point outside the root.
    pub force: Option<bool>,
    /// Descend into subdirectories.
    pub recursive: Option<bool>,
}

impl OptionSet for CleanOptions {
    fn set(&mut self, name: &str, value: &Value) -> Result<(), OptionError> {
        let slot = match name {
            "force" => &mut self.force,
            "recursive" => &mut self.recursive,
            _ => return Err(OptionError::Unknown(name.to_string())),
        };
        *slot = Some(read_bool(name, value)?);
        Ok(())
    }
}

/// Options for `shell` (and the commands `package` and conditions spawn).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOptions {
    /// Message logged before the command runs.
    pub desc: Option<String>,
    /// Default for the three stream flags.
    pub interactive: Option<bool>,
    /// Suppress logging about the command, including failures.
    pub quiet: Option<bool>,
    /// Connect standard input.
    pub stdin: Option<bool>,
    /// Connect standard output.
    pub stdout: Option<bool>,
    /// Connect standard error.
    pub stderr: Option<bool>,
}

impl ShellOptions {
    /// Resolve every field, deriving stream defaults from `interactive`.
    #[must_use]
    pub fn resolve(&self) -> ResolvedShell {
        let interactive = self.interactive.unwrap_or(false);
        ResolvedShell {
            desc: self.desc.clone().unwrap_or_default(),
            interactive,
            quiet: self.quiet.unwrap_or(false),
            stdin: self.stdin.unwrap_or(interactive),
            stdout: self.stdout.unwrap_or(interactive),
            stderr: self.stderr.unwrap_or(interactive),
        }
    }
}

impl OptionSet for ShellOptions {
    fn set(&mut self, name: &str, value: &Value) -> Result<(), OptionError> {
        if name == "desc" {
            self.desc = Some(read_string(name, value)?);
            return Ok(());
        }
        let slot = match name {
            "interactive" => &mut self.interactive,
            "quiet" => &mut self.quiet,
            "stdin" => &mut self.stdin,
            "stdout" => &mut self.stdout,
            "stderr" => &mut self.stderr,
            _ => return Err(OptionError::Unknown(name.to_string())),
        };
        *slot = Some(read_bool(name, value)?);
        Ok(())
    }
}

/// Fully resolved [`ShellOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ResolvedShell {
    /// Message logged before running; empty for none.
    pub desc: String,
    /// Whether the command was declared interactive.
    pub interactive: bool,
    /// Suppress logging about the command.
    pub quiet: bool,
    /// Connect standard input.
    pub stdin: bool,
    /// Connect standard output.
    pub stdout: bool,
    /// Connect standard error.
    pub stderr: bool,
}

/// Options for `package`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOptions {
    /// Default for the three stream flags.
    pub interactive: Option<bool>,
    /// Connect standard input.
    pub stdin: Option<bool>,
    /// Connect standard output.
    pub stdout: Option<bool>,
    /// Connect standard error.
    pub stderr: Option<bool>,
}

impl PackageOptions {
    /// Stream flags `(stdin, stdout, stderr)` with `interactive` as default.
    #[must_use]
    pub fn streams(&self) -> (bool, bool, bool) {
        let interactive = self.interactive.unwrap_or(false);
        (
            self.stdin.unwrap_or(interactive),
            self.stdout.unwrap_or(interactive),
            self.stderr.unwrap_or(interactive),
        )
    }
}

impl OptionSet for PackageOptions {
    fn set(&mut self, name: &str, value: &Value) -> Result<(), OptionError> {
        let slot = match name {
            "interactive" => &mut self.interactive,
            "stdin" => &mut self.stdin,
            "stdout" => &mut self.stdout,
            "stderr" => &mut self.stderr,
            _ => return Err(OptionError::Unknown(name.to_string())),
        };
        *slot = Some(read_bool(name, value)?);
        Ok(())
    }
}

/// Directive kinds that carry options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// `mkdir` / `mkdirs`.
    Mkdir,
    /// `link`.
    Link,
    /// `clean`.
    Clean,
    /// `shell`.
    Shell,
    /// `package` / `packages`.
    Package,
}

impl OptionKind {
    /// The option kind used by the directive `name`, if any.
    #[must_use]
    pub fn from_directive(name: &str) -> Option<Self> {
        match name {
            "mkdir" | "mkdirs" => Some(Self::Mkdir),
            "link" => Some(Self::Link),
            "clean" => Some(Self::Clean),
            "shell" => Some(Self::Shell),
            "package" | "packages" => Some(Self::Package),
            _ => None,
        }
    }
}

/// One option set per directive kind, as carried by a context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindOptions {
    /// Defaults for `mkdir`.
    pub mkdir: MkdirOptions,
    /// Defaults for `link`.
    pub link: LinkOptions,
    /// Defaults for `clean`.
    pub clean: CleanOptions,
    /// Defaults for `shell`.
    pub shell: ShellOptions,
    /// Defaults for `package`.
    pub package: PackageOptions,
}

impl KindOptions {
    /// Assign a single option of `kind`.
    ///
    /// # Errors
    ///
    /// Propagates the [`OptionError`] of the kind's [`OptionSet::set`].
    pub fn set(&mut self, kind: OptionKind, name: &str, value: &Value) -> Result<(), OptionError> {
        match kind {
            OptionKind::Mkdir => self.mkdir.set(name, value),
            OptionKind::Link => self.link.set(name, value),
            OptionKind::Clean => self.clean.set(name, value),
            OptionKind::Shell => self.shell.set(name, value),
            OptionKind::Package => self.package.set(name, value),
        }
    }

    /// Overlay the options of `kind` with a node map, in place.
    pub fn overlay(&mut self, kind: OptionKind, entries: &[(Value, Value)]) {
        match kind {
            OptionKind::Mkdir => self.mkdir = self.mkdir.overlay(entries),
            OptionKind::Link => self.link = self.link.overlay(entries),
            OptionKind::Clean => self.clean = self.clean.overlay(entries),
            OptionKind::Shell => self.shell = self.shell.overlay(entries),
            OptionKind::Package => self.package = self.package.overlay(entries),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn option_kind_covers_aliases() {
        assert_eq!(OptionKind::from_directive("mkdirs"), Some(OptionKind::Mkdir));
        assert_eq!(OptionKind::from_directive("packages"), Some(OptionKind::Package));
        assert_eq!(OptionKind::from_directive("import"), None);
    }

    #[test]
    fn kind_options_set_and_overlay_target_one_kind() {
        let mut opts = KindOptions::default();
        opts.set(OptionKind::Shell, "quiet", &Value::Bool(true)).unwrap();
        opts.overlay(
            OptionKind::Link,
            &[(Value::symbol("force"), Value::Bool(true))],
        );
        assert_eq!(opts.shell.quiet, Some(true));
        assert_eq!(opts.link.force, Some(true));
        assert_eq!(opts.clean.force, None);
    }

    fn entry(key: &str, value: Value) -> (Value, Value) {
        (Value::symbol(key), value)
    }

    #[test]
    fn overlay_overrides_inherited_values() {
        let inherited = LinkOptions {
            force: Some(true),
            ..LinkOptions::default()
        };
        let merged = inherited.overlay(&[
            entry("relink", Value::Bool(true)),
            entry("src", Value::string("ignored")),
        ]);
        assert_eq!(merged.force, Some(true));
        assert_eq!(merged.relink, Some(true));
        assert_eq!(inherited.relink, None, "overlay must not mutate the source");
    }

    #[test]
    fn overlay_keeps_inherited_value_on_type_mismatch() {
        let inherited = CleanOptions {
            force: Some(true),
            recursive: None,
        };
        let merged = inherited.overlay(&[entry("force", Value::string("yes"))]);
        assert_eq!(merged.force, Some(true));
    }

    #[test]
    fn overlay_ignores_string_keys() {
        let merged = LinkOptions::default().overlay(&[(Value::string("force"), Value::Bool(true))]);
        assert_eq!(merged.force, None);
    }

    #[test]
    fn set_reports_unknown_and_mismatch() {
        let mut opts = ShellOptions::default();
        assert_eq!(
            opts.set("nope", &Value::Bool(true)),
            Err(OptionError::Unknown("nope".to_string()))
        );
        assert!(matches!(
            opts.set("quiet", &Value::Integer(1)),
            Err(OptionError::Mismatch { .. })
        ));
        opts.set("desc", &Value::string("hello")).unwrap();
        assert_eq!(opts.desc.as_deref(), Some("hello"));
    }

    #[test]
    fn link_defaults_make_parents_and_symlinks() {
        let resolved = LinkOptions {
            force: Some(true),
            mkdirs: Some(false),
            ..LinkOptions::default()
        }
        .resolve();
        assert!(resolved.force);
        assert!(!resolved.mkdirs);
        assert!(resolved.symbolic);
        assert!(!resolved.glob);
        assert!(ResolvedLink::default().mkdirs);
    }

    #[test]
    fn shell_streams_default_to_interactive() {
        let resolved = ShellOptions {
            interactive: Some(true),
            stdout: Some(false),
            ..ShellOptions::default()
        }
        .resolve();
        assert!(resolved.stdin);
        assert!(!resolved.stdout);
        assert!(resolved.stderr);
        assert!(!resolved.quiet);
    }

    #[test]
    fn package_streams_default_to_interactive() {
        let opts = PackageOptions {
            interactive: Some(true),
            stdin: Some(false),
            ..PackageOptions::default()
        };
        assert_eq!(opts.streams(), (false, true, true));
        assert_eq!(PackageOptions::default().streams(), (false, false, false));
    }

    #[test]
    fn mkdir_mode_parses_octal_text_and_digits() {
        let mut opts = MkdirOptions::default();
        assert_eq!(opts.mode(), 0o744);
        opts.set("chmod", &Value::string("0755")).unwrap();
        assert_eq!(opts.mode(), 0o755);
        opts.set("chmod", &Value::Integer(700)).unwrap();
        assert_eq!(opts.mode(), 0o700);
        assert!(matches!(
            opts.set("chmod", &Value::string("rwx")),
            Err(OptionError::Permission(_))
        ));
        assert_eq!(opts.mode(), 0o700);
    }
}
