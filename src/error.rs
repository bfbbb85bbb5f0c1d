//! Domain-specific error types for the directive engine.
//!
//! Most problems in a configuration are recovered where they are found: the
//! offending node is logged and skipped. The types here cover the rest:
//! failures that stop the run ([`DottyError`]) and the small typed errors that
//! helpers hand back to a caller which decides how loudly to report them
//! ([`OptionError`]).
//!
//! # Error hierarchy
//!
//! ```text
//! DottyError
//! ├── Load(LoadError)         : reading/decoding a config file
//! ├── Tag(TagError)           : a structural tag applied to the wrong node
//! └── BotsFile(BotsFileError) : persisting the installed bots
//! ```
//!
//! Command handlers convert these to [`anyhow::Error`] with `?`.

use thiserror::Error;

/// Fatal error that aborts a run.
#[derive(Error, Debug)]
pub enum DottyError {
    /// A config file could not be loaded.
    #[error("Configuration error: {0}")]
    Load(#[from] LoadError),

    /// A tag was misapplied.
    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    /// The bots file could not be updated.
    #[error("Bots file error: {0}")]
    BotsFile(#[from] BotsFileError),
}

/// Errors that arise while reading and decoding a config file.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file could not be read.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path of the config file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not well-formed.
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: String,
        /// Underlying decoder error.
        source: serde_json::Error,
    },

    /// The top-level value is not a list of directives.
    #[error("Config file {path} must contain a list of directives")]
    NotAList {
        /// Path of the config file.
        path: String,
    },

    /// The file contains a value with no counterpart in the value model.
    #[error("Unsupported value in {path}: {value}")]
    Unsupported {
        /// Path of the config file.
        path: String,
        /// Rendering of the offending value.
        value: String,
    },

    /// A tag inside the file failed.
    #[error("Tag error in {path}: {source}")]
    Tag {
        /// Path of the config file.
        path: String,
        /// Underlying tag error.
        source: TagError,
    },
}

/// Errors raised by structural tags.
#[derive(Error, Debug)]
pub enum TagError {
    /// The tag is only valid on one directive kind.
    #[error("The {tag} tag can only be applied to :{expected} directives, not {found}")]
    WrongDirective {
        /// Tag name, e.g. `dot/link-gen`.
        tag: &'static str,
        /// Directive the tag accepts.
        expected: &'static str,
        /// Rendering of the node it was applied to.
        found: String,
    },

    /// A link-gen map has neither `:src` nor `:dest`.
    #[error("The dot/link-gen tag requires a :src or :dest field in {0}")]
    MissingLinkPath(String),

    /// A link-gen path leaf is not a path.
    #[error("Link paths must be a string or a list of strings, not {0}")]
    InvalidLinkPath(String),

    /// A gen-bots argument is not a path, list or map.
    #[error("Import arguments must be paths, lists of paths or maps containing paths, not {0}")]
    InvalidImport(String),

    /// No tag with this name exists.
    #[error("Unknown tag #{0}")]
    Unknown(String),
}

/// Errors reading a single directive option.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OptionError {
    /// The option holds a value of the wrong type.
    #[error("{name} should be a {expected} value, not {found}")]
    Mismatch {
        /// Option name.
        name: String,
        /// Expected value type.
        expected: &'static str,
        /// Actual value type.
        found: &'static str,
    },

    /// The option is not understood by this directive kind.
    #[error("Unknown option {0}")]
    Unknown(String),

    /// The permission value is not an octal number.
    #[error("Permissions must be a valid octal file mode, not {0}")]
    Permission(String),
}

/// Errors persisting the bots file.
#[derive(Error, Debug)]
pub enum BotsFileError {
    /// Reading or writing the bots file failed.
    #[error("IO error on bots file {path}: {source}")]
    Io {
        /// Path of the bots file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    // -----------------------------------------------------------------------
    // LoadError
    // -----------------------------------------------------------------------

    #[test]
    fn load_error_io_display() {
        let e = LoadError::Io {
            path: "/dots/config.json".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(e.to_string().contains("/dots/config.json"));
        assert!(e.to_string().contains("IO error reading config file"));
    }

    #[test]
    fn load_error_io_has_source() {
        use std::error::Error as StdError;
        let e = LoadError::Io {
            path: "/dots/config.json".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert!(e.source().is_some());
    }

    #[test]
    fn load_error_not_a_list_display() {
        let e = LoadError::NotAList {
            path: "config.json".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "Config file config.json must contain a list of directives"
        );
    }

    #[test]
    fn load_error_parse_display() {
        let source = serde_json::from_str::<serde_json::Value>("[").expect_err("invalid json");
        let e = LoadError::Parse {
            path: "config.json".to_string(),
            source,
        };
        assert!(e.to_string().starts_with("Failed to parse config file config.json"));
    }

    // -----------------------------------------------------------------------
    // TagError
    // -----------------------------------------------------------------------

    #[test]
    fn tag_error_wrong_directive_display() {
        let e = TagError::WrongDirective {
            tag: "dot/link-gen",
            expected: "link",
            found: "(:mkdir \"x\")".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "The dot/link-gen tag can only be applied to :link directives, not (:mkdir \"x\")"
        );
    }

    #[test]
    fn tag_error_unknown_display() {
        let e = TagError::Unknown("dot/nope".to_string());
        assert_eq!(e.to_string(), "Unknown tag #dot/nope");
    }

    // -----------------------------------------------------------------------
    // OptionError
    // -----------------------------------------------------------------------

    #[test]
    fn option_error_mismatch_display() {
        let e = OptionError::Mismatch {
            name: "force".to_string(),
            expected: "boolean",
            found: "string",
        };
        assert_eq!(e.to_string(), "force should be a boolean value, not string");
    }

    // -----------------------------------------------------------------------
    // DottyError conversions
    // -----------------------------------------------------------------------

    #[test]
    fn dotty_error_from_load_error() {
        let e: DottyError = LoadError::NotAList {
            path: "x".to_string(),
        }
        .into();
        assert!(e.to_string().contains("Configuration error"));
    }

    #[test]
    fn dotty_error_from_tag_error() {
        let e: DottyError = TagError::Unknown("t".to_string()).into();
        assert!(e.to_string().contains("Tag error"));
    }

    #[test]
    fn dotty_error_from_bots_file_error() {
        let e: DottyError = BotsFileError::Io {
            path: ".dotty.bots".to_string(),
            source: io::Error::other("disk full"),
        }
        .into();
        assert!(e.to_string().contains(".dotty.bots"));
    }

    // -----------------------------------------------------------------------
    // Send + Sync bounds
    // -----------------------------------------------------------------------

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<DottyError>();
        assert_send_sync::<LoadError>();
        assert_send_sync::<TagError>();
        assert_send_sync::<OptionError>();
        assert_send_sync::<BotsFileError>();
    }

    #[test]
    fn dotty_error_converts_to_anyhow() {
        let e = DottyError::from(TagError::Unknown("x".to_string()));
        let _anyhow_err: anyhow::Error = e.into();
    }
}
