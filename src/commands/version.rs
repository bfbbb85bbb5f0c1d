//! Command: print version information.
use std::io::{self, Write};

/// Version embedded at build time, falling back to the crate version.
pub const VERSION: &str = match option_env!("DOTTY_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// Print the dotty version to stdout.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
pub fn run() -> io::Result<()> {
    writeln!(io::stdout().lock(), "dotty {VERSION}")
}
