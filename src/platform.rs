//! Operating system detection used by platform tags and shell defaults.
use std::fmt;

/// Detected operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux (and other free Unixes).
    Linux,
    /// Windows.
    Windows,
    /// macOS.
    Darwin,
    /// Anything else.
    Other,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
            Self::Darwin => write!(f, "darwin"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub const fn detect() -> Self {
        Self {
            os: Self::detect_os(),
        }
    }

    /// Platform with an explicit OS.
    #[must_use]
    pub const fn new(os: Os) -> Self {
        Self { os }
    }

    /// Whether this is Linux.
    #[must_use]
    pub fn is_linux(&self) -> bool {
        self.os == Os::Linux
    }

    /// Whether this is Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Whether this is macOS.
    #[must_use]
    pub fn is_darwin(&self) -> bool {
        self.os == Os::Darwin
    }

    /// Linux or macOS.
    #[must_use]
    pub fn is_unix(&self) -> bool {
        self.is_linux() || self.is_darwin()
    }

    /// Interpreter used when `$SHELL` is unset.
    #[must_use]
    pub const fn default_shell(&self) -> &'static str {
        match self.os {
            Os::Windows => "cmd",
            Os::Linux | Os::Darwin | Os::Other => "/bin/sh",
        }
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Darwin
        } else if cfg!(any(target_os = "linux", target_os = "freebsd")) {
            Os::Linux
        } else {
            Os::Other
        }
    }
}
