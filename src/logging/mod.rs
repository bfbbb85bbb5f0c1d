//! Logging infrastructure: console and file output through `tracing`, and
//! the flag that decides the process exit status.

mod subscriber;
mod utils;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use subscriber::{FILTER_ENV, LogSettings, init_subscriber};

/// Sticky flag raised by the first `ERROR` event of the process.
///
/// Errors never abort a run; a raised flag only turns the exit status into
/// a failure once everything has been processed.
#[derive(Debug, Clone, Default)]
pub struct ErrorFlag {
    raised: Arc<AtomicBool>,
}

impl ErrorFlag {
    /// Record that an error was logged.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Whether an error has been logged.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
