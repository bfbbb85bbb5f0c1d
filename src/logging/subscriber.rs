//! Tracing subscriber setup: console formatter, file layer and the error
//! flag.
use std::fs;
use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{Context as _, Result};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields, format};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt as _};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt as _;

use super::ErrorFlag;
use super::utils::{EventFields, strip_ansi, timestamp};

/// Environment variable holding extra `EnvFilter` directives.
pub const FILTER_ENV: &str = "DOTTY_LOG";

/// Where and how to log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Most verbose level shown.
    pub level: LevelFilter,
    /// Also append plain lines to this file (`-` for stdout).
    pub file: Option<String>,
    /// Emit console output as JSON objects.
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            file: None,
            json: false,
        }
    }
}

/// Appends every event as one timestamped line with ANSI codes stripped.
pub(super) struct FileLayer {
    out: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for FileLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLayer").finish_non_exhaustive()
    }
}

impl FileLayer {
    /// Layer writing to `path`, or to stdout for `-`.
    pub(super) fn open(path: &str) -> io::Result<Self> {
        let out: Box<dyn Write + Send> = if path == "-" {
            Box::new(io::stdout())
        } else {
            Box::new(fs::OpenOptions::new().create(true).append(true).open(path)?)
        };
        Ok(Self::new(out))
    }

    pub(super) fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<S: Subscriber> Layer<S> for FileLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = EventFields::default();
        event.record(&mut fields);
        let line = strip_ansi(&format!(
            "{} {:<5} {}{}",
            timestamp(),
            event.metadata().level().as_str(),
            fields.message,
            fields.pairs()
        ));
        if let Ok(mut out) = self.out.lock() {
            writeln!(out, "{line}").ok();
        }
    }
}

/// Raises the [`ErrorFlag`] on the first `ERROR` event.
pub(super) struct ErrorFlagLayer(pub(super) ErrorFlag);

impl<S: Subscriber> Layer<S> for ErrorFlagLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.raise();
        }
    }
}

/// Console format: coloured level prefixes followed by `key=value` fields.
struct DottyFormatter;

impl<S, N> FormatEvent<S, N> for DottyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut fields = EventFields::default();
        event.record(&mut fields);
        let msg = &fields.message;
        let pairs = fields.pairs();

        match *event.metadata().level() {
            Level::ERROR => writeln!(writer, "\x1b[31mERROR\x1b[0m {msg}\x1b[2m{pairs}\x1b[0m"),
            Level::WARN => writeln!(writer, "\x1b[33mWARN\x1b[0m  {msg}\x1b[2m{pairs}\x1b[0m"),
            Level::INFO => writeln!(writer, "{msg}\x1b[2m{pairs}\x1b[0m"),
            _ => writeln!(writer, "\x1b[2m{msg}{pairs}\x1b[0m"),
        }
    }
}

/// Install the global subscriber described by `settings`.
///
/// Warnings and errors go to stderr and everything else to stdout. The
/// console honours `settings.level` plus any directives in `DOTTY_LOG`.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init_subscriber(settings: &LogSettings) -> Result<ErrorFlag> {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;

    let filter = EnvFilter::builder()
        .with_default_directive(settings.level.into())
        .with_env_var(FILTER_ENV)
        .from_env_lossy();

    let make_writer = io::stderr
        .with_max_level(Level::WARN)
        .and(io::stdout.with_min_level(Level::INFO));

    let console = if settings.json {
        fmt::layer()
            .json()
            .with_writer(make_writer)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .event_format(DottyFormatter)
            .with_writer(make_writer)
            .with_filter(filter)
            .boxed()
    };

    let file = settings
        .file
        .as_deref()
        .map(|path| {
            FileLayer::open(path)
                .with_context(|| format!("failed to open log file {path}"))
                .map(|layer| layer.with_filter(settings.level))
        })
        .transpose()?;

    let flag = ErrorFlag::default();
    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(ErrorFlagLayer(flag.clone()))
        .try_init()
        .context("failed to install the log subscriber")?;
    Ok(flag)
}
