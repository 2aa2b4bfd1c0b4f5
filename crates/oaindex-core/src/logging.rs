//! Logging utilities with indicatif integration

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use indicatif::MultiProgress;

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Logger that prints through indicatif MultiProgress to avoid mixing with progress bars.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            // TTY only, so always colored
            let (pre, label, post) = level_style(record.level(), true);
            let line = format!("[{pre}{label}{post}] {}", record.args());
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Where log lines go
pub enum LogTarget<'a> {
    /// Plain stderr, no colors (log aggregation)
    Stderr,
    /// Stderr routed above live progress bars
    Terminal(&'a MultiProgress),
    /// File sink (truncated at startup)
    File(&'a Path),
}

/// Initialize logging once for the process.
///
/// `RUST_LOG` overrides the default level (`debug` > `warn` when quiet > `info`).
pub fn init_logging(quiet: bool, debug: bool, target: LogTarget<'_>) -> io::Result<()> {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let env = env_logger::Env::default().default_filter_or(default_level);

    match target {
        LogTarget::Terminal(multi) => {
            let logger = env_logger::Builder::from_env(env)
                .format_timestamp_millis()
                .build();
            let max_level = logger.filter();

            log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone())))
                .map_err(io::Error::other)?;
            log::set_max_level(max_level);
        }
        LogTarget::Stderr => {
            env_logger::Builder::from_env(env)
                .format(|buf, record| {
                    let (_, label, _) = level_style(record.level(), false);
                    writeln!(buf, "[{label}] {}", record.args())
                })
                .try_init()
                .map_err(io::Error::other)?;
        }
        LogTarget::File(path) => {
            let file = File::create(path)?;
            env_logger::Builder::from_env(env)
                .target(env_logger::Target::Pipe(Box::new(file)))
                .format(|buf, record| {
                    let (_, label, _) = level_style(record.level(), false);
                    writeln!(buf, "{} [{label}] {}", buf.timestamp_millis(), record.args())
                })
                .try_init()
                .map_err(io::Error::other)?;
        }
    }
    Ok(())
}
