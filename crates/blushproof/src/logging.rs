//! Logging setup.
//!
//! Installs the `tracing` subscriber used by `blushctl`. Library code only
//! emits events; embedding hosts are free to install their own subscriber.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to a tracing level.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Map the CLI `-q` flag and `-v` count onto a verbosity.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }
}

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence over `verbosity` when set. Calling this more
/// than once keeps the first subscriber.
///
/// # Examples
///
/// ```no_run
/// use blushproof::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let default_filter = format!("blushproof={}", verbosity.to_level_filter());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr),
    );

    let _ = subscriber.try_init();
}

/// Initialize logging for tests (warnings and errors only).
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
