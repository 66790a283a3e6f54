//! Logging setup shared by the auditor binaries.

use crate::Result;
use crate::error::AuditorError;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Maps the CLI verbosity flags onto a tracing level.
///
/// `quiet` wins over any verbosity; otherwise 0=INFO, 1=DEBUG, 2+=TRACE.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Builds the log filter: `RUST_LOG` directives when set, the CLI level otherwise.
pub fn env_filter(verbose: u8, quiet: bool) -> EnvFilter {
    filter_from(
        std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        level_for(verbose, quiet),
    )
}

fn filter_from(directives: Option<&str>, level: tracing::Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Initializes structured logging.
///
/// When `log_file` is given, log lines are appended to that file (without ANSI
/// colouring); otherwise they go to stderr so that stdout stays free for
/// command output. `RUST_LOG` takes precedence over the verbosity flags.
///
/// # Example
/// ```rust,no_run
/// use labsdb_auditor_core::logging::init_logging;
/// use std::path::Path;
///
/// init_logging(1, false, Some(Path::new("audit.log"))).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose, quiet))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let initialized = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AuditorError::io(format!("Failed to open log file {}", path.display()), e)
                })?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    initialized.map_err(|e| {
        AuditorError::configuration(format!("Failed to initialize logging: {}", e))
    })
}
