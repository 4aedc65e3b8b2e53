//! Logging for the KIM gateway with mail-address and card identifier redaction
//!
//! Mail addresses, Telematik-IDs and card serial numbers (ICCSN) are replaced
//! before a message reaches a log sink. Hash-based replacements keep log lines
//! correlatable without exposing the identifier.
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::{init_tracing, redacted_info, LoggerConfig};
//!
//! let _guard = init_tracing(&LoggerConfig::default()).ok();
//! redacted_info!(stage = "rcpt"; "recipient {} has no certificate", "arzt@praxis.kim.telematik");
//! ```

pub mod config;
pub mod macros;
pub mod redactor;
pub mod transaction;

pub use config::*;
pub use redactor::*;
pub use transaction::*;

// Re-exported for the logging macros
pub use tracing;

use lazy_static::lazy_static;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

lazy_static! {
    static ref GLOBAL_REDACTOR: PiiRedactor = PiiRedactor::default();
}

static REDACTION_ENABLED: AtomicBool = AtomicBool::new(true);

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to install subscriber: {0}")]
    InitFailed(String),
}

/// Redacts text with the process-wide redactor.
pub fn redact(text: &str) -> String {
    if REDACTION_ENABLED.load(Ordering::Relaxed) {
        GLOBAL_REDACTOR.redact(text)
    } else {
        text.to_string()
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. The returned guard
/// must be held for the life of the process when logging to files.
pub fn init_tracing(config: &LoggerConfig) -> Result<Option<WorkerGuard>, LoggerError> {
    REDACTION_ENABLED.store(config.redaction_enabled, Ordering::Relaxed);

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| LoggerError::InvalidFilter(e.to_string()))?,
    };

    let (writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(writer)
                    .json(),
            )
            .try_init()
            .map_err(|e| LoggerError::InitFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.log_dir.is_none())
                    .with_writer(writer),
            )
            .try_init()
            .map_err(|e| LoggerError::InitFailed(e.to_string()))?;
    }

    Ok(guard)
}
