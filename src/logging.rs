//! Categorised logging on top of `tracing`.
//!
//! Every lifecycle event in the crate goes through these helpers instead of
//! calling `tracing` directly, so categories map onto stable targets
//! (`system`, `runtime`, `record`, `debug`, `error`, `other`) that can be
//! filtered with `RUST_LOG`/`TASKHIVE_LOG`. Runtime and record messages are
//! mirrored onto `system`, and `record` can be switched off at runtime.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_appender::non_blocking::WorkerGuard;

use crate::config::LogConfig;
use crate::error::ConfigError;

static RECORD_ENABLED: AtomicBool = AtomicBool::new(true);

/// Log category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    System,
    Runtime,
    Record,
    Debug,
    Error,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Runtime => "runtime",
            Self::Record => "record",
            Self::Debug => "debug",
            Self::Error => "error",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enable or disable the `record` category.
pub fn set_record_enabled(enabled: bool) {
    RECORD_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn record_enabled() -> bool {
    RECORD_ENABLED.load(Ordering::Relaxed)
}

/// Whether a message in `category` reaches its own target.
pub fn should_emit(category: Category) -> bool {
    gate(category, record_enabled())
}

fn gate(category: Category, record_enabled: bool) -> bool {
    category != Category::Record || record_enabled
}

fn format_message(tag: Option<&str>, message: &str) -> String {
    match tag {
        Some(tag) => format!("[{tag}]: {message}"),
        None => message.to_string(),
    }
}

fn emit(category: Category, message: &str, is_error: bool) {
    if is_error {
        match category {
            Category::System => tracing::error!(target: "system", "{}", message),
            Category::Runtime => tracing::error!(target: "runtime", "{}", message),
            Category::Record => tracing::error!(target: "record", "{}", message),
            Category::Debug => tracing::error!(target: "debug", "{}", message),
            Category::Error => tracing::error!(target: "error", "{}", message),
            Category::Other => tracing::error!(target: "other", "{}", message),
        }
    } else {
        match category {
            Category::System => tracing::info!(target: "system", "{}", message),
            Category::Runtime => tracing::info!(target: "runtime", "{}", message),
            Category::Record => tracing::info!(target: "record", "{}", message),
            Category::Debug => tracing::debug!(target: "debug", "{}", message),
            Category::Error => tracing::error!(target: "error", "{}", message),
            Category::Other => tracing::info!(target: "other", "{}", message),
        }
    }
}

/// Log `message` under `category`, optionally prefixed with a `[tag]`.
pub fn log(category: Category, tag: Option<&str>, message: &str, is_error: bool) {
    let message = format_message(tag, message);

    if matches!(category, Category::Runtime | Category::Record) {
        emit(Category::System, &message, false);
    }

    if !should_emit(category) {
        return;
    }

    emit(category, &message, is_error);
}

pub fn system(tag: &str, message: &str) {
    log(Category::System, Some(tag), message, false);
}

pub fn runtime(tag: &str, message: &str) {
    log(Category::Runtime, Some(tag), message, false);
}

pub fn record(tag: &str, message: &str) {
    log(Category::Record, Some(tag), message, false);
}

pub fn debug(tag: &str, message: &str) {
    log(Category::Debug, Some(tag), message, false);
}

pub fn other(tag: &str, message: &str) {
    log(Category::Other, Some(tag), message, false);
}

pub fn error(tag: &str, message: &str) {
    log(Category::Error, Some(tag), message, true);
}

/// Log an error together with its full cause chain.
pub fn print_error(tag: &str, message: &str, err: &anyhow::Error) {
    error(tag, &format!("{message}: {err:#}"));
    tracing::debug!(target: "error", tag, error = ?err, "error details");
}

/// Install the global `tracing` subscriber.
///
/// Returns the non-blocking writer guard when logging to a file; keep it
/// alive for as long as logs should be flushed.
pub fn init_tracing(config: &LogConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    set_record_enabled(config.record_enabled);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.filter));

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::Logging(e.to_string()))?;
            let appender = tracing_appender::rolling::daily(dir, "taskhive.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| ConfigError::Logging(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| ConfigError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_prefix() {
        assert_eq!(format_message(Some("Task"), "started"), "[Task]: started");
        assert_eq!(format_message(None, "started"), "started");
    }

    #[test]
    fn record_gate() {
        assert!(!gate(Category::Record, false));
        assert!(gate(Category::Runtime, false));
        assert!(gate(Category::Error, false));
        assert!(gate(Category::Record, true));
    }

    #[test]
    fn init_with_log_dir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LogConfig {
            log_dir: Some(log_dir.clone()),
            ..LogConfig::default()
        };
        // A subscriber may already be installed by another test; the
        // directory is created either way.
        let _ = init_tracing(&config);
        assert!(log_dir.is_dir());
    }
}
