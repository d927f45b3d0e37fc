//! # chorus-logging
//!
//! Structured logging with `tracing`.
//!
//! [`init_subscriber`] installs a global subscriber with:
//! - an [`EnvFilter`] (`RUST_LOG` wins over the configured level)
//! - a console layer on stdout, human-readable or JSON lines
//! - an optional plain-text file layer appending to a log file
//!
//! Code that runs before the global subscriber exists (settings loading)
//! goes through [`with_bootstrap`] so its warnings still reach stderr.

#![deny(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Errors raised while building the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level directive could not be parsed.
    #[error("invalid log filter {directive:?}: {source}")]
    Filter {
        /// The rejected directive.
        directive: String,
        /// Parser error.
        source: tracing_subscriber::filter::ParseError,
    },
    /// The log file could not be opened.
    #[error("failed to open log file {}: {source}", path.display())]
    File {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Subscriber options.
#[derive(Clone, Debug)]
pub struct LoggingOptions {
    /// Default filter directive, e.g. `info` or `chorus_server=debug`.
    pub level: String,
    /// JSON lines on stdout instead of human-readable text.
    pub json: bool,
    /// Append plain-text output to this file as well.
    pub file: Option<PathBuf>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

/// Build the filter, preferring `RUST_LOG` when it is set and valid.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|source| LoggingError::Filter {
        directive: level.to_string(),
        source,
    })
}

/// Open `path` for appending, creating parent directories as needed.
pub fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    let io_err = |source| LoggingError::File {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)
}

/// Run `f` under a scoped `warn`-level subscriber writing to stderr.
pub fn with_bootstrap<T>(f: impl FnOnce() -> T) -> T {
    with_bootstrap_writer(std::io::stderr, f)
}

/// Run `f` under a scoped `warn`-level subscriber writing to `writer`.
pub fn with_bootstrap_writer<W, T>(writer: W, f: impl FnOnce() -> T) -> T
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

/// Install the global subscriber.
///
/// Call once at startup. Later calls leave the first subscriber in place.
pub fn init_subscriber(options: &LoggingOptions) -> Result<(), LoggingError> {
    let filter = build_filter(&options.level)?;

    let text_layer = (!options.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stdout)
    });
    let json_layer = options.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_writer(std::io::stdout)
    });
    let file_layer = match &options.file {
        Some(path) => {
            let file = open_log_file(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = LoggingOptions::default();
        assert_eq!(opts.level, "info");
        assert!(!opts.json);
        assert!(opts.file.is_none());
    }

    #[test]
    fn open_log_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("server.log");
        let _file = open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn open_log_file_appends() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn open_log_file_in_missing_dir_under_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let err = open_log_file(&blocker.join("server.log")).unwrap_err();
        assert!(matches!(err, LoggingError::File { .. }));
    }

    #[derive(Clone, Default)]
    struct Capture(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn bootstrap_captures_warnings_only() {
        let capture = Capture::default();
        let sink = capture.clone();
        let value = with_bootstrap_writer(move || sink.clone(), || {
            tracing::info!("chatty detail");
            tracing::warn!(key = "CHORUS_PORT", "invalid integer env var, ignoring");
            7
        });
        assert_eq!(value, 7);
        let out = capture.contents();
        assert!(out.contains("invalid integer env var"), "{out}");
        assert!(out.contains("CHORUS_PORT"), "{out}");
        assert!(!out.contains("chatty detail"), "{out}");
    }

    #[test]
    fn init_subscriber_twice_is_safe() {
        let dir = tempfile::tempdir().unwrap();
        let opts = LoggingOptions {
            level: "debug".into(),
            json: false,
            file: Some(dir.path().join("server.log")),
        };
        init_subscriber(&opts).unwrap();
        init_subscriber(&opts).unwrap();
        tracing::info!("still alive");
    }
}
