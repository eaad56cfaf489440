//! Process-wide log sinks: a human-readable console layer and, optionally, a
//! JSON file layer under `LOG_PATH`.
//!
//! [`init`] installs the global subscriber once, before assembly starts, and
//! returns a [`Logger`]. Supplying that value to the registry is what makes
//! "a logging collaborator is present" true for optional consumers.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use envconfig::Envconfig;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const LOG_FILE_NAME: &str = "server.log";

#[derive(Envconfig, Clone, Debug)]
pub struct LoggerConfig {
    /// Directory holding the JSON log file.
    #[envconfig(from = "LOG_PATH", default = "/var/log/app-server")]
    pub path: PathBuf,

    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub level: String,

    #[envconfig(from = "LOG_FILE_ENABLED", default = "true")]
    pub file_enabled: bool,
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level {level:?}: {source}")]
    InvalidLevel {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("cannot open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Marker for an installed logging setup.
#[derive(Clone, Debug, Default)]
pub struct Logger {
    file: Option<PathBuf>,
}

impl Logger {
    /// Logger for processes (and tests) that installed their own subscriber.
    pub fn console_only() -> Self {
        Self::default()
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// Install the console layer and, when enabled, the JSON file layer.
pub fn init(config: &LoggerConfig) -> Result<Logger, LoggingError> {
    let console = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_filter(filter(&config.level)?);

    let (file_layer, file) = if config.file_enabled {
        let (path, file) = open_log_file(&config.path)?;
        let layer = fmt::layer()
            .json()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_filter(filter(&config.level)?);
        (Some(layer), Some(path))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()?;

    info!(
        level = %config.level,
        file = ?file,
        "logging initialized"
    );
    Ok(Logger { file })
}

/// `RUST_LOG` if set and valid, `level` otherwise.
fn filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|source| LoggingError::InvalidLevel {
        level: level.to_string(),
        source,
    })
}

/// Create `dir` if needed and open `dir/server.log` for appending.
fn open_log_file(dir: &Path) -> Result<(PathBuf, File), LoggingError> {
    let path = dir.join(LOG_FILE_NAME);
    let file = fs::create_dir_all(dir)
        .and_then(|()| OpenOptions::new().create(true).append(true).open(&path))
        .map_err(|source| LoggingError::LogFile {
            path: path.clone(),
            source,
        })?;
    Ok((path, file))
}
