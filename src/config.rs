use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Service name. Also the stem of the log file (`<dir>/pylftp.log`).
pub const SERVICE_NAME: &str = "pylftp";

/// How long the run loop sleeps between wakeups.
pub const SLEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Top-level configuration, optionally loaded from a TOML file.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for log files. Logs go to stdout when unset.
    pub dir: Option<PathBuf>,
    /// Enable debug logs.
    pub debug: bool,
}

/// Errors that can occur while loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this layout.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl ServiceConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Apply command-line flags on top of the file settings.
    ///
    /// `log_dir` replaces the configured directory when given. `debug` can only
    /// raise verbosity: a config file with `debug = true` stays in debug mode.
    pub fn with_overrides(mut self, log_dir: Option<PathBuf>, debug: bool) -> Self {
        if log_dir.is_some() {
            self.logging.dir = log_dir;
        }
        self.logging.debug |= debug;
        self
    }
}

impl LoggingConfig {
    /// Effective log level: DEBUG with the debug flag, INFO otherwise.
    pub fn level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Path of the log file, if logging to a directory.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{SERVICE_NAME}.log")))
    }
}
