//! Logging configuration: filter level, stdout format, request log, log files
//!
//! The file layer is optional and writes JSON lines through a rolling
//! appender; `file` is `None` unless `file_enabled = true`.

use serde::Deserialize;
use std::path::PathBuf;

/// How stdout log lines are laid out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Single line with span context (default)
    #[default]
    Full,
    /// Single line, spans abbreviated
    Compact,
    /// Multi-line, for local debugging
    Pretty,
    /// One JSON object per line, for log shippers reading stdout
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "compact" => Self::Compact,
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Full,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// When a new log file is started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

impl LogRotation {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "hourly" => Self::Hourly,
            "never" => Self::Never,
            _ => Self::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Never => "never",
        }
    }

    pub fn to_appender(self) -> tracing_appender::rolling::Rotation {
        use tracing_appender::rolling::Rotation;
        match self {
            Self::Hourly => Rotation::HOURLY,
            Self::Daily => Rotation::DAILY,
            Self::Never => Rotation::NEVER,
        }
    }
}

/// JSON log files next to stdout
#[derive(Debug, Clone, PartialEq)]
pub struct LogFileConfig {
    pub dir: PathBuf,
    /// File name prefix, e.g. "physics-qa" -> "physics-qa.2024-01-15.log"
    pub prefix: String,
    pub rotation: LogRotation,
    /// Oldest files beyond this count are deleted on rotation; 0 keeps all
    pub max_files: usize,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logs"),
            prefix: "physics-qa".to_string(),
            rotation: LogRotation::Daily,
            max_files: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level for this crate's targets: trace, debug, info, warn, error
    pub level: String,
    pub format: LogFormat,
    /// One info line per HTTP request (method, path, status, latency)
    pub access_log: bool,
    pub file: Option<LogFileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            access_log: true,
            file: None,
        }
    }
}

/// Logging settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    pub level: Option<String>,
    pub format: Option<String>,
    pub access_log: Option<bool>,
    pub file_enabled: Option<bool>,
    pub file_dir: Option<String>,
    pub file_rotation: Option<String>,
    pub file_prefix: Option<String>,
    pub file_max_files: Option<usize>,
}

impl LoggingConfig {
    /// Create from file config; `RUST_LOG` is applied later, at subscriber init
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        let log_file = file.file_enabled.unwrap_or(false).then(|| {
            let base = LogFileConfig::default();
            LogFileConfig {
                dir: file.file_dir.map(PathBuf::from).unwrap_or(base.dir),
                prefix: file
                    .file_prefix
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or(base.prefix),
                rotation: file
                    .file_rotation
                    .map(|s| LogRotation::parse(&s))
                    .unwrap_or(base.rotation),
                max_files: file.file_max_files.unwrap_or(base.max_files),
            }
        });

        Self {
            level: file.level.unwrap_or(defaults.level),
            format: file
                .format
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            access_log: file.access_log.unwrap_or(defaults.access_log),
            file: log_file,
        }
    }
}
