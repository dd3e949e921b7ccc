// Logging setup - stdout plus optional JSON log files
//
// Precedence for the filter: RUST_LOG env var > [logging] level > "info".
// File logging goes through a non-blocking rolling appender; the returned
// guard must live until shutdown so buffered lines get flushed.

use crate::config::{LogFileConfig, LogFormat, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Target of the per-request access log lines
pub const ACCESS_TARGET: &str = "physics_qa::access";

/// Default filter directive for a configured level
pub fn default_directive(level: &str) -> String {
    format!("physics_qa={level},axum=info,r2d2=warn")
}

fn stdout_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Full => fmt::layer().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    }
}

fn file_appender(config: &LogFileConfig) -> Result<RollingFileAppender, String> {
    std::fs::create_dir_all(&config.dir).map_err(|e| e.to_string())?;
    let mut builder = RollingFileAppender::builder()
        .rotation(config.rotation.to_appender())
        .filename_prefix(&config.prefix)
        .filename_suffix("log");
    if config.max_files > 0 {
        builder = builder.max_log_files(config.max_files);
    }
    builder.build(&config.dir).map_err(|e| e.to_string())
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&config.level).into());

    let (file_layer, guard) = match config.file.as_ref().map(|f| (f, file_appender(f))) {
        Some((_, Ok(appender))) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        Some((file, Err(e))) => {
            // Fall back to stdout only
            eprintln!("Warning: Could not open log files in {:?}: {}", file.dir, e);
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer(config.format))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogRotation;

    #[test]
    fn test_default_directive_parses() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let directive = default_directive(level);
            assert!(EnvFilter::try_new(&directive).is_ok(), "bad directive {directive}");
        }
    }

    #[test]
    fn test_file_appender_creates_directory() {
        let dir = std::env::temp_dir().join(format!(
            "physics-qa-logs-{}",
            crate::store::ClientId::generate()
        ));
        let config = LogFileConfig {
            dir: dir.join("nested"),
            prefix: "test".into(),
            rotation: LogRotation::Never,
            max_files: 2,
        };
        assert!(file_appender(&config).is_ok());
        assert!(config.dir.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
