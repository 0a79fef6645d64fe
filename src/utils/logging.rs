use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, Once};

use tracing::{Level, Subscriber};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{format::FmtSpan, writer::BoxMakeWriter},
    EnvFilter,
};

use crate::error::{ClientError, Result};

static INIT: Once = Once::new();

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    /// Whether to include source code locations
    pub source_location: bool,
    /// Whether to log span closes with their timings
    pub log_spans: bool,
    /// Output file path (None for stderr)
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            source_location: false,
            log_spans: false,
            file_path: None,
        }
    }
}

/// Install a global `tracing` subscriber.
///
/// Only the first call has any effect. `RUST_LOG` directives are honoured on
/// top of `config.level`, so `RUST_LOG=textgen_client::prompt=off` silences
/// the prompt channel.
pub fn setup_logging(config: LogConfig) -> Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = build_subscriber(&config).and_then(|subscriber| {
            tracing::subscriber::set_global_default(subscriber).map_err(|e| {
                ClientError::Configuration {
                    message: format!("Failed to set global subscriber: {}", e),
                    parameter: "logging".to_string(),
                }
            })
        });
    });

    result
}

pub(crate) fn build_subscriber(config: &LogConfig) -> Result<impl Subscriber + Send + Sync + 'static> {
    let filter = EnvFilter::from_default_env()
        .add_directive(LevelFilter::from_level(config.level).into());

    let writer = match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ClientError::Configuration {
                    message: format!("Failed to open log file {}: {}", path.display(), e),
                    parameter: "file_path".to_string(),
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(io::stderr),
    };

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(if config.log_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .with_ansi(config.file_path.is_none())
        .with_writer(writer)
        .finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PROMPT_LOG_TARGET;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_file_logging() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        let config = LogConfig {
            file_path: Some(log_path.clone()),
            ..Default::default()
        };
        let subscriber = build_subscriber(&config).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: PROMPT_LOG_TARGET, "[INST] hello [/INST]");
            tracing::debug!("hidden below the configured level");
        });

        let contents = fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("[INST] hello [/INST]"));
        assert!(contents.contains(PROMPT_LOG_TARGET));
        assert!(!contents.contains("hidden below"));
    }

    #[test]
    fn test_unwritable_log_path() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            file_path: Some(dir.path().join("missing").join("test.log")),
            ..Default::default()
        };
        assert!(matches!(
            build_subscriber(&config),
            Err(ClientError::Configuration { .. })
        ));
    }
}
