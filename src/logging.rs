//! Logging setup for hosts embedding the policy engine
//!
//! The engine only emits `tracing` events. Binaries that have no subscriber
//! of their own can install one here.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::core::{PolicyError, PolicyResult};

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub directive: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Write to daily-rolling files in this directory instead of stderr
    pub log_dir: Option<PathBuf>,
    /// File name prefix for rolling log files
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directive: "shadow_policy_engine=info".to_string(),
            json: false,
            log_dir: None,
            file_prefix: "policy.log".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.directive))
    }
}

/// Install a global subscriber
///
/// When logging to files, keep the returned guard alive: dropping it flushes
/// and stops the background writer. Fails if a subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> PolicyResult<Option<WorkerGuard>> {
    let builder = tracing_subscriber::fmt().with_env_filter(config.env_filter());

    let (result, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let builder = builder.with_writer(writer).with_ansi(false);
            let result = if config.json {
                builder.json().try_init()
            } else {
                builder.try_init()
            };
            (result, Some(guard))
        }
        None => {
            let builder = builder.with_writer(std::io::stderr);
            let result = if config.json {
                builder.json().try_init()
            } else {
                builder.try_init()
            };
            (result, None)
        }
    };

    result.map_err(|e| PolicyError::Logging(e.to_string()))?;
    tracing::debug!("Logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LoggingConfig::new()
            .with_directive("debug")
            .with_json(true)
            .with_log_dir("/tmp/logs");
        assert_eq!(config.directive, "debug");
        assert!(config.json);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn test_init_to_file_then_reinit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig::new().with_log_dir(dir.path());

        let guard = init_logging(config.clone()).unwrap();
        assert!(guard.is_some());

        // Only one global subscriber per process
        let err = init_logging(config).unwrap_err();
        assert!(matches!(err, PolicyError::Logging(_)));
    }
}
