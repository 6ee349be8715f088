//! Logging configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Returns the format name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Line format.
    pub format: LogFormat,
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Append log lines to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "warn".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds a config from file settings and the CLI verbosity flag.
    ///
    /// `--verbose` raises the default level to `debug`.
    #[must_use]
    pub fn from_settings(settings: Option<&crate::config::LoggingSettings>, verbose: bool) -> Self {
        let mut config = Self::default();

        if let Some(settings) = settings {
            if let Some(format) = settings.format {
                config.format = format;
            }
            if let Some(level) = &settings.level {
                config.level.clone_from(level);
            }
            config.file.clone_from(&settings.file);
        }

        if verbose {
            config.level = "debug".to_string();
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingSettings;

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            format: Some(LogFormat::Json),
            level: Some("info".to_string()),
            file: Some(PathBuf::from("/tmp/tabport.log")),
        };

        let config = LoggingConfig::from_settings(Some(&settings), false);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
        assert!(config.file.is_some());

        let verbose = LoggingConfig::from_settings(Some(&settings), true);
        assert_eq!(verbose.level, "debug");
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::from_settings(None, false);
        assert_eq!(config, LoggingConfig::default());
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
