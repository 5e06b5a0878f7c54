//! Configuration management for shell-rewrite.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::shell::{DisplayPolicy, SessionConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell configuration.
    pub shell: ShellSection,
    /// Editor configuration.
    pub editor: EditorSection,
    /// Result display configuration.
    pub display: DisplayPolicy,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Shell configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Database bound to `db` at startup.
    pub default_db: String,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            default_db: "test".to_string(),
        }
    }
}

/// Editor configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSection {
    /// Editor command line. `EDITOR` is used when unset.
    pub command: Option<String>,
    /// Directory for scratch files. Defaults to a directory under the
    /// system temp directory.
    pub scratch_dir: Option<PathBuf>,
}

/// Logging configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace). `RUST_LOG` is used
    /// when unset.
    pub level: Option<String>,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(db) = std::env::var("SHELL_REWRITE_DB") {
            if !db.is_empty() {
                self.shell.default_db = db;
            }
        }

        if let Ok(editor) = std::env::var("SHELL_REWRITE_EDITOR") {
            if !editor.is_empty() {
                self.editor.command = Some(editor);
            }
        }

        if let Ok(level) = std::env::var("SHELL_REWRITE_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref db) = args.db {
            self.shell.default_db = db.clone();
        }

        if let Some(ref editor) = args.editor {
            self.editor.command = Some(editor.clone());
        }

        if let Some(size) = args.batch_size {
            self.display.batch_size = size;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = Some(level.clone());
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Config::default();

        // Load from config file if specified
        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        // Apply environment variable overrides
        config.apply_env();

        // Apply CLI argument overrides (highest priority)
        config.apply_args(args);

        config.validate()?;
        Ok(config)
    }

    /// Reject values the shell cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shell.default_db.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "shell.default_db",
                self.shell.default_db.clone(),
            ));
        }
        if self.display.batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "display.batch_size",
                self.display.batch_size.to_string(),
            ));
        }
        Ok(())
    }

    /// The runtime settings a new shell starts with.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            editor: self.editor.command.clone(),
            display: self.display.clone(),
        }
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> Option<&str> {
        self.logging.level.as_deref()
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A setting has a value the shell cannot use.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(key, value) => write!(f, "invalid value for {}: '{}'", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}
