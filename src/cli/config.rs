//! Configuration management for cortexrag
//!
//! Provides TOML-based settings with defaults and validation.
//! Location: ~/.cortexrag/config.toml
//!
//! Secrets are not part of this file; see [`crate::session::Credentials`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::errors::{RagError, Result};

/// Default completion model
pub const DEFAULT_MODEL: &str = "mistral-large2";

/// Default text column returned by the search service
pub const DEFAULT_SEARCH_COLUMN: &str = "SUMMARY";

/// Default number of passages to retrieve
pub const DEFAULT_SEARCH_LIMIT: usize = 4;

/// Complete configuration for cortexrag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub search: SearchConfig,
    pub completion: CompletionConfig,
    pub feedback: FeedbackConfig,
    pub telemetry: TelemetryConfig,
}

/// Connection settings for the data platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Overrides `https://<account>.snowflakecomputing.com`
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
}

/// Search service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub column: String,
    pub limit: usize,
}

/// Completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub model: String,
}

/// Evaluation judge settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Judge model, falls back to `completion.model`
    pub model: Option<String>,
}

/// Telemetry display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub default_verbosity: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 60,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            column: DEFAULT_SEARCH_COLUMN.to_string(),
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_verbosity: "normal".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RagError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| RagError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".cortexrag").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.search.limit == 0 {
            return Err(RagError::ConfigError(
                "search.limit must be greater than 0".to_string()
            ));
        }

        if self.search.column.trim().is_empty() {
            return Err(RagError::ConfigError(
                "search.column must not be empty".to_string()
            ));
        }

        if self.completion.model.trim().is_empty() {
            return Err(RagError::ConfigError(
                "completion.model must not be empty".to_string()
            ));
        }

        if self.connection.request_timeout_secs == 0 {
            return Err(RagError::ConfigError(
                "connection.request_timeout_secs must be greater than 0".to_string()
            ));
        }

        match self.telemetry.default_verbosity.as_str() {
            "quiet" | "normal" | "verbose" | "very_verbose" => {}
            _ => return Err(RagError::ConfigError(
                format!("Invalid verbosity level: {}", self.telemetry.default_verbosity)
            )),
        }

        Ok(())
    }

    /// Model used by the evaluation judge
    pub fn judge_model(&self) -> &str {
        self.feedback
            .model
            .as_deref()
            .unwrap_or(&self.completion.model)
    }

    /// Render as TOML for display
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RagError::ConfigError(format!("Failed to serialize config: {}", e)))
    }
}
