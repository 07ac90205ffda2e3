//! Bridge configuration (symbex.toml)
//!
//! ```toml
//! plugin_name = "ConcolicSession"
//! max_symbolic_size = 1024
//! max_name_len = 255
//!
//! [session]
//! max_time = 60
//! stop_on_error = true
//! use_random_select = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbexConfig {
    /// Engine plugin that receives session-control messages
    #[serde(default = "default_plugin_name")]
    pub plugin_name: String,

    /// Exclusive upper bound assumed for mapping and tuple entry counts
    #[serde(default = "default_max_symbolic_size")]
    pub max_symbolic_size: usize,

    /// Longest accepted symbolic variable name, in bytes
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    /// Session defaults
    #[serde(default)]
    pub session: SessionDefaults,
}

/// Defaults used when a session is started without explicit arguments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDefaults {
    /// Exploration time budget in seconds (0 = unbounded)
    #[serde(default)]
    pub max_time: u32,

    /// Stop exploring once an error path is found
    #[serde(default = "default_true")]
    pub stop_on_error: bool,

    /// Prefer random state selection
    #[serde(default)]
    pub use_random_select: bool,
}

fn default_plugin_name() -> String {
    "ConcolicSession".to_string()
}

fn default_max_symbolic_size() -> usize {
    1024
}

fn default_max_name_len() -> usize {
    255
}

fn default_true() -> bool {
    true
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            max_time: 0,
            stop_on_error: true,
            use_random_select: false,
        }
    }
}

impl Default for SymbexConfig {
    fn default() -> Self {
        Self {
            plugin_name: default_plugin_name(),
            max_symbolic_size: default_max_symbolic_size(),
            max_name_len: default_max_name_len(),
            session: SessionDefaults::default(),
        }
    }
}

impl SymbexConfig {
    /// Parse configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: SymbexConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plugin_name.is_empty() {
            return Err(ConfigError::Validation(
                "plugin_name cannot be empty".to_string(),
            ));
        }
        if self.max_symbolic_size == 0 {
            return Err(ConfigError::Validation(
                "max_symbolic_size must be positive".to_string(),
            ));
        }
        // Shortest legal name is "b.t#f"
        if self.max_name_len < 5 {
            return Err(ConfigError::Validation(format!(
                "max_name_len {} cannot hold any name",
                self.max_name_len
            )));
        }
        Ok(())
    }
}
