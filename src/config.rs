//! User configuration, persisted as TOML.
//!
//! Every field has a default, so an empty or missing file yields a working
//! setup: redb under the XDG data directory, Ollama on localhost, and the
//! built-in fallback rules.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineConfig;
use crate::generate::{FallbackRule, FallbackRules, OllamaConfig};

/// Errors from config file handling.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(craft::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(craft::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(craft::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `[generator]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}
fn default_base_url() -> String {
    OllamaConfig::default().base_url
}
fn default_model() -> String {
    OllamaConfig::default().model
}
fn default_timeout_secs() -> u64 {
    OllamaConfig::default().timeout_secs
}
fn default_autosave_secs() -> u64 {
    5
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftConfig {
    /// Overrides the XDG data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Seconds between background saves. 0 disables autosave.
    #[serde(default = "default_autosave_secs")]
    pub autosave_secs: u64,
    /// Extra seed pack files applied after the bundled one.
    #[serde(default)]
    pub seed_packs: Vec<PathBuf>,
    #[serde(default)]
    pub generator: GeneratorSection,
    /// Replaces the built-in fallback rules when non-empty.
    #[serde(default)]
    pub fallback_rules: Vec<FallbackRule>,
}

impl Default for CraftConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            autosave_secs: default_autosave_secs(),
            seed_packs: Vec::new(),
            generator: GeneratorSection::default(),
            fallback_rules: Vec::new(),
        }
    }
}

impl CraftConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path` if it exists, otherwise defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Convert to an `EngineConfig`, using `default_data_dir` when the file
    /// does not name one.
    pub fn to_engine_config(&self, default_data_dir: Option<PathBuf>) -> EngineConfig {
        let generator = self.generator.enabled.then(|| OllamaConfig {
            base_url: self.generator.base_url.clone(),
            model: self.generator.model.clone(),
            timeout_secs: self.generator.timeout_secs,
        });

        let fallback_rules = if self.fallback_rules.is_empty() {
            FallbackRules::default()
        } else {
            FallbackRules::new(self.fallback_rules.clone())
        };

        EngineConfig {
            data_dir: self.data_dir.clone().or(default_data_dir),
            generator,
            fallback_rules,
            seed_packs: self.seed_packs.clone(),
        }
    }
}
