//! Configuration model for the mirroring engine
//!
//! Mirrors the on-disk JSON/YAML shape consumed by the engine. Defaults
//! follow the same values the engine falls back to when no configuration
//! file is given: one catch-all rule mirroring `./source` into `./mirror`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MirrorError, Result};

/// Default size ceiling for a file rule: 10 MiB
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_rules")]
    pub rules: Vec<MirrorRuleConfig>,
    /// Consumed by the binary only; the engine ignores it
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging block passed through to the process wiring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// One source-to-destination mapping with its file-level policies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorRuleConfig {
    pub name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
    #[serde(default = "default_file_rules")]
    pub file_rules: Vec<FileRuleConfig>,
}

/// How a destination that differs from the source is treated
///
/// Only `source-wins` is currently exercised: the destination is always
/// overwritten from the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    #[default]
    SourceWins,
    DestinationWins,
}

/// Pattern-scoped file policy within a mirror rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRuleConfig {
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Reserved for future auto-repair; parsed but never read
    #[serde(default)]
    pub fix_errors: bool,
    #[serde(default = "default_backup")]
    pub backup: bool,
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for FileRuleConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            fix_errors: false,
            backup: default_backup(),
            max_size: default_max_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl MirrorConfig {
    /// Load configuration from a file, falling back to the built-in
    /// defaults when the file is unreadable or malformed.
    ///
    /// A bad configuration file is not fatal; structural problems (duplicate
    /// sources, bad glob patterns) are caught later when the rule registry
    /// is built.
    pub async fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::read_file(path).await {
            Ok(config) => {
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error loading config, using defaults");
                Self::default()
            }
        }
    }

    /// Read and parse a configuration file, propagating errors
    pub async fn read_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        Self::parse(&content, is_json)
    }

    /// Parse configuration content as JSON or YAML
    pub fn parse(content: &str, json: bool) -> Result<Self> {
        if json {
            Ok(serde_json::from_str(content)?)
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| MirrorError::config_error(format!("invalid YAML: {e}")))
        }
    }
}

fn default_rules() -> Vec<MirrorRuleConfig> {
    vec![MirrorRuleConfig {
        name: "Default Mirror Rule".to_string(),
        source: PathBuf::from("./source"),
        destination: PathBuf::from("./mirror"),
        recursive: default_recursive(),
        conflict_resolution: ConflictResolution::default(),
        file_rules: default_file_rules(),
    }]
}

fn default_file_rules() -> Vec<FileRuleConfig> {
    vec![FileRuleConfig::default()]
}

fn default_recursive() -> bool {
    true
}

fn default_pattern() -> String {
    "*".to_string()
}

fn default_backup() -> bool {
    true
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}
