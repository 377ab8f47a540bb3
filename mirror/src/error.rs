//! Error types for the mirroring engine

use std::path::PathBuf;

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Comprehensive error type for mirror operations
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or invalid configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Two mirror rules resolved to the same canonical source
    #[error("Duplicate mirror rule source: '{}'", .path.display())]
    DuplicateSource { path: PathBuf },

    /// File rule pattern errors
    #[error("Pattern error: {0}")]
    Pattern(String),

    /// Source file over the effective size ceiling
    #[error("File '{path}' exceeds size limit ({size} > {limit} bytes)")]
    SizeLimitExceeded { path: PathBuf, size: u64, limit: u64 },

    /// Backup creation errors
    #[error("Backup error for '{path}': {message}")]
    Backup { path: PathBuf, message: String },

    /// File copying errors
    #[error("File copy error: {message}")]
    Copy { message: String },

    /// File deletion errors
    #[error("File deletion error at '{path}': {message}")]
    Deletion { path: PathBuf, message: String },

    /// Path-related errors
    #[error("Path error at '{path}': {message}")]
    Path { path: PathBuf, message: String },

    /// Watch registration or teardown errors
    #[error("Watch error: {0}")]
    Watch(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl MirrorError {
    /// Create a new configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new path error
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new backup error
    pub fn backup_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Backup {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new file copy error
    pub fn copy_error(
        source: impl AsRef<std::path::Path>,
        dest: impl AsRef<std::path::Path>,
        message: impl Into<String>,
    ) -> Self {
        let full_message = format!(
            "File copy error from '{}' to '{}': {}",
            source.as_ref().display(),
            dest.as_ref().display(),
            message.into()
        );
        Self::Copy {
            message: full_message,
        }
    }

    /// Create a new file deletion error
    pub fn deletion_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Deletion {
            path: path.into(),
            message: message.into(),
        }
    }
}
