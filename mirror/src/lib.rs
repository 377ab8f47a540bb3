//! Rule-Driven Directory Mirroring Engine
//!
//! Keeps destination directory trees continuously consistent with source
//! trees under user-defined rules:
//! - Pattern-scoped file rules (size limits, backups, allowed extensions)
//! - A full-tree synchronization pass at startup
//! - Live change routing from filesystem notifications
//! - Deletion propagation and single-slot `.bak` backups

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod registry;
pub mod rules;
pub mod watcher;

// Re-export main types and functions
pub use config::{
    ConflictResolution, FileRuleConfig, LoggingConfig, MirrorConfig, MirrorRuleConfig,
    DEFAULT_MAX_SIZE,
};
pub use engine::MirrorEngine;
pub use error::{MirrorError, Result};
pub use executor::{SyncExecutor, SyncOutcome, SyncStats};
pub use registry::RuleRegistry;
pub use rules::{FileRule, MirrorRule};
pub use watcher::{ChangeEvent, ChangeKind, ChangeRouter, RouterState};

/// Build an engine from configuration and run one full-tree pass
pub async fn sync_all(config: MirrorConfig) -> Result<SyncStats> {
    let engine = MirrorEngine::new(config).await?;
    Ok(engine.initial_sync().await)
}

// Test modules
#[cfg(test)]
mod integration_tests;
