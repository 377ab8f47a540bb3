//! Registry of configured mirror rules, keyed by canonical source path

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info};

use crate::config::{MirrorConfig, MirrorRuleConfig};
use crate::error::{MirrorError, Result};
use crate::rules::MirrorRule;

/// Read-only set of mirror rules for the process lifetime
///
/// Built once at startup, before any watching begins. At most one rule per
/// distinct canonical source path; a second rule with the same source is a
/// configuration error, not a silent replacement.
#[derive(Debug)]
pub struct RuleRegistry {
    rules: HashMap<PathBuf, Arc<MirrorRule>>,
}

impl RuleRegistry {
    /// Build the registry from configuration
    ///
    /// Creates each rule's source and destination directory before
    /// canonicalizing, so the containment invariant holds from the start.
    /// Any failure here is fatal to startup.
    pub async fn from_config(config: &MirrorConfig) -> Result<Self> {
        let mut rules: HashMap<PathBuf, Arc<MirrorRule>> = HashMap::new();

        for rule_config in &config.rules {
            let rule = Self::build_rule(rule_config).await?;
            if rules.contains_key(&rule.source) {
                return Err(MirrorError::DuplicateSource {
                    path: rule.source,
                });
            }
            info!(name = %rule.name, source = %rule.source.display(),
                  destination = %rule.destination.display(), "Added mirror rule");
            rules.insert(rule.source.clone(), Arc::new(rule));
        }

        Ok(Self { rules })
    }

    async fn build_rule(config: &MirrorRuleConfig) -> Result<MirrorRule> {
        ensure_dir(&config.source).await?;
        ensure_dir(&config.destination).await?;

        let source = canonicalize(&config.source).await?;
        let destination = canonicalize(&config.destination).await?;

        MirrorRule::new(config, source, destination)
    }

    /// Ensure every rule's source and destination exist as directories
    ///
    /// Idempotent; must run before watching begins.
    pub async fn directories_ready(&self) -> Result<()> {
        for rule in self.rules.values() {
            ensure_dir(&rule.source).await?;
            ensure_dir(&rule.destination).await?;
            debug!(source = %rule.source.display(), destination = %rule.destination.display(),
                   "Ensured directories exist");
        }
        Ok(())
    }

    /// Find the rule owning a path by canonical-prefix containment
    ///
    /// With nested sources the longest matching prefix wins.
    pub fn rule_for_path(&self, path: &Path) -> Option<&Arc<MirrorRule>> {
        self.rules
            .values()
            .filter(|rule| rule.owns(path))
            .max_by_key(|rule| rule.source.as_os_str().len())
    }

    /// Iterate over all registered rules
    pub fn rules(&self) -> impl Iterator<Item = &Arc<MirrorRule>> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

async fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| MirrorError::path_error(path, format!("Failed to create directory: {e}")))
}

async fn canonicalize(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path)
        .await
        .map_err(|e| MirrorError::path_error(path, format!("Failed to canonicalize: {e}")))
}
