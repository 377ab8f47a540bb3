//! File rules and mirror rules with first-match-wins resolution

use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::config::{ConflictResolution, FileRuleConfig, MirrorRuleConfig, DEFAULT_MAX_SIZE};
use crate::error::{MirrorError, Result};

/// Compiled pattern-scoped file policy
///
/// Immutable after construction. Matching is against the file name only,
/// not the full path.
#[derive(Debug, Clone)]
pub struct FileRule {
    pub pattern: String,
    matcher: GlobMatcher,
    pub fix_errors: bool,
    pub backup: bool,
    pub max_size: u64,
    /// `None` means every extension is allowed
    allowed: Option<GlobSet>,
}

impl FileRule {
    /// Compile a file rule from its configuration
    pub fn from_config(config: &FileRuleConfig) -> Result<Self> {
        let matcher = Glob::new(&config.pattern)
            .map_err(|e| {
                MirrorError::Pattern(format!("Failed to compile glob '{}': {}", config.pattern, e))
            })?
            .compile_matcher();

        Ok(Self {
            pattern: config.pattern.clone(),
            matcher,
            fix_errors: config.fix_errors,
            backup: config.backup,
            max_size: config.max_size,
            allowed: build_allowed_set(&config.allowed_extensions)?,
        })
    }

    /// The catch-all rule used when no configured rule matches a file
    pub fn fallback() -> Self {
        Self {
            pattern: "*".to_string(),
            matcher: Glob::new("*").unwrap().compile_matcher(),
            fix_errors: false,
            backup: true,
            max_size: DEFAULT_MAX_SIZE,
            allowed: None,
        }
    }

    /// Check whether this rule's pattern matches a file name
    pub fn matches(&self, file_name: &str) -> bool {
        self.matcher.is_match(file_name)
    }

    /// Check whether a file name passes the allowed-extension set
    pub fn allows(&self, file_name: &str) -> bool {
        match &self.allowed {
            Some(set) => set.is_match(file_name),
            None => true,
        }
    }
}

/// Build the allowed-extension globset
///
/// Entries may be full globs (`*.log`), dotted extensions (`.log`) or bare
/// extensions (`log`). An empty list or a `*` entry allows everything.
fn build_allowed_set(extensions: &[String]) -> Result<Option<GlobSet>> {
    if extensions.is_empty() || extensions.iter().any(|e| e == "*") {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        let pattern = if ext.contains('*') || ext.contains('?') {
            ext.clone()
        } else if let Some(stripped) = ext.strip_prefix('.') {
            format!("*.{stripped}")
        } else {
            format!("*.{ext}")
        };

        let glob = Glob::new(&pattern).map_err(|e| {
            MirrorError::Pattern(format!("Failed to compile extension glob '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }

    let set = builder
        .build()
        .map_err(|e| MirrorError::Pattern(format!("Failed to build extension set: {e}")))?;
    Ok(Some(set))
}

/// One configured source-to-destination mapping
///
/// `source` and `destination` are canonical absolute paths so that
/// prefix-containment tests against event paths are reliable.
#[derive(Debug, Clone)]
pub struct MirrorRule {
    pub name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub recursive: bool,
    pub conflict_resolution: ConflictResolution,
    file_rules: Vec<FileRule>,
    fallback_rule: FileRule,
}

impl MirrorRule {
    /// Build a mirror rule from configuration and already-canonicalized paths
    pub fn new(config: &MirrorRuleConfig, source: PathBuf, destination: PathBuf) -> Result<Self> {
        let file_rules = config
            .file_rules
            .iter()
            .map(FileRule::from_config)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            source,
            destination,
            recursive: config.recursive,
            conflict_resolution: config.conflict_resolution,
            file_rules,
            fallback_rule: FileRule::fallback(),
        })
    }

    /// Resolve the effective file rule for a file name
    ///
    /// Walks the configured rules in declared order and returns the first
    /// whose pattern matches; falls back to the catch-all rule. Infallible.
    pub fn file_rule_for(&self, file_name: &str) -> &FileRule {
        self.file_rules
            .iter()
            .find(|rule| rule.matches(file_name))
            .unwrap_or(&self.fallback_rule)
    }

    /// Map a path under this rule's source to its destination counterpart
    pub fn dest_path_for(&self, source_path: &Path) -> Option<PathBuf> {
        source_path
            .strip_prefix(&self.source)
            .ok()
            .map(|rel| self.destination.join(rel))
    }

    /// Test whether a path lives under this rule's source root
    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(&self.source)
    }
}
