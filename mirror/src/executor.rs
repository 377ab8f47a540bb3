//! Per-file sync actions and the full-tree pass

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filetime::FileTime;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{MirrorError, Result};
use crate::rules::MirrorRule;

/// What a single `sync_file` call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Source bytes copied over the destination
    Copied,
    /// Source vanished, destination removed
    DeletedDest,
    /// File rejected by the allowed-extension set
    Skipped,
    /// Nothing to do
    NoOp,
}

/// Counters for a full-tree pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub copied: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub failed: u64,
}

impl SyncStats {
    pub fn merge(&mut self, other: SyncStats) {
        self.copied += other.copied;
        self.skipped += other.skipped;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }

    pub fn summary(&self) -> String {
        format!(
            "{} copied, {} skipped, {} deleted, {} failed",
            self.copied, self.skipped, self.deleted, self.failed
        )
    }
}

/// Executes file actions for mirror rules
///
/// Operations on the same destination path are serialized through a
/// per-path mutex so a backup always corresponds to the content the
/// following overwrite replaces. The lock map grows with distinct
/// destination paths, bounded by the mirrored tree size.
#[derive(Debug, Default)]
pub struct SyncExecutor {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl SyncExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    async fn dest_lock(&self, dest: &Path) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().await;
        map.entry(dest.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Synchronize a single file from source to destination
    ///
    /// - A missing source propagates as a destination delete (or a no-op
    ///   when the destination is already gone; covers files that vanished
    ///   between event emission and handling).
    /// - The effective file rule is resolved by first match against the
    ///   source file name.
    /// - A source over the effective size ceiling is rejected and the
    ///   destination left untouched.
    /// - With `backup` enabled an existing destination is copied to
    ///   `<dest>.bak` first; backup failure blocks the overwrite.
    /// - The copy preserves modification time and permission bits, creating
    ///   destination parent directories on demand.
    pub async fn sync_file(
        &self,
        source: &Path,
        dest: &Path,
        rule: &MirrorRule,
    ) -> Result<SyncOutcome> {
        let lock = self.dest_lock(dest).await;
        let _guard = lock.lock().await;
        self.sync_file_locked(source, dest, rule).await
    }

    async fn sync_file_locked(
        &self,
        source: &Path,
        dest: &Path,
        rule: &MirrorRule,
    ) -> Result<SyncOutcome> {
        if !source.exists() {
            if dest.exists() {
                fs::remove_file(dest).await.map_err(|e| {
                    MirrorError::deletion_error(dest, format!("Failed to remove file: {e}"))
                })?;
                info!(dest = %dest.display(), "Removed destination (source deleted)");
                return Ok(SyncOutcome::DeletedDest);
            }
            return Ok(SyncOutcome::NoOp);
        }

        let file_name = source
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let file_rule = rule.file_rule_for(file_name);

        if !file_rule.allows(file_name) {
            debug!(source = %source.display(), "Extension not allowed, skipping");
            return Ok(SyncOutcome::Skipped);
        }

        let metadata = fs::metadata(source).await?;
        if metadata.len() > file_rule.max_size {
            return Err(MirrorError::SizeLimitExceeded {
                path: source.to_path_buf(),
                size: metadata.len(),
                limit: file_rule.max_size,
            });
        }

        if file_rule.backup && dest.exists() {
            self.backup_file(dest).await?;
        }

        self.copy_with_metadata(source, dest, &metadata).await?;
        debug!(source = %source.display(), dest = %dest.display(), "Synced file");
        Ok(SyncOutcome::Copied)
    }

    /// Copy the current destination content to `<dest>.bak`
    ///
    /// Only the single most recent backup is retained.
    async fn backup_file(&self, dest: &Path) -> Result<()> {
        let backup = backup_path_for(dest);
        fs::copy(dest, &backup).await.map_err(|e| {
            MirrorError::backup_error(dest, format!("Failed to create backup: {e}"))
        })?;
        debug!(backup = %backup.display(), "Created backup");
        Ok(())
    }

    async fn copy_with_metadata(
        &self,
        source: &Path,
        dest: &Path,
        source_meta: &std::fs::Metadata,
    ) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                MirrorError::copy_error(source, dest, format!("Failed to create parent directory: {e}"))
            })?;
        }

        fs::copy(source, dest).await.map_err(|e| {
            MirrorError::copy_error(source, dest, format!("Failed to copy file: {e}"))
        })?;

        let mtime = FileTime::from_last_modification_time(source_meta);
        filetime::set_file_mtime(dest, mtime).map_err(|e| {
            MirrorError::path_error(dest, format!("Failed to set modification time: {e}"))
        })?;

        self.copy_permissions(dest, source_meta).await
    }

    #[cfg(unix)]
    async fn copy_permissions(&self, dest: &Path, source_meta: &std::fs::Metadata) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(source_meta.permissions().mode());
        fs::set_permissions(dest, perms).await.map_err(|e| {
            MirrorError::path_error(dest, format!("Failed to set permissions: {e}"))
        })
    }

    #[cfg(windows)]
    async fn copy_permissions(&self, dest: &Path, source_meta: &std::fs::Metadata) -> Result<()> {
        // Windows only carries the read-only bit
        let readonly = source_meta.permissions().readonly();
        let mut perms = fs::metadata(dest)
            .await
            .map_err(|e| MirrorError::path_error(dest, format!("Failed to read metadata: {e}")))?
            .permissions();
        perms.set_readonly(readonly);
        fs::set_permissions(dest, perms).await.map_err(|e| {
            MirrorError::path_error(dest, format!("Failed to set permissions: {e}"))
        })
    }

    /// Remove a destination file because its source was deleted
    ///
    /// Unconditional: never consults size or backup policy.
    pub async fn propagate_delete(&self, dest: &Path) -> Result<SyncOutcome> {
        let lock = self.dest_lock(dest).await;
        let _guard = lock.lock().await;

        if !dest.exists() {
            return Ok(SyncOutcome::NoOp);
        }
        fs::remove_file(dest).await.map_err(|e| {
            MirrorError::deletion_error(dest, format!("Failed to remove file: {e}"))
        })?;
        info!(dest = %dest.display(), "Removed destination (source deleted)");
        Ok(SyncOutcome::DeletedDest)
    }

    /// Full-tree pass over a rule's source subtree
    ///
    /// Best-effort: individual file failures are logged and counted, never
    /// abort the pass. Directories are not copied separately; they
    /// materialize as a side effect of file placement.
    pub async fn sync_directory(&self, rule: &MirrorRule) -> SyncStats {
        let mut stats = SyncStats::default();

        for entry in WalkDir::new(&rule.source).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(rule = %rule.name, error = %e, "Walk error during full pass");
                    stats.failed += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let dest = match rule.dest_path_for(entry.path()) {
                Some(dest) => dest,
                None => {
                    warn!(path = %entry.path().display(), "Path escaped source root, skipping");
                    stats.failed += 1;
                    continue;
                }
            };

            match self.sync_file(entry.path(), &dest, rule).await {
                Ok(SyncOutcome::Copied) => stats.copied += 1,
                Ok(SyncOutcome::Skipped) => stats.skipped += 1,
                Ok(SyncOutcome::DeletedDest) => stats.deleted += 1,
                Ok(SyncOutcome::NoOp) => {}
                Err(e) => {
                    warn!(source = %entry.path().display(), error = %e, "Failed to sync file");
                    stats.failed += 1;
                }
            }
        }

        info!(rule = %rule.name, "Full pass complete: {}", stats.summary());
        stats
    }
}

/// Backup location for a destination file: `<dest>.bak`
pub fn backup_path_for(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}
