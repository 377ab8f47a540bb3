//! Change routing: translates filesystem notifications into sync actions

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{MirrorError, Result};
use crate::executor::SyncExecutor;
use crate::registry::RuleRegistry;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Normalized change notification kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One change notification for a single path
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

/// Router lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Idle,
    Watching,
    Stopped,
}

/// Routes change notifications to the sync executor
///
/// One notify watch per rule source root, all bridged into a single
/// channel drained by one consumer task. Transitions only through
/// explicit `start`/`stop` calls: `Idle -> Watching -> Stopped`.
pub struct ChangeRouter {
    registry: Arc<RuleRegistry>,
    executor: Arc<SyncExecutor>,
    state: RouterState,
    watchers: Vec<RecommendedWatcher>,
    consumer: Option<JoinHandle<()>>,
}

impl ChangeRouter {
    pub fn new(registry: Arc<RuleRegistry>, executor: Arc<SyncExecutor>) -> Self {
        Self {
            registry,
            executor,
            state: RouterState::Idle,
            watchers: Vec::new(),
            consumer: None,
        }
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Register one watch per rule source and start the consumer task
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            RouterState::Watching => {
                warn!("Change router is already watching");
                return Ok(());
            }
            RouterState::Stopped => {
                return Err(MirrorError::Watch("router already stopped".to_string()));
            }
            RouterState::Idle => {}
        }

        let (tx, mut rx) = mpsc::channel::<ChangeEvent>(EVENT_CHANNEL_CAPACITY);

        for rule in self.registry.rules() {
            let watcher = spawn_watch(&rule.source, rule.recursive, tx.clone())?;
            self.watchers.push(watcher);
            info!(source = %rule.source.display(), destination = %rule.destination.display(),
                  "Watching directory");
        }
        drop(tx);

        let registry = self.registry.clone();
        let executor = self.executor.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = route_event(&registry, &executor, &event).await {
                    warn!(path = %event.path.display(), error = %e,
                          "Failed to handle change event");
                }
            }
            debug!("Change event consumer stopped");
        });
        self.consumer = Some(handle);
        self.state = RouterState::Watching;
        Ok(())
    }

    /// Tear down all watches and drain in-flight notifications
    ///
    /// Dropping the watchers closes every channel sender; the consumer
    /// finishes the events already queued, then exits.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != RouterState::Watching {
            self.state = RouterState::Stopped;
            return Ok(());
        }

        self.watchers.clear();
        self.state = RouterState::Stopped;

        if let Some(handle) = self.consumer.take() {
            handle
                .await
                .map_err(|e| MirrorError::Watch(format!("consumer task failed: {e}")))?;
        }
        info!("Change router stopped");
        Ok(())
    }
}

/// Create a notify watch on a root, feeding the shared event channel
fn spawn_watch(
    root: &Path,
    recursive: bool,
    tx: mpsc::Sender<ChangeEvent>,
) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(
        move |result: std::result::Result<Event, notify::Error>| match result {
            Ok(event) => {
                if let Some(kind) = change_kind(&event.kind) {
                    for path in event.paths {
                        if let Err(e) = tx.try_send(ChangeEvent { kind, path }) {
                            warn!(error = %e, "Change queue full, dropping event");
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "File watcher error");
            }
        },
    )
    .map_err(|e| MirrorError::Watch(e.to_string()))?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher
        .watch(root, mode)
        .map_err(|e| MirrorError::Watch(format!("failed to watch '{}': {e}", root.display())))?;

    Ok(watcher)
}

/// Map a notify event kind to a change kind; `None` means ignore
fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        _ => None,
    }
}

/// Dispatch one change notification to the executor
///
/// Directory-targeted events are ignored, paths owned by no rule are
/// dropped, and deletes bypass size/backup logic entirely. Errors are
/// returned to the caller for logging; one bad event never affects the
/// next.
pub(crate) async fn route_event(
    registry: &RuleRegistry,
    executor: &SyncExecutor,
    event: &ChangeEvent,
) -> Result<()> {
    let rule = match registry.rule_for_path(&event.path) {
        Some(rule) => rule,
        None => {
            debug!(path = %event.path.display(), "Event path owned by no rule, dropping");
            return Ok(());
        }
    };

    let dest = match rule.dest_path_for(&event.path) {
        Some(dest) => dest,
        None => {
            debug!(path = %event.path.display(), "Event path outside rule source, dropping");
            return Ok(());
        }
    };

    match event.kind {
        ChangeKind::Created | ChangeKind::Modified => {
            // Only regular-file events drive sync
            if event.path.is_dir() {
                return Ok(());
            }
            let outcome = executor.sync_file(&event.path, &dest, rule).await?;
            debug!(path = %event.path.display(), ?outcome, "Handled change event");
        }
        ChangeKind::Deleted => {
            // The source is gone, so stat the mapped destination to tell
            // directory removals apart from file removals
            if dest.is_dir() {
                return Ok(());
            }
            executor.propagate_delete(&dest).await?;
        }
    }

    Ok(())
}
