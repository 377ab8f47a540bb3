//! Engine lifecycle: registry construction, initial pass, live watching

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::MirrorConfig;
use crate::error::Result;
use crate::executor::{SyncExecutor, SyncStats};
use crate::registry::RuleRegistry;
use crate::watcher::{ChangeRouter, RouterState};

/// An explicitly constructed mirroring engine instance
///
/// No ambient global state: callers create, run and shut down the engine
/// themselves. Setup-phase failures (directory creation, duplicate rule
/// sources, watch registration) are fatal; per-file failures afterwards
/// are logged and absorbed.
pub struct MirrorEngine {
    registry: Arc<RuleRegistry>,
    executor: Arc<SyncExecutor>,
    router: ChangeRouter,
}

impl MirrorEngine {
    /// Build the engine from configuration
    ///
    /// Canonicalizes every rule's paths, creating missing source and
    /// destination directories first.
    pub async fn new(config: MirrorConfig) -> Result<Self> {
        let registry = Arc::new(RuleRegistry::from_config(&config).await?);
        let executor = Arc::new(SyncExecutor::new());
        let router = ChangeRouter::new(registry.clone(), executor.clone());

        info!(rules = registry.len(), "Mirror engine initialized");
        Ok(Self {
            registry,
            executor,
            router,
        })
    }

    pub fn router_state(&self) -> RouterState {
        self.router.state()
    }

    /// Run the full-tree pass for every rule, one task per rule
    ///
    /// Best-effort: each pass continues past individual file failures,
    /// and a panicked pass task is counted and absorbed.
    pub async fn initial_sync(&self) -> SyncStats {
        let mut handles = Vec::with_capacity(self.registry.len());
        for rule in self.registry.rules() {
            let executor = self.executor.clone();
            let rule = rule.clone();
            handles.push(tokio::spawn(
                async move { executor.sync_directory(&rule).await },
            ));
        }

        let mut stats = SyncStats::default();
        for handle in handles {
            match handle.await {
                Ok(pass) => stats.merge(pass),
                Err(e) => {
                    warn!(error = %e, "Full pass task failed");
                    stats.failed += 1;
                }
            }
        }
        info!("Initial sync complete: {}", stats.summary());
        stats
    }

    /// Arm the change router
    ///
    /// Re-checks that every rule's directories exist before registering
    /// watches; failure here is fatal.
    pub async fn start_watching(&mut self) -> Result<()> {
        self.registry.directories_ready().await?;
        self.router.start()
    }

    /// Tear down watches and drain in-flight notifications
    pub async fn shutdown(&mut self) -> Result<()> {
        self.router.stop().await?;
        info!("Mirror engine stopped");
        Ok(())
    }
}
